use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use surveyscope_core::{AppConfig, Chapter, ExitCode, SurveyError};
use surveyscope_loader::{LoadOutcome, LoaderError, SkipReason, SurveySession};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "surveyscope",
    about = "Browse a chaptered research-paper survey, loading papers date by date",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of the standard location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Survey location (http(s) URL or directory), overrides the config.
    #[arg(long, global = true)]
    source: Option<String>,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting SURVEYSCOPE_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show survey totals and per-chapter paper counts.
    Stats,

    /// Load a chapter and list its papers. `all` shows the union of every chapter.
    Show {
        chapter: String,
        /// Extra "load more" batches after the initial load.
        #[arg(long, default_value = "0")]
        more: usize,
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// List a chapter's publication dates, marking the loaded ones.
    Dates { chapter: String },

    /// Papers per publication date among the loaded papers.
    Distribution {
        chapter: String,
        #[arg(long, default_value = "0")]
        more: usize,
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

// ─── Config Actions ──────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ConfigAction {
    /// Show all config values.
    List,
    /// Print the config file path.
    Path,
    /// Write a default config file.
    Init {
        #[arg(long)]
        force: bool,
    },
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    init_tracing();
    let start = Instant::now();
    let cli = Cli::parse();
    let json_output = cli.json || std::env::var("SURVEYSCOPE_JSON").as_deref() == Ok("1");

    if let Err(err) = run(&cli, json_output, start).await {
        let code = exit_code(&err);
        if json_output {
            let envelope = serde_json::json!({
                "status": "error",
                "error": error_kind(code),
                "message": format!("{err:#}"),
                "meta": { "duration_ms": start.elapsed().as_millis() }
            });
            println!("{}", serde_json::to_string_pretty(&envelope).unwrap_or_default());
        } else {
            eprintln!("error: {err:#}");
        }
        std::process::exit(code as i32);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("SURVEYSCOPE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli, json_output: bool, start: Instant) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let mut config = AppConfig::load_from(&config_path)?;
    if let Some(source) = &cli.source {
        config.source.location = source.clone();
    }
    tracing::debug!(config = %config_path.display(), source = %config.source.location, "config loaded");

    match &cli.command {
        // ── Config ─────────────────────────────────────────────────────────
        Commands::Config { action } => {
            let dur = start.elapsed().as_millis();
            match action {
                ConfigAction::List => {
                    let kv = config_key_values(&config);
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":kv,"meta":{"duration_ms":dur}}))?;
                    } else {
                        for (k, v) in &kv {
                            println!("{k} = {v}");
                        }
                    }
                }
                ConfigAction::Path => {
                    if json_output {
                        print_json(&serde_json::json!({
                            "status":"ok",
                            "data":{"path":config_path,"exists":config_path.exists()},
                            "meta":{"duration_ms":dur}
                        }))?;
                    } else {
                        println!("{}", config_path.display());
                    }
                }
                ConfigAction::Init { force } => {
                    if config_path.exists() && !force {
                        bail!(SurveyError::ConfigError(format!(
                            "{} already exists (use --force to overwrite)",
                            config_path.display()
                        )));
                    }
                    AppConfig::default().save_to(&config_path)?;
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":config_path},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("✓ Wrote {}", config_path.display());
                    }
                }
            }
        }

        // ── Stats ──────────────────────────────────────────────────────────
        Commands::Stats => {
            let session = SurveySession::from_config(&config)?;
            let summary = session.initialize().await?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":summary,"meta":{"duration_ms":dur}}))?;
            } else {
                println!("Survey statistics:");
                println!("  Total papers: {}", summary.total_papers);
                for badge in &summary.chapters {
                    println!("  {:<28} {:>6}  ({})", badge.name, badge.count, badge.id);
                }
            }
        }

        // ── Show ───────────────────────────────────────────────────────────
        Commands::Show {
            chapter,
            more,
            limit,
        } => {
            let session = SurveySession::from_config(&config)?;
            session.initialize().await?;
            let chapter = session.catalog().await.parse(chapter)?;
            load(&session, &chapter, *more).await?;

            let mut view = session.projection(&chapter).await;
            let loaded = view.len();
            view.papers.truncate(*limit);
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status":"ok",
                    "data":{
                        "chapter": view.chapter,
                        "loaded": loaded,
                        "expected": view.expected_papers,
                        "pagination": view.pagination,
                        "keywords": view.keywords,
                        "items": view.papers,
                    },
                    "meta":{"duration_ms":dur}
                }))?;
            } else {
                let catalog = session.catalog().await;
                let title = match &chapter {
                    Chapter::All => "All chapters",
                    Chapter::Named(id) => catalog.display_name(id.as_str()).unwrap_or(id.as_str()),
                };
                let p = view.pagination;
                print!("{title}: {loaded} papers loaded");
                if let Some(expected) = view.expected_papers {
                    print!(" of {expected}");
                }
                println!(
                    ", {}/{} dates{}",
                    p.loaded,
                    p.total,
                    if p.has_more { ", more available" } else { "" }
                );
                if !view.keywords.is_empty() {
                    let kws: Vec<String> = view
                        .keywords
                        .iter()
                        .map(|(k, n)| format!("{k} ({n})"))
                        .collect();
                    println!("Keywords: {}", kws.join(", "));
                }
                if view.is_empty() {
                    println!("No papers loaded.");
                }

                let mut cursor = view.cursor();
                for paper in &view.papers {
                    let label = cursor.label().unwrap_or_default();
                    println!("\n[{label}] {}  {}", paper.date, paper.title);
                    if !paper.authors.is_empty() {
                        println!("    {}", paper.authors_line());
                    }
                    let related: Vec<String> = paper
                        .relevant_chapters(&catalog)
                        .iter()
                        .map(|c| format!("{} {:.2}", c.name, c.score))
                        .collect();
                    if !related.is_empty() {
                        println!("    {}", related.join(" | "));
                    }
                    println!("    {}", paper.primary_url());
                    cursor.forward();
                }
            }
        }

        // ── Dates ──────────────────────────────────────────────────────────
        Commands::Dates { chapter } => {
            let session = SurveySession::from_config(&config)?;
            let chapter = session.catalog().await.parse(chapter)?;
            let Chapter::Named(id) = &chapter else {
                bail!(SurveyError::ConfigError(
                    "the `all` chapter has no date index; pick a named chapter".to_string()
                ));
            };
            session.select_chapter(&chapter).await?;
            let dates = session.dates(id).await;
            let dur = start.elapsed().as_millis();

            if json_output {
                let items: Vec<_> = dates
                    .iter()
                    .map(|(date, loaded)| serde_json::json!({"date":date,"loaded":loaded}))
                    .collect();
                print_json(&serde_json::json!({
                    "status":"ok",
                    "data":{"chapter":id,"items":items,"total":dates.len()},
                    "meta":{"duration_ms":dur}
                }))?;
            } else if dates.is_empty() {
                println!("No dates for {id}.");
            } else {
                for (date, loaded) in &dates {
                    println!("{} {date}", if *loaded { "●" } else { "○" });
                }
            }
        }

        // ── Distribution ───────────────────────────────────────────────────
        Commands::Distribution { chapter, more, top } => {
            let session = SurveySession::from_config(&config)?;
            let chapter = session.catalog().await.parse(chapter)?;
            load(&session, &chapter, *more).await?;
            let dist = session.date_distribution(&chapter).await;
            let dur = start.elapsed().as_millis();

            if json_output {
                let busiest: Vec<_> = dist
                    .busiest(*top)
                    .into_iter()
                    .map(|(date, count)| serde_json::json!({"date":date,"count":count}))
                    .collect();
                print_json(&serde_json::json!({
                    "status":"ok",
                    "data":{
                        "chapter": chapter,
                        "total": dist.total(),
                        "dates": dist.date_count(),
                        "mean_per_date": dist.mean_per_date(),
                        "busiest": busiest,
                    },
                    "meta":{"duration_ms":dur}
                }))?;
            } else {
                println!(
                    "{chapter}: {} papers over {} dates ({:.1} per date)",
                    dist.total(),
                    dist.date_count(),
                    dist.mean_per_date()
                );
                for (date, count) in dist.busiest(*top) {
                    println!("  {date}  {count:>4}  {}", "█".repeat(count.min(60)));
                }
            }
        }
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Initial load plus `more` extra batches. The union loads every chapter.
async fn load(session: &SurveySession, chapter: &Chapter, more: usize) -> Result<()> {
    let targets: Vec<Chapter> = match chapter {
        Chapter::All => session
            .catalog()
            .await
            .ids()
            .map(|id| Chapter::Named(id.clone()))
            .collect(),
        named => vec![named.clone()],
    };

    for target in &targets {
        session.select_chapter(target).await?;
        for _ in 0..more {
            match session.request_more(target).await? {
                LoadOutcome::Skipped(SkipReason::Exhausted) => break,
                LoadOutcome::Skipped(reason) => bail!("load of {target} skipped: {reason:?}"),
                LoadOutcome::Loaded(_) | LoadOutcome::Refreshed => {}
            }
        }
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    if let Some(e) = err.downcast_ref::<LoaderError>() {
        e.exit_code()
    } else if let Some(e) = err.downcast_ref::<SurveyError>() {
        e.exit_code()
    } else {
        ExitCode::GeneralError
    }
}

fn error_kind(code: ExitCode) -> &'static str {
    match code {
        ExitCode::Success => "ok",
        ExitCode::GeneralError => "error",
        ExitCode::NotFound => "not_found",
        ExitCode::InvalidArgs => "invalid_args",
        ExitCode::FileSystemError => "filesystem",
        ExitCode::NetworkError => "network",
    }
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn config_key_values(config: &AppConfig) -> BTreeMap<&'static str, String> {
    let mut map = BTreeMap::new();
    map.insert("source.location", config.source.location.clone());
    map.insert("source.stats_path", config.source.stats_path.clone());
    map.insert("source.shards_root", config.source.shards_root.clone());
    map.insert("loading.initial_batch", config.loading.initial_batch.to_string());
    map.insert("loading.more_batch", config.loading.more_batch.to_string());
    map.insert("http.user_agent", config.http.user_agent.clone());
    map.insert("http.max_retries", config.http.max_retries.to_string());
    map.insert("http.timeout_secs", config.http.timeout_secs.to_string());
    let chapters: Vec<&str> = config.chapters.iter().map(|c| c.id.as_str()).collect();
    map.insert("chapters", chapters.join(","));
    map
}
