use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SurveyError};
use crate::models::chapter::{ALL_CHAPTER, ChapterCatalog, ChapterId, ChapterInfo};

/// Upper bound for `http.max_retries`.
pub const MAX_HTTP_RETRIES: u32 = 10;

/// Root application configuration, loaded from `~/.config/surveyscope/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub loading: LoadingConfig,
    pub http: HttpConfig,
    pub chapters: Vec<ChapterSpec>,
}

/// Where the static survey files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// An `http(s)://` base URL or a local directory.
    pub location: String,
    pub stats_path: String,
    pub shards_root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingConfig {
    /// Dates fetched the first time a chapter is opened.
    pub initial_batch: usize,
    /// Dates fetched per "load more" request.
    pub more_batch: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSpec {
    pub id: String,
    pub name: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            loading: LoadingConfig::default(),
            http: HttpConfig::default(),
            chapters: default_chapters(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            location: ".".to_string(),
            stats_path: "survey_data/extraction_stats.json".to_string(),
            shards_root: "survey_data_by_date".to_string(),
        }
    }
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            initial_batch: 7,
            more_batch: 5,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "surveyscope/0.1".to_string(),
            max_retries: 2,
            timeout_secs: 30,
        }
    }
}

fn default_chapters() -> Vec<ChapterSpec> {
    [
        ("test_time_scaling", "Test-Time Scaling"),
        ("reward_model_rl", "Reward Model for RL"),
        ("reward_model_benchmark", "Reward Model Benchmark"),
    ]
    .into_iter()
    .map(|(id, name)| ChapterSpec {
        id: id.to_string(),
        name: name.to_string(),
    })
    .collect()
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/surveyscope/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("SURVEYSCOPE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("surveyscope")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.loading.initial_batch == 0 || self.loading.more_batch == 0 {
            return Err(SurveyError::ConfigError(
                "loading batch sizes must be at least 1".to_string(),
            ));
        }
        if self.http.max_retries > MAX_HTTP_RETRIES {
            return Err(SurveyError::ConfigError(format!(
                "http.max_retries must be at most {MAX_HTTP_RETRIES}"
            )));
        }
        if self.chapters.is_empty() {
            return Err(SurveyError::ConfigError(
                "at least one chapter must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for chapter in &self.chapters {
            let id = chapter.id.trim();
            if id.is_empty() || id == ALL_CHAPTER {
                return Err(SurveyError::ConfigError(format!(
                    "invalid chapter id: {:?}",
                    chapter.id
                )));
            }
            if !seen.insert(id) {
                return Err(SurveyError::ConfigError(format!(
                    "duplicate chapter id: {id}"
                )));
            }
        }
        Ok(())
    }

    /// The ordered chapter catalog for a session.
    pub fn catalog(&self) -> Result<ChapterCatalog> {
        self.validate()?;
        Ok(ChapterCatalog::new(
            self.chapters
                .iter()
                .map(|c| ChapterInfo {
                    id: ChapterId::new(c.id.trim()),
                    name: c.name.clone(),
                })
                .collect(),
        ))
    }

    /// True when `source.location` points at a web server rather than a directory.
    pub fn is_remote(&self) -> bool {
        let loc = self.source.location.trim_start();
        loc.starts_with("http://") || loc.starts_with("https://")
    }
}
