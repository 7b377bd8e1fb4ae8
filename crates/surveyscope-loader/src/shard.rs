use std::sync::Arc;

use surveyscope_core::{ChapterId, Paper, PaperRecord};
use tracing::{debug, warn};

use crate::error::{LoaderError, ParseError, Result};
use crate::source::StaticSource;

/// Papers recovered from one shard, plus the lines that were skipped.
#[derive(Debug, Clone, Default)]
pub struct ParsedShard {
    pub papers: Vec<Paper>,
    pub skipped: Vec<ParseError>,
}

/// Parse line-delimited records. Blank lines are ignored; a malformed line is
/// reported in `skipped` and does not affect its neighbours.
pub fn parse_shard(text: &str) -> ParsedShard {
    let mut shard = ParsedShard::default();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<PaperRecord>(line) {
            Ok(record) => shard.papers.push(record.into()),
            Err(e) => shard.skipped.push(ParseError {
                line: idx + 1,
                reason: e.to_string(),
            }),
        }
    }
    shard
}

pub fn shard_path(shards_root: &str, chapter: &ChapterId, date: &str) -> String {
    format!("{}/{chapter}/{date}.jsonl", shards_root.trim_end_matches('/'))
}

pub struct ShardFetcher {
    source: Arc<dyn StaticSource>,
    shards_root: String,
}

impl ShardFetcher {
    pub fn new(source: Arc<dyn StaticSource>, shards_root: impl Into<String>) -> Self {
        Self {
            source,
            shards_root: shards_root.into(),
        }
    }

    /// Fetch one chapter's papers for one date.
    ///
    /// Transport failures fail the call; malformed lines are logged and dropped.
    pub async fn fetch_shard(&self, chapter: &ChapterId, date: &str) -> Result<Vec<Paper>> {
        let path = shard_path(&self.shards_root, chapter, date);
        let text = self
            .source
            .read(&path)
            .await
            .map_err(|e| LoaderError::Fetch {
                chapter: chapter.clone(),
                date: date.to_string(),
                source: Box::new(e),
            })?;

        let ParsedShard { papers, skipped } = parse_shard(&text);
        for err in &skipped {
            warn!(%chapter, date, line = err.line, reason = %err.reason, "skipping malformed record");
        }
        debug!(%chapter, date, papers = papers.len(), skipped = skipped.len(), "shard parsed");
        Ok(papers)
    }
}
