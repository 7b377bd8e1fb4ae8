use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use surveyscope_core::{ChapterId, ChapterIndex};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{LoaderError, Result};
use crate::source::{StaticSource, read_json};

type Slot = Arc<OnceCell<Arc<ChapterIndex>>>;

/// Session-lifetime memo of each chapter's `dates_index.json`.
///
/// Concurrent callers for one chapter share a single fetch. Failures are not
/// remembered; the next call goes back to the source.
pub struct IndexCache {
    source: Arc<dyn StaticSource>,
    shards_root: String,
    slots: Mutex<HashMap<ChapterId, Slot>>,
}

pub fn index_path(shards_root: &str, chapter: &ChapterId) -> String {
    format!("{}/{chapter}/dates_index.json", shards_root.trim_end_matches('/'))
}

impl IndexCache {
    pub fn new(source: Arc<dyn StaticSource>, shards_root: impl Into<String>) -> Self {
        Self {
            source,
            shards_root: shards_root.into(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, chapter: &ChapterId) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(chapter.clone()).or_default())
    }

    pub async fn get_index(&self, chapter: &ChapterId) -> Result<Arc<ChapterIndex>> {
        let slot = self.slot(chapter);
        if let Some(index) = slot.get() {
            debug!(%chapter, "date index cache hit");
            return Ok(Arc::clone(index));
        }

        let index = slot
            .get_or_try_init(|| self.fetch(chapter))
            .await
            .map_err(|e| LoaderError::Index {
                chapter: chapter.clone(),
                source: Box::new(e),
            })?;
        Ok(Arc::clone(index))
    }

    async fn fetch(&self, chapter: &ChapterId) -> Result<Arc<ChapterIndex>> {
        let path = index_path(&self.shards_root, chapter);
        let index: ChapterIndex = read_json(self.source.as_ref(), &path).await?;

        let irregular = index.irregular_dates();
        if !irregular.is_empty() {
            warn!(%chapter, dates = ?irregular, "index holds non-ISO dates; date ordering may be off");
        }
        info!(%chapter, dates = index.len(), "date index loaded");
        Ok(Arc::new(index))
    }

    /// The memoized index, without touching the source.
    pub fn cached(&self, chapter: &ChapterId) -> Option<Arc<ChapterIndex>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(chapter).and_then(|s| s.get().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MapSource;

    const PATH: &str = "root/a/dates_index.json";

    #[tokio::test]
    async fn fetches_once_per_chapter() {
        let source = Arc::new(MapSource::new().with_file(PATH, r#"{"dates":["2024-03-10"]}"#));
        let cache = IndexCache::new(source.clone(), "root");
        let a = ChapterId::new("a");

        assert!(cache.cached(&a).is_none());
        let first = cache.get_index(&a).await.unwrap();
        let second = cache.get_index(&a).await.unwrap();
        assert_eq!(first.dates, vec!["2024-03-10"]);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.reads_of(PATH), 1);
        assert!(cache.cached(&a).is_some());
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let source = Arc::new(MapSource::new().with_file(PATH, r#"{"dates":["d1","d2"]}"#));
        let cache = IndexCache::new(source.clone(), "root");
        let a = ChapterId::new("a");

        let (x, y) = tokio::join!(cache.get_index(&a), cache.get_index(&a));
        assert_eq!(x.unwrap().len(), 2);
        assert_eq!(y.unwrap().len(), 2);
        assert_eq!(source.reads_of(PATH), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let source = Arc::new(MapSource::new().with_file(PATH, r#"{"dates":[]}"#));
        source.fail(PATH);
        let cache = IndexCache::new(source.clone(), "root");
        let a = ChapterId::new("a");

        let err = cache.get_index(&a).await.unwrap_err();
        assert!(matches!(err, LoaderError::Index { .. }));
        assert_eq!(err.chapter(), Some(&a));
        assert!(cache.cached(&a).is_none());

        source.heal(PATH);
        assert!(cache.get_index(&a).await.is_ok());
        assert_eq!(source.reads_of(PATH), 2);
    }

    #[tokio::test]
    async fn malformed_index_is_an_index_error() {
        let source = Arc::new(MapSource::new().with_file(PATH, r#"{"days":[]}"#));
        let cache = IndexCache::new(source, "root");
        let err = cache.get_index(&ChapterId::new("a")).await.unwrap_err();
        match err {
            LoaderError::Index { source, .. } => {
                assert!(matches!(*source, LoaderError::Decode { .. }))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
