//! Incremental, batch-atomic loading of chapter shards.
//!
//! One load runs at a time across all chapters; a request made while another
//! is in flight is rejected rather than queued. A batch fetches its dates in
//! parallel and only touches shared state once every fetch has succeeded, so
//! a failed batch leaves nothing half-applied and a retry asks for exactly
//! the same dates.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use serde::Serialize;
use surveyscope_core::{
    AggregationStore, AppConfig, Chapter, ChapterCatalog, ChapterId, LoadTracker, Pagination,
    SurveyError,
};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{info, warn};

use crate::error::Result;
use crate::index_cache::IndexCache;
use crate::shard::ShardFetcher;
use crate::source::StaticSource;

/// Everything a projection reads. Only the controller writes it.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub tracker: LoadTracker,
    pub store: AggregationStore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum LoadOutcome {
    Loaded(LoadReport),
    Skipped(SkipReason),
    /// Nothing was fetched; the caller should re-project.
    Refreshed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub chapter: ChapterId,
    pub dates: Vec<String>,
    pub added: usize,
    pub duplicates: usize,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SkipReason {
    /// The union chapter is derived, never loaded.
    UnionChapter,
    /// Another load is running.
    InFlight { chapter: ChapterId },
    /// Every date in the chapter's index is already loaded.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum ChapterPhase {
    NotLoaded,
    Loading,
    Loaded { complete: bool },
}

struct InFlightGuard<'a> {
    slot: &'a Mutex<Option<ChapterId>>,
}

impl<'a> InFlightGuard<'a> {
    /// Claim the slot, or return the chapter currently holding it.
    fn acquire(
        slot: &'a Mutex<Option<ChapterId>>,
        chapter: &ChapterId,
    ) -> std::result::Result<Self, ChapterId> {
        let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(busy) = current.as_ref() {
            return Err(busy.clone());
        }
        *current = Some(chapter.clone());
        Ok(Self { slot })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

pub struct LoadController {
    indices: IndexCache,
    fetcher: ShardFetcher,
    initial_batch: usize,
    more_batch: usize,
    in_flight: Mutex<Option<ChapterId>>,
    state: RwLock<EngineState>,
}

impl LoadController {
    pub fn new(source: Arc<dyn StaticSource>, config: &AppConfig) -> Result<Self> {
        let catalog = config.catalog()?;
        let root = config.source.shards_root.clone();
        Ok(Self {
            indices: IndexCache::new(Arc::clone(&source), root.clone()),
            fetcher: ShardFetcher::new(source, root),
            initial_batch: config.loading.initial_batch,
            more_batch: config.loading.more_batch,
            in_flight: Mutex::new(None),
            state: RwLock::new(EngineState {
                tracker: LoadTracker::new(),
                store: AggregationStore::new(catalog),
            }),
        })
    }

    /// Load the newest `initial_batch` dates of a chapter.
    pub async fn load_initial(&self, chapter: &Chapter) -> Result<LoadOutcome> {
        self.load(chapter, self.initial_batch).await
    }

    /// Load the next `more_batch` dates of a chapter.
    pub async fn load_more(&self, chapter: &Chapter) -> Result<LoadOutcome> {
        self.load(chapter, self.more_batch).await
    }

    async fn load(&self, chapter: &Chapter, batch: usize) -> Result<LoadOutcome> {
        let Some(id) = chapter.as_named() else {
            return Ok(LoadOutcome::Skipped(SkipReason::UnionChapter));
        };
        if !self.catalog().await.contains(id) {
            return Err(SurveyError::UnknownChapter(id.to_string()).into());
        }

        let _guard = match InFlightGuard::acquire(&self.in_flight, id) {
            Ok(guard) => guard,
            Err(busy) => {
                info!(chapter = %id, busy = %busy, "load rejected, another load is in flight");
                return Ok(LoadOutcome::Skipped(SkipReason::InFlight { chapter: busy }));
            }
        };

        let index = self.indices.get_index(id).await?;
        let dates = {
            let mut state = self.state.write().await;
            state.tracker.register_index(id, index);
            state.tracker.unloaded_dates(id, batch)
        };
        if dates.is_empty() {
            return Ok(LoadOutcome::Skipped(SkipReason::Exhausted));
        }

        info!(chapter = %id, dates = ?dates, "loading batch");
        let results = join_all(dates.iter().map(|d| self.fetcher.fetch_shard(id, d))).await;
        let shards = match results.into_iter().collect::<Result<Vec<_>>>() {
            Ok(shards) => shards,
            Err(e) => {
                warn!(chapter = %id, error = %e, "batch failed, no dates marked loaded");
                return Err(e);
            }
        };

        let mut state = self.state.write().await;
        let merged = state
            .store
            .merge(id, shards.into_iter().flatten().collect())?;
        state.tracker.mark_loaded(id, &dates);
        let pagination = state.tracker.pagination(id).unwrap_or_default();

        info!(
            chapter = %id,
            added = merged.added,
            duplicates = merged.duplicates,
            total = state.store.len(chapter),
            "batch merged"
        );
        Ok(LoadOutcome::Loaded(LoadReport {
            chapter: id.clone(),
            dates,
            added: merged.added,
            duplicates: merged.duplicates,
            pagination,
        }))
    }

    /// Chapter currently being loaded, if any.
    pub fn in_flight(&self) -> Option<ChapterId> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn phase(&self, chapter: &ChapterId) -> ChapterPhase {
        if self.in_flight().as_ref() == Some(chapter) {
            return ChapterPhase::Loading;
        }
        let state = self.state.read().await;
        let tracker = &state.tracker;
        if tracker.is_registered(chapter)
            && (tracker.loaded_count(chapter) > 0 || tracker.total_dates(chapter) == 0)
        {
            ChapterPhase::Loaded {
                complete: !tracker.has_more(chapter),
            }
        } else {
            ChapterPhase::NotLoaded
        }
    }

    /// Shared read access for projections; never observes a half-applied batch.
    pub async fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().await
    }

    pub async fn catalog(&self) -> ChapterCatalog {
        self.state.read().await.store.catalog().clone()
    }
}
