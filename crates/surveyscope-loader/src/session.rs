use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use surveyscope_core::{
    AppConfig, Chapter, ChapterCatalog, ChapterId, DateDistribution, Projection, StatsSummary,
    SurveyStats, ViewProjector,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::controller::{ChapterPhase, LoadController, LoadOutcome, SkipReason};
use crate::error::{LoaderError, Result};
use crate::source::{StaticSource, open_source, read_json};

/// One viewer session: stats, the chapter selection, and everything loaded so far.
pub struct SurveySession {
    source: Arc<dyn StaticSource>,
    stats_path: String,
    controller: LoadController,
    projector: ViewProjector,
    stats: RwLock<Option<Arc<SurveyStats>>>,
    current: Mutex<Option<Chapter>>,
    visited: Mutex<HashSet<ChapterId>>,
}

impl SurveySession {
    /// Open the source named in `config` and start an empty session.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let source = open_source(config)?;
        Self::with_source(source, config)
    }

    pub fn with_source(source: Arc<dyn StaticSource>, config: &AppConfig) -> Result<Self> {
        Ok(Self {
            controller: LoadController::new(Arc::clone(&source), config)?,
            source,
            stats_path: config.source.stats_path.clone(),
            projector: ViewProjector::new(),
            stats: RwLock::new(None),
            current: Mutex::new(None),
            visited: Mutex::new(HashSet::new()),
        })
    }

    /// Load the survey statistics. Nothing else in the view is usable without them.
    pub async fn initialize(&self) -> Result<StatsSummary> {
        let stats: SurveyStats = read_json(self.source.as_ref(), &self.stats_path)
            .await
            .map_err(|e| {
                warn!(source = %self.source.describe(), error = %e, "failed to load survey stats");
                LoaderError::Stats(Box::new(e))
            })?;

        let summary = stats.summary(&self.catalog().await);
        info!(
            source = %self.source.describe(),
            total = stats.total_papers,
            "survey stats loaded"
        );
        *self.stats.write().await = Some(Arc::new(stats));
        Ok(summary)
    }

    /// Make `chapter` current, loading its first batch on the first visit.
    pub async fn select_chapter(&self, chapter: &Chapter) -> Result<LoadOutcome> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(chapter.clone());

        let Some(id) = chapter.as_named() else {
            return Ok(LoadOutcome::Refreshed);
        };
        if self.is_visited(id).await {
            return Ok(LoadOutcome::Refreshed);
        }

        let outcome = self.controller.load_initial(chapter).await?;
        self.note_visit(id, &outcome);
        Ok(outcome)
    }

    pub async fn request_more(&self, chapter: &Chapter) -> Result<LoadOutcome> {
        let outcome = self.controller.load_more(chapter).await?;
        if let Some(id) = chapter.as_named() {
            self.note_visit(id, &outcome);
        }
        Ok(outcome)
    }

    pub async fn projection(&self, chapter: &Chapter) -> Projection {
        let stats = self.stats().await;
        let state = self.controller.read().await;
        self.projector
            .project(chapter, &state.store, &state.tracker, stats.as_deref())
    }

    /// Publication-date histogram of the papers loaded so far.
    pub async fn date_distribution(&self, chapter: &Chapter) -> DateDistribution {
        self.controller.read().await.store.date_distribution(chapter)
    }

    /// The chapter's date index paired with whether each date is loaded.
    ///
    /// Empty until the chapter's index has been fetched.
    pub async fn dates(&self, chapter: &ChapterId) -> Vec<(String, bool)> {
        let state = self.controller.read().await;
        let Some(index) = state.tracker.index(chapter) else {
            return Vec::new();
        };
        index
            .dates
            .iter()
            .map(|d| (d.clone(), state.tracker.is_loaded(chapter, d)))
            .collect()
    }

    pub fn current_chapter(&self) -> Option<Chapter> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn stats(&self) -> Option<Arc<SurveyStats>> {
        self.stats.read().await.clone()
    }

    pub async fn catalog(&self) -> ChapterCatalog {
        self.controller.catalog().await
    }

    pub async fn phase(&self, chapter: &ChapterId) -> ChapterPhase {
        self.controller.phase(chapter).await
    }

    /// A chapter counts as visited once any of its dates has been loaded.
    async fn is_visited(&self, chapter: &ChapterId) -> bool {
        let listed = self
            .visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(chapter);
        listed || self.controller.read().await.tracker.loaded_count(chapter) > 0
    }

    fn note_visit(&self, chapter: &ChapterId, outcome: &LoadOutcome) {
        if matches!(
            outcome,
            LoadOutcome::Loaded(_) | LoadOutcome::Skipped(SkipReason::Exhausted)
        ) {
            self.visited
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(chapter.clone());
        }
    }
}
