//! Render-ready projections of the aggregation store.

use std::sync::Arc;

use serde::Serialize;

use crate::load_state::{LoadTracker, Pagination};
use crate::models::{Chapter, Paper, SurveyStats};
use crate::store::AggregationStore;

/// Keywords shown above a chapter's paper list.
pub const KEYWORD_PANEL_SIZE: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    pub chapter: Chapter,
    pub papers: Vec<Arc<Paper>>,
    pub pagination: Pagination,
    /// Most frequent matched keywords, empty for the union.
    pub keywords: Vec<(String, u64)>,
    /// Chapter size according to the stats file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_papers: Option<u64>,
}

impl Projection {
    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    pub fn cursor(&self) -> PaperCursor {
        PaperCursor::new(self.papers.len())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ViewProjector {
    keyword_limit: usize,
}

impl ViewProjector {
    pub fn new() -> Self {
        Self {
            keyword_limit: KEYWORD_PANEL_SIZE,
        }
    }

    pub fn with_keyword_limit(mut self, limit: usize) -> Self {
        self.keyword_limit = limit;
        self
    }

    pub fn project(
        &self,
        chapter: &Chapter,
        store: &AggregationStore,
        tracker: &LoadTracker,
        stats: Option<&SurveyStats>,
    ) -> Projection {
        let mut papers = store.papers(chapter).to_vec();

        match chapter {
            Chapter::All => {
                let mut pagination = Pagination::default();
                for id in store.catalog().ids() {
                    if let Some(p) = tracker.pagination(id) {
                        pagination.loaded += p.loaded;
                        pagination.total += p.total;
                    }
                }

                Projection {
                    chapter: Chapter::All,
                    papers,
                    pagination,
                    keywords: Vec::new(),
                    expected_papers: stats.map(|s| s.total_papers),
                }
            }
            Chapter::Named(id) => {
                let key = id.as_str();
                // Vec::sort_by is stable, so equal scores keep date order.
                papers.sort_by(|a, b| b.relevance(key).total_cmp(&a.relevance(key)));

                let chapter_stats = stats.and_then(|s| s.chapter(key));
                let keywords = chapter_stats
                    .map(|s| {
                        s.top_keywords
                            .iter()
                            .take(self.keyword_limit)
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();

                Projection {
                    chapter: chapter.clone(),
                    papers,
                    pagination: tracker.pagination(id).unwrap_or_default(),
                    keywords,
                    expected_papers: chapter_stats.map(|s| s.count),
                }
            }
        }
    }
}

impl Default for ViewProjector {
    fn default() -> Self {
        Self::new()
    }
}

/// Position within a projection for previous/next navigation.
///
/// Moving past either end wraps around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaperCursor {
    len: usize,
    position: usize,
}

impl PaperCursor {
    pub fn new(len: usize) -> Self {
        Self { len, position: 0 }
    }

    /// Current position, `None` for an empty projection.
    pub fn position(&self) -> Option<usize> {
        (self.len > 0).then_some(self.position)
    }

    pub fn jump(&mut self, position: usize) -> Option<usize> {
        if position >= self.len {
            return None;
        }
        self.position = position;
        Some(position)
    }

    pub fn forward(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        self.position = if self.position + 1 < self.len {
            self.position + 1
        } else {
            0
        };
        Some(self.position)
    }

    pub fn back(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        self.position = if self.position > 0 {
            self.position - 1
        } else {
            self.len - 1
        };
        Some(self.position)
    }

    /// "3 / 10" style label, 1-based.
    pub fn label(&self) -> Option<String> {
        self.position().map(|p| format!("{} / {}", p + 1, self.len))
    }
}
