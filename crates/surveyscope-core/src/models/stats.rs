use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::chapter::{ChapterCatalog, ChapterId};

/// Contents of `extraction_stats.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyStats {
    pub total_papers: u64,
    #[serde(default)]
    pub chapter_stats: BTreeMap<String, ChapterStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub count: u64,
    /// `(keyword, hits)` pairs, most frequent first.
    #[serde(default)]
    pub top_keywords: Vec<(String, u64)>,
}

/// Per-chapter paper count shown next to a chapter selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterBadge {
    pub id: ChapterId,
    pub name: String,
    pub count: u64,
}

/// What `initialize` hands to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    pub total_papers: u64,
    pub chapters: Vec<ChapterBadge>,
}

impl SurveyStats {
    pub fn chapter(&self, id: &str) -> Option<&ChapterStats> {
        self.chapter_stats.get(id)
    }

    /// Badges in catalog order; chapters missing from the stats count 0.
    pub fn summary(&self, catalog: &ChapterCatalog) -> StatsSummary {
        let chapters = catalog
            .iter()
            .map(|info| ChapterBadge {
                id: info.id.clone(),
                name: info.name.clone(),
                count: self
                    .chapter(info.id.as_str())
                    .map(|s| s.count)
                    .unwrap_or(0),
            })
            .collect();
        StatsSummary {
            total_papers: self.total_papers,
            chapters,
        }
    }
}
