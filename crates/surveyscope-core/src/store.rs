//! Loaded papers per chapter plus the deduplicated "all" union.
//!
//! A chapter collection never holds two papers with the same `id`; the copy
//! merged first is kept. Collections are ordered by descending date, derived
//! from the data rather than from insertion order, so batches can arrive in
//! any order. The union is rebuilt after every merge by walking the catalog's
//! chapters in order and keeping the first paper seen for each `id`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Result, SurveyError};
use crate::models::{Chapter, ChapterCatalog, ChapterId, Paper, PaperDate};

/// Outcome of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub added: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone)]
pub struct AggregationStore {
    catalog: ChapterCatalog,
    chapters: HashMap<ChapterId, Vec<Arc<Paper>>>,
    union: Vec<Arc<Paper>>,
}

impl AggregationStore {
    pub fn new(catalog: ChapterCatalog) -> Self {
        Self {
            catalog,
            chapters: HashMap::new(),
            union: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &ChapterCatalog {
        &self.catalog
    }

    /// Merge freshly fetched papers into `chapter` and rebuild the union.
    pub fn merge(&mut self, chapter: &ChapterId, papers: Vec<Paper>) -> Result<MergeReport> {
        if !self.catalog.contains(chapter) {
            return Err(SurveyError::UnknownChapter(chapter.to_string()));
        }

        let existing = self.chapters.get(chapter).map(Vec::as_slice).unwrap_or(&[]);
        let mut seen: HashSet<String> = existing.iter().map(|p| p.id.clone()).collect();
        let mut next: Vec<Arc<Paper>> = existing.to_vec();
        let mut report = MergeReport::default();

        for paper in papers {
            if seen.insert(paper.id.clone()) {
                next.push(Arc::new(paper));
                report.added += 1;
            } else {
                report.duplicates += 1;
            }
        }

        // Stable: papers sharing a date keep their merge order.
        next.sort_by(|a, b| b.date.sort_key().cmp(a.date.sort_key()));

        self.chapters.insert(chapter.clone(), next);
        self.rebuild_union();
        Ok(report)
    }

    fn rebuild_union(&mut self) {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut union = Vec::new();
        for id in self.catalog.ids() {
            let Some(papers) = self.chapters.get(id) else {
                continue;
            };
            for paper in papers {
                if seen.insert(paper.id.as_str()) {
                    union.push(Arc::clone(paper));
                }
            }
        }
        self.union = union;
    }

    /// Papers of a chapter in store order (date-descending, or union order for `All`).
    pub fn papers(&self, chapter: &Chapter) -> &[Arc<Paper>] {
        match chapter {
            Chapter::All => &self.union,
            Chapter::Named(id) => self.chapters.get(id).map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    pub fn len(&self, chapter: &Chapter) -> usize {
        self.papers(chapter).len()
    }

    pub fn is_empty(&self, chapter: &Chapter) -> bool {
        self.papers(chapter).is_empty()
    }

    pub fn contains(&self, chapter: &Chapter, paper_id: &str) -> bool {
        self.papers(chapter).iter().any(|p| p.id == paper_id)
    }

    /// Loaded papers per date for `chapter`.
    pub fn date_distribution(&self, chapter: &Chapter) -> DateDistribution {
        DateDistribution::from_papers(self.papers(chapter))
    }
}

/// Count of loaded papers per publication date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DateDistribution {
    counts: BTreeMap<String, usize>,
    total: usize,
}

impl DateDistribution {
    pub fn from_papers(papers: &[Arc<Paper>]) -> Self {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for paper in papers {
            *counts.entry(paper.date.to_string()).or_default() += 1;
        }
        Self {
            total: papers.len(),
            counts,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn date_count(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, date: &str) -> usize {
        self.counts.get(date).copied().unwrap_or(0)
    }

    /// Mean papers per distinct date, 0 when nothing is loaded.
    pub fn mean_per_date(&self) -> f64 {
        if self.counts.is_empty() {
            return 0.0;
        }
        self.total as f64 / self.counts.len() as f64
    }

    /// `(date, count)` newest first, undated papers last.
    pub fn dates(&self) -> Vec<(&str, usize)> {
        let unknown = PaperDate::Unknown.to_string();
        let mut dates: Vec<(&str, usize)> = self
            .counts
            .iter()
            .rev()
            .map(|(d, c)| (d.as_str(), *c))
            .collect();
        dates.sort_by_key(|(d, _)| *d == unknown);
        dates
    }

    /// The `n` dates with the most papers; ties go to the newer date.
    pub fn busiest(&self, n: usize) -> Vec<(&str, usize)> {
        let mut dates = self.dates();
        dates.sort_by(|a, b| b.1.cmp(&a.1));
        dates.truncate(n);
        dates
    }
}
