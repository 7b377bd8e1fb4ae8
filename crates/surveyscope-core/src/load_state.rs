//! Per-chapter record of which dated partitions have been fetched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::models::{ChapterId, ChapterIndex};

/// How much of a chapter's history is loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub loaded: usize,
    pub total: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
struct ChapterProgress {
    index: Arc<ChapterIndex>,
    loaded: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadTracker {
    chapters: HashMap<ChapterId, ChapterProgress>,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a chapter's date index. Later calls for the same chapter are ignored.
    pub fn register_index(&mut self, chapter: &ChapterId, index: Arc<ChapterIndex>) {
        self.chapters
            .entry(chapter.clone())
            .or_insert_with(|| ChapterProgress {
                index,
                loaded: HashSet::new(),
            });
    }

    pub fn is_registered(&self, chapter: &ChapterId) -> bool {
        self.chapters.contains_key(chapter)
    }

    /// Up to `n` dates not yet loaded, in index order.
    pub fn unloaded_dates(&self, chapter: &ChapterId, n: usize) -> Vec<String> {
        let Some(progress) = self.chapters.get(chapter) else {
            return Vec::new();
        };
        progress
            .index
            .dates
            .iter()
            .filter(|d| !progress.loaded.contains(*d))
            .take(n)
            .cloned()
            .collect()
    }

    /// Record dates as loaded. Dates outside the chapter's index are ignored.
    pub fn mark_loaded<I, S>(&mut self, chapter: &ChapterId, dates: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(progress) = self.chapters.get_mut(chapter) else {
            return;
        };
        for date in dates {
            let date = date.as_ref();
            if progress.index.contains(date) {
                progress.loaded.insert(date.to_string());
            }
        }
    }

    pub fn is_loaded(&self, chapter: &ChapterId, date: &str) -> bool {
        self.chapters
            .get(chapter)
            .is_some_and(|p| p.loaded.contains(date))
    }

    pub fn loaded_count(&self, chapter: &ChapterId) -> usize {
        self.chapters.get(chapter).map_or(0, |p| p.loaded.len())
    }

    pub fn total_dates(&self, chapter: &ChapterId) -> usize {
        self.chapters.get(chapter).map_or(0, |p| p.index.len())
    }

    pub fn has_more(&self, chapter: &ChapterId) -> bool {
        self.chapters
            .get(chapter)
            .is_some_and(|p| p.loaded.len() < p.index.len())
    }

    pub fn index(&self, chapter: &ChapterId) -> Option<&Arc<ChapterIndex>> {
        self.chapters.get(chapter).map(|p| &p.index)
    }

    /// `None` until the chapter's index has been registered.
    pub fn pagination(&self, chapter: &ChapterId) -> Option<Pagination> {
        self.chapters.get(chapter).map(|p| Pagination {
            loaded: p.loaded.len(),
            total: p.index.len(),
            has_more: p.loaded.len() < p.index.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_with(dates: &[&str]) -> (LoadTracker, ChapterId) {
        let id = ChapterId::new("reward_model_rl");
        let mut t = LoadTracker::new();
        let index = ChapterIndex::new(dates.iter().map(|d| d.to_string()).collect());
        t.register_index(&id, Arc::new(index));
        (t, id)
    }

    #[test]
    fn unloaded_dates_preserve_index_order() {
        let (mut t, id) = tracker_with(&["2024-03-10", "2024-03-09", "2024-03-08"]);
        assert_eq!(t.unloaded_dates(&id, 2), vec!["2024-03-10", "2024-03-09"]);

        t.mark_loaded(&id, ["2024-03-10"]);
        assert_eq!(t.unloaded_dates(&id, 5), vec!["2024-03-09", "2024-03-08"]);
    }

    #[test]
    fn mark_loaded_is_idempotent() {
        let (mut t, id) = tracker_with(&["2024-03-10", "2024-03-09"]);
        t.mark_loaded(&id, ["2024-03-10"]);
        t.mark_loaded(&id, ["2024-03-10", "2024-03-10"]);
        assert_eq!(t.loaded_count(&id), 1);
        assert!(t.has_more(&id));
    }

    #[test]
    fn dates_outside_index_are_ignored() {
        let (mut t, id) = tracker_with(&["2024-03-10"]);
        t.mark_loaded(&id, ["1999-01-01"]);
        assert_eq!(t.loaded_count(&id), 0);
        assert!(!t.is_loaded(&id, "1999-01-01"));
    }

    #[test]
    fn has_more_turns_false_only_when_complete() {
        let (mut t, id) = tracker_with(&["c", "b", "a"]);
        let mut seen_false = false;
        for date in ["c", "b", "a"] {
            assert!(!seen_false);
            assert!(t.has_more(&id));
            t.mark_loaded(&id, [date]);
            if !t.has_more(&id) {
                seen_false = true;
                assert_eq!(t.loaded_count(&id), t.total_dates(&id));
            }
        }
        assert!(seen_false);
        t.mark_loaded(&id, ["a"]);
        assert!(!t.has_more(&id));
    }

    #[test]
    fn unregistered_chapter_has_nothing() {
        let t = LoadTracker::new();
        let id = ChapterId::new("x");
        assert!(t.unloaded_dates(&id, 5).is_empty());
        assert!(!t.has_more(&id));
        assert_eq!(t.pagination(&id), None);
    }

    #[test]
    fn register_keeps_first_index() {
        let (mut t, id) = tracker_with(&["a", "b"]);
        t.register_index(&id, Arc::new(ChapterIndex::new(vec!["z".to_string()])));
        assert_eq!(t.total_dates(&id), 2);
        assert_eq!(
            t.pagination(&id),
            Some(Pagination {
                loaded: 0,
                total: 2,
                has_more: true
            })
        );
    }
}
