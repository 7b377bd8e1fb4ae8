use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The dated partitions available for one chapter, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterIndex {
    pub dates: Vec<String>,

    /// Papers per date, when the index producer recorded them.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub counts: BTreeMap<String, u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl ChapterIndex {
    pub fn new(dates: Vec<String>) -> Self {
        Self {
            dates,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains(&self, date: &str) -> bool {
        self.dates.iter().any(|d| d == date)
    }

    /// Dates that are not `YYYY-MM-DD` calendar dates.
    ///
    /// Chapter collections are ordered by comparing date strings, which is
    /// only meaningful for fixed-width ISO dates.
    pub fn irregular_dates(&self) -> Vec<&str> {
        self.dates
            .iter()
            .filter(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").is_err())
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_index() {
        let idx: ChapterIndex =
            serde_json::from_str(r#"{"dates":["2024-03-10","2024-03-09"]}"#).unwrap();
        assert_eq!(idx.len(), 2);
        assert!(idx.counts.is_empty());
        assert_eq!(idx.total, None);
    }

    #[test]
    fn parses_counts_and_total() {
        let idx: ChapterIndex = serde_json::from_str(
            r#"{"dates":["2024-03-10"],"counts":{"2024-03-10":12},"total":12}"#,
        )
        .unwrap();
        assert_eq!(idx.counts.get("2024-03-10"), Some(&12));
        assert_eq!(idx.total, Some(12));
        assert!(idx.contains("2024-03-10"));
    }

    #[test]
    fn flags_irregular_dates() {
        let idx = ChapterIndex::new(vec![
            "2024-03-10".to_string(),
            "2024-3-9".to_string(),
            "latest".to_string(),
        ]);
        assert_eq!(idx.irregular_dates(), vec!["2024-3-9", "latest"]);
    }
}
