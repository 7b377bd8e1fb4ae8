use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::chapter::ChapterCatalog;

/// Suffix of shard file names; stripping it from `source_file` yields the date.
pub const SHARD_SUFFIX: &str = ".jsonl";

const ABS_URL_BASE: &str = "https://arxiv.org/abs/";

/// A normalized paper record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
    pub categories: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub survey_categories: BTreeMap<String, ChapterRelevance>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,

    pub date: PaperDate,
    pub links: PaperLinks,
}

/// How well a paper matches one chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRelevance {
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    #[serde(default)]
    pub chapter_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
}

/// The date partition a paper was published in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaperDate {
    Known(String),
    Unknown,
}

impl PaperDate {
    pub fn from_source_file(source_file: Option<&str>) -> Self {
        match source_file {
            Some(s) => Self::Known(s.strip_suffix(SHARD_SUFFIX).unwrap_or(s).to_string()),
            None => Self::Unknown,
        }
    }

    /// Key for descending date order. Unknown dates sort last.
    pub fn sort_key(&self) -> &str {
        match self {
            Self::Known(d) => d,
            Self::Unknown => "",
        }
    }

    pub fn as_known(&self) -> Option<&str> {
        match self {
            Self::Known(d) => Some(d),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for PaperDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(d) => f.write_str(d),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

/// A chapter a paper is relevant to, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevantChapter {
    pub id: String,
    pub name: String,
    pub score: f64,
    pub keywords: Vec<String>,
}

impl Paper {
    /// Relevance score for `chapter`, 0 when the paper was not matched to it.
    pub fn relevance(&self, chapter: &str) -> f64 {
        self.survey_categories
            .get(chapter)
            .map(|r| r.score)
            .unwrap_or(0.0)
    }

    /// Every matched chapter, highest score first.
    pub fn relevant_chapters(&self, catalog: &ChapterCatalog) -> Vec<RelevantChapter> {
        let mut chapters: Vec<RelevantChapter> = self
            .survey_categories
            .iter()
            .map(|(id, rel)| RelevantChapter {
                id: id.clone(),
                name: catalog
                    .display_name(id)
                    .map(str::to_string)
                    .unwrap_or_else(|| rel.chapter_name.clone()),
                score: rel.score,
                keywords: rel.matched_keywords.clone(),
            })
            .collect();
        chapters.sort_by(|a, b| b.score.total_cmp(&a.score));
        chapters
    }

    /// The abstract page, else the PDF, else the arXiv abstract page for `id`.
    pub fn primary_url(&self) -> Cow<'_, str> {
        match (&self.links.abs, &self.links.pdf) {
            (Some(abs), _) => Cow::Borrowed(abs),
            (None, Some(pdf)) => Cow::Borrowed(pdf),
            (None, None) => Cow::Owned(format!("{ABS_URL_BASE}{}", self.id)),
        }
    }

    pub fn authors_line(&self) -> String {
        self.authors.join(", ")
    }
}

// ─── Wire format ───────────────────────────────────────────

/// A field that upstream writes either as a list or as a single string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    Many(Vec<String>),
    One(String),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::Many(v) => v,
            Self::One(s) if s.trim().is_empty() => Vec::new(),
            Self::One(s) => vec![s],
        }
    }
}

/// One line of a shard file, as produced upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct PaperRecord {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub authors: Option<OneOrMany>,
    #[serde(default)]
    pub categories: Option<OneOrMany>,
    #[serde(default)]
    pub survey_categories: Option<BTreeMap<String, ChapterRelevance>>,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub abs: Option<String>,
    #[serde(default)]
    pub pdf: Option<String>,
}

impl From<PaperRecord> for Paper {
    fn from(rec: PaperRecord) -> Self {
        let abs = rec.abs.filter(|s| !s.trim().is_empty());
        let pdf = rec.pdf.filter(|s| !s.trim().is_empty());

        Self {
            date: PaperDate::from_source_file(rec.source_file.as_deref()),
            title: rec.title.unwrap_or_default(),
            summary: rec.summary.unwrap_or_default(),
            authors: rec.authors.map(OneOrMany::into_vec).unwrap_or_default(),
            categories: rec.categories.map(OneOrMany::into_vec).unwrap_or_default(),
            survey_categories: rec.survey_categories.unwrap_or_default(),
            source_file: rec.source_file,
            links: PaperLinks { abs, pdf },
            id: rec.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chapter::{ChapterId, ChapterInfo};

    fn parse(json: &str) -> Paper {
        serde_json::from_str::<PaperRecord>(json).unwrap().into()
    }

    #[test]
    fn normalizes_string_authors_and_categories() {
        let p = parse(r#"{"id":"2401.00001","authors":"Ada Lovelace","categories":"cs.LG"}"#);
        assert_eq!(p.authors, vec!["Ada Lovelace"]);
        assert_eq!(p.categories, vec!["cs.LG"]);
    }

    #[test]
    fn keeps_author_lists() {
        let p = parse(r#"{"id":"x","authors":["A","B"],"categories":["cs.AI","cs.CL"]}"#);
        assert_eq!(p.authors_line(), "A, B");
        assert_eq!(p.categories.len(), 2);
    }

    #[test]
    fn date_from_source_file() {
        let p = parse(r#"{"id":"x","source_file":"2024-03-10.jsonl"}"#);
        assert_eq!(p.date, PaperDate::Known("2024-03-10".to_string()));

        let p = parse(r#"{"id":"x"}"#);
        assert_eq!(p.date, PaperDate::Unknown);
        assert_eq!(p.date.to_string(), "Unknown");
        assert_eq!(p.date.sort_key(), "");
    }

    #[test]
    fn primary_url_prefers_abs_then_pdf_then_id() {
        let p = parse(r#"{"id":"y","abs":"https://example.org/y","pdf":"https://example.org/y.pdf"}"#);
        assert_eq!(p.primary_url(), "https://example.org/y");

        let p = parse(r#"{"id":"2401.00001","abs":"","pdf":"https://arxiv.org/pdf/2401.00001"}"#);
        assert_eq!(p.links.abs, None);
        assert_eq!(p.primary_url(), "https://arxiv.org/pdf/2401.00001");

        let p = parse(r#"{"id":"2401.00002"}"#);
        assert_eq!(p.primary_url(), "https://arxiv.org/abs/2401.00002");
    }

    #[test]
    fn missing_id_is_rejected() {
        assert!(serde_json::from_str::<PaperRecord>(r#"{"title":"no id"}"#).is_err());
    }

    #[test]
    fn relevance_defaults_to_zero() {
        let p = parse(
            r#"{"id":"x","survey_categories":{"reward_model_rl":{"score":3,"matched_keywords":["PPO"],"chapter_name":"RL"}}}"#,
        );
        assert_eq!(p.relevance("reward_model_rl"), 3.0);
        assert_eq!(p.relevance("test_time_scaling"), 0.0);
    }

    #[test]
    fn relevant_chapters_sorted_by_score() {
        let p = parse(
            r#"{"id":"x","survey_categories":{
                "a":{"score":1,"matched_keywords":["k1"],"chapter_name":"From Record A"},
                "b":{"score":4,"matched_keywords":["k2","k3"],"chapter_name":"From Record B"}}}"#,
        );
        let catalog = ChapterCatalog::new(vec![ChapterInfo {
            id: ChapterId::new("a"),
            name: "Catalog A".to_string(),
        }]);

        let rel = p.relevant_chapters(&catalog);
        assert_eq!(rel[0].id, "b");
        assert_eq!(rel[0].name, "From Record B");
        assert_eq!(rel[1].name, "Catalog A");
        assert_eq!(rel[1].keywords, vec!["k1"]);
    }
}
