use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SurveyError};

/// Identifier of the synthetic union chapter.
pub const ALL_CHAPTER: &str = "all";

/// Identifier of a named topical chapter, e.g. `reward_model_rl`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterId(String);

impl ChapterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChapterId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A chapter selection: the union of everything, or one named chapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Chapter {
    All,
    Named(ChapterId),
}

impl Chapter {
    pub fn named(id: impl Into<String>) -> Self {
        Self::Named(ChapterId::new(id))
    }

    pub fn as_named(&self) -> Option<&ChapterId> {
        match self {
            Self::All => None,
            Self::Named(id) => Some(id),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL_CHAPTER,
            Self::Named(id) => id.as_str(),
        }
    }
}

impl fmt::Display for Chapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterInfo {
    pub id: ChapterId,
    pub name: String,
}

/// The closed, ordered set of named chapters for one session.
///
/// Catalog order is the order in which the "all" union is assembled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChapterCatalog {
    chapters: Vec<ChapterInfo>,
}

impl ChapterCatalog {
    pub fn new(chapters: Vec<ChapterInfo>) -> Self {
        Self { chapters }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChapterInfo> {
        self.chapters.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ChapterId> {
        self.chapters.iter().map(|c| &c.id)
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn contains(&self, id: &ChapterId) -> bool {
        self.chapters.iter().any(|c| &c.id == id)
    }

    pub fn display_name(&self, id: &str) -> Option<&str> {
        self.chapters
            .iter()
            .find(|c| c.id.as_str() == id)
            .map(|c| c.name.as_str())
    }

    /// Resolve user input into a chapter of this catalog.
    pub fn parse(&self, input: &str) -> Result<Chapter> {
        let input = input.trim();
        if input.eq_ignore_ascii_case(ALL_CHAPTER) {
            return Ok(Chapter::All);
        }
        self.chapters
            .iter()
            .find(|c| c.id.as_str() == input)
            .map(|c| Chapter::Named(c.id.clone()))
            .ok_or_else(|| SurveyError::UnknownChapter(input.to_string()))
    }
}
