use surveyscope_core::{ChapterId, ExitCode, SurveyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {url} failed with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("date index unavailable for {chapter}: {source}")]
    Index {
        chapter: ChapterId,
        #[source]
        source: Box<LoaderError>,
    },

    #[error("failed to load {chapter} papers for {date}: {source}")]
    Fetch {
        chapter: ChapterId,
        date: String,
        #[source]
        source: Box<LoaderError>,
    },

    #[error("survey statistics unavailable: {0}")]
    Stats(#[source] Box<LoaderError>),

    #[error(transparent)]
    Core(#[from] SurveyError),
}

impl LoaderError {
    /// Chapter the failure is scoped to, for a per-chapter retry control.
    pub fn chapter(&self) -> Option<&ChapterId> {
        match self {
            Self::Index { chapter, .. } | Self::Fetch { chapter, .. } => Some(chapter),
            _ => None,
        }
    }

    pub fn date(&self) -> Option<&str> {
        match self {
            Self::Fetch { date, .. } => Some(date),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Http(_) | Self::Status { .. } => ExitCode::NetworkError,
            Self::NotFound(_) => ExitCode::NotFound,
            Self::Io { .. } => ExitCode::FileSystemError,
            Self::Decode { .. } => ExitCode::GeneralError,
            Self::Core(e) => e.exit_code(),
            Self::Index { source, .. } | Self::Fetch { source, .. } | Self::Stats(source) => {
                source.exit_code()
            }
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Io { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::NotFound(_) | Self::Decode { .. } | Self::Core(_) => false,
            Self::Index { source, .. } | Self::Fetch { source, .. } | Self::Stats(source) => {
                source.is_retryable()
            }
        }
    }
}

/// One shard line that could not be turned into a paper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    /// 1-based line number within the shard.
    pub line: usize,
    pub reason: String,
}

pub type Result<T> = std::result::Result<T, LoaderError>;
