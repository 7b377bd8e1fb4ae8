use thiserror::Error;

/// All errors that can occur in surveyscope-core.
#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("Unknown chapter: {0}")]
    UnknownChapter(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Exit codes used by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    FileSystemError = 4,
    NetworkError = 6,
}

impl SurveyError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::UnknownChapter(_) | Self::ConfigError(_) | Self::TomlParse(_) => {
                ExitCode::InvalidArgs
            }
            Self::Io(_) => ExitCode::FileSystemError,
            Self::Json(_) | Self::TomlSerialize(_) => ExitCode::GeneralError,
        }
    }
}

pub type Result<T> = std::result::Result<T, SurveyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(
            SurveyError::UnknownChapter("x".into()).exit_code() as i32,
            3
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(SurveyError::from(io).exit_code(), ExitCode::FileSystemError);
    }
}
