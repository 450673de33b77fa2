use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds surfaced by the resolver, installers and dispatcher.
#[derive(Error, Debug)]
pub enum DxError {
    #[error("no dx installation found in {} or any parent directory", .0.display())]
    NoInstallationFound(PathBuf),

    #[error("fetching {source_ref} failed: {reason}")]
    FetchError { source_ref: String, reason: String },

    #[error("invalid source {source_ref}: {reason}")]
    InvalidSourceError { source_ref: String, reason: String },

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("unknown metacommand '.{0}'")]
    UnknownMetacommand(String),

    #[error("required tool '{0}' not found on PATH")]
    MissingRequiredTool(String),

    #[error("{failed} of {total} command source(s) failed to install")]
    BatchPartialFailure { failed: usize, total: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("usage: {0}")]
    Usage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DxError>;

impl DxError {
    pub fn fetch(source_ref: &str, reason: impl Into<String>) -> Self {
        DxError::FetchError {
            source_ref: source_ref.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_source(source_ref: &str, reason: impl Into<String>) -> Self {
        DxError::InvalidSourceError {
            source_ref: source_ref.to_string(),
            reason: reason.into(),
        }
    }

    /// Unknown names get help output after the error line; everything else exits quietly.
    pub fn shows_help(&self) -> bool {
        matches!(
            self,
            DxError::UnknownCommand(_) | DxError::UnknownMetacommand(_) | DxError::Usage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_show_help() {
        assert!(DxError::UnknownCommand("bulid".into()).shows_help());
        assert!(DxError::UnknownMetacommand("updte".into()).shows_help());
        assert!(!DxError::MissingRequiredTool("git".into()).shows_help());
        assert!(!DxError::fetch("x", "boom").shows_help());
    }

    #[test]
    fn display_mentions_the_offending_item() {
        let err = DxError::UnknownMetacommand("updte".into());
        assert_eq!(err.to_string(), "unknown metacommand '.updte'");
        let err = DxError::BatchPartialFailure { failed: 1, total: 3 };
        assert!(err.to_string().contains("1 of 3"));
    }
}
