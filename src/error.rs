//! Error types for the reconciliation passes
//!
//! Errors are classified by how far they reach:
//! - Fatal: a required store cannot be opened or written, the run stops
//! - Recoverable: one record, author or entry is unusable, it is skipped
//!
//! Recoverable problems are not errors at all from the caller's point of view.
//! They are reported as [`SkipReason`] values inside the pass reports.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for store access and pass execution
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Store unavailable ({path}): {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl SyncError {
    pub fn store(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        SyncError::StoreUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the whole run has to stop.
    ///
    /// Parse errors are only fatal when they escape to the pass level, e.g.
    /// a catalog that cannot be read at all.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SyncError::Parse(_))
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SyncError::StoreUnavailable { .. } => {
                "Check that the site paths in labroster.json exist and are writable."
            }
            SyncError::Config(_) => "Check labroster.json (all keys are optional, camelCase).",
            SyncError::Parse(_) => "Check the file format is correct.",
            SyncError::Io(_) => "Check file permissions and disk space.",
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

/// Why a single person record or bibliography author was left alone.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum SkipReason {
    /// The document has no `---` delimited front matter block.
    MissingFrontMatter,
    /// The front matter block is not valid YAML (or not a mapping).
    InvalidFrontMatter(String),
    /// `firstname` is absent or blank.
    MissingFirstname,
    /// Every character of the name was stripped by alias normalization.
    EmptyAlias,
    /// The document could not be read.
    Unreadable(String),
    /// Identity was registered but the synthesized email could not be
    /// written back into the person record.
    WriteBackFailed(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingFrontMatter => write!(f, "no front matter found"),
            SkipReason::InvalidFrontMatter(e) => write!(f, "YAML error {}", e),
            SkipReason::MissingFirstname => write!(f, "no firstname"),
            SkipReason::EmptyAlias => write!(f, "name normalizes to an empty alias"),
            SkipReason::Unreadable(e) => write!(f, "unreadable: {}", e),
            SkipReason::WriteBackFailed(e) => write!(f, "email write-back failed: {}", e),
        }
    }
}
