//! Error types for bag construction and reading.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for bag operations.
pub type BagResult<T> = Result<T, BagError>;

/// Errors that can occur while building or reading a bag.
///
/// Validation problems are not errors: the validator reports them as
/// [`crate::validate::ValidationIssue`] values.
#[derive(Debug, Error)]
pub enum BagError {
    /// The bag directory is missing or unusable.
    #[error("bag state error: {message}")]
    State { message: String },

    /// A component path is absolute or climbs out of the bag.
    #[error("unsafe component path '{path}': {reason}")]
    PathSafety { path: String, reason: String },

    /// The requested component has no metadata in the bag.
    #[error("component not found in bag {bag}: {path}")]
    ComponentNotFound { path: String, bag: String },

    /// The operation's preconditions are not met.
    #[error("bad request for bag {bag}: {message}")]
    BadRequest { bag: String, message: String },

    /// A tag file is malformed.
    #[error("bag format error in {file}: {message}")]
    Format { file: String, message: String },

    /// The bag lacks the data needed to produce a required artifact.
    #[error("bag profile error: {message}")]
    Profile { message: String },

    /// Invalid builder or reader configuration.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A JSON metadata file could not be parsed.
    #[error("malformed JSON in {}: {source}", path.display())]
    BadJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl BagError {
    pub(crate) fn path_safety(path: &str, reason: impl Into<String>) -> Self {
        Self::PathSafety {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn profile(message: impl Into<String>) -> Self {
        Self::Profile {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a caller bug (unsafe path).
    pub fn is_path_safety(&self) -> bool {
        matches!(self, Self::PathSafety { .. })
    }

    /// Returns true if the requested component does not exist.
    /// Callers may recover by creating it.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ComponentNotFound { .. })
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest { .. })
    }

    pub fn is_profile(&self) -> bool {
        matches!(self, Self::Profile { .. })
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }

    /// Suggested exit code for command-line front ends.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ComponentNotFound { .. } => 2,
            Self::PathSafety { .. } | Self::BadRequest { .. } => 3,
            Self::Config { .. } => 4,
            _ => 1,
        }
    }
}
