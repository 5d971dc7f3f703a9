//! Error types for the snippet core.
//!
//! Every variant is recoverable: the core reports the condition to its caller
//! and leaves state as if the operation never happened.

use std::path::PathBuf;
use thiserror::Error;

use crate::snippet::ProfileKind;

/// Errors produced by the store, the engines and the dispatcher.
#[derive(Debug, Error)]
pub enum SnipError {
    #[error("Profile '{0}' has no text to dispatch")]
    EmptyProfile(ProfileKind),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Persistence failure for {path:?}: {reason}")]
    PersistenceFailure { path: PathBuf, reason: String },

    #[error("Item {index} is out of range (list has {len} items)")]
    MutationOutOfRange { index: usize, len: usize },

    #[error("Rotation engine is not running")]
    EngineStopped,

    #[error("Popup navigation is already at the root")]
    AtRoot,

    #[error("Paste failed: {0}")]
    PasteFailed(String),

    #[error("Popup could not be shown: {0}")]
    Presentation(String),
}

impl SnipError {
    pub fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::PersistenceFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// No condition in the core is fatal to the process.
    pub fn is_recoverable(&self) -> bool {
        true
    }
}

pub type SnipResult<T> = Result<T, SnipError>;
