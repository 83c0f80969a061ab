use thiserror::Error;

use crate::model::board::ListRole;

/// Failures the sync core reports by kind. Remote call failures travel as
/// plain `anyhow` errors with context attached by the adapters.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("board '{board}' not found")]
    BoardNotFound { board: String },

    #[error("board '{board}': missing {role} list '{list_name}'")]
    MissingList {
        board: String,
        role: ListRole,
        list_name: String,
    },

    #[error("invalid repository '{0}', expected owner/name")]
    InvalidRepo(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("sync cancelled")]
    Cancelled,
}
