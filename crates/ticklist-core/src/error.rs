use thiserror::Error;

use crate::service::ServiceError;
use crate::todo::TodoId;
use crate::view::ViewKey;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("todo {id} not found")]
    NotFound { id: TodoId },

    #[error("failed to fetch {view} view: {reason}")]
    TransientFetchFailure { view: ViewKey, reason: String },

    #[error("mutation rejected: {reason}")]
    MutationRejected { reason: String },

    #[error("status filter must include at least one status")]
    EmptyFilter,
}

impl SyncError {
    /// Maps a failed remote mutation. An unreachable remote counts as a
    /// rejection since nothing was applied.
    pub(crate) fn from_mutation(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(id) => SyncError::NotFound { id },
            ServiceError::Rejected(reason) => SyncError::MutationRejected { reason },
            ServiceError::Unavailable(reason) => SyncError::MutationRejected {
                reason: format!("remote unavailable: {reason}"),
            },
        }
    }

    pub(crate) fn from_fetch(view: ViewKey, err: ServiceError) -> Self {
        SyncError::TransientFetchFailure {
            view,
            reason: err.to_string(),
        }
    }
}
