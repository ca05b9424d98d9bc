//! Peer node errors

use sync_engine::AlignmentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    /// Alignment start rejected by the estimator
    #[error("alignment rejected: {0}")]
    Alignment(#[from] AlignmentError),

    /// Node task is no longer running
    #[error("peer node has stopped")]
    Stopped,

    #[error("peer node task failed: {0}")]
    TaskFailed(String),
}
