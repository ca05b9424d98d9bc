//! Sync engine errors

use thiserror::Error;

/// Rejected alignment session start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error("an alignment session is already running")]
    AlreadySyncing,

    #[error("clock offset has not converged yet")]
    ClockNotSynchronized,
}
