//! Scheduler and store error types.

use crate::models::CardId;
use thiserror::Error;

/// Errors produced while computing a review schedule.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// Quality out of range, non-finite easiness, zero interval, or a
    /// schedule that cannot be represented.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors raised by flashcard record stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Card not found.
    #[error("Card not found: {0}")]
    NotFound(CardId),

    /// The stored record changed since it was read.
    #[error("Version conflict on card {id}: expected {expected}, found {found}")]
    Conflict {
        id: CardId,
        expected: u64,
        found: u64,
    },

    /// Backend failure (database, lock poisoning).
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
