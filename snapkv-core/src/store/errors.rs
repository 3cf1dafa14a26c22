/*
    errors.rs - Error types for the store subsystem
*/

use std::sync::PoisonError;
use thiserror::Error;

/// Errors that can occur in the store subsystem
#[derive(Debug, Error)]
pub enum StoreError {
    /// A thread panicked while holding the versions lock
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Helper to convert poison errors into StoreError
pub(crate) fn handle_poison<T>(_err: PoisonError<T>) -> StoreError {
    StoreError::LockPoisoned("a thread panicked while holding the versions lock".to_string())
}
