/*
    Transaction subsystem - operations and the executor that applies them
*/

pub mod executor;
pub mod operation;

pub use executor::TransactionExecutor;
pub use operation::{OpKind, Operation, Transaction};

use crate::store::{Key, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxnError {
    /// A write operation arrived with a null value
    #[error("write to key {key} has no value")]
    MissingWriteValue { key: Key },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type TxnResult<T> = Result<T, TxnError>;
