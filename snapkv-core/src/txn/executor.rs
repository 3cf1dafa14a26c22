/*
    executor.rs - Apply a transaction against the latest snapshot

    Flow:
    1. Copy the latest snapshot out of the store (read lock)
    2. Run every operation, in order, against the private copy
    3. Store the copy under the transaction's timestamp (write lock)

    Nothing is shared between steps 1 and 3, so a concurrent transaction
    or sync may commit in between. Whichever commit carries the greatest
    timestamp becomes the latest state; there is no conflict detection.
*/

use crate::metrics::{self, Timer};
use crate::store::{LogicalTimestamp, VersionedStore};
use crate::txn::operation::{OpKind, Operation};
use crate::txn::{TxnError, TxnResult};
use std::sync::Arc;
use tracing::debug;

pub struct TransactionExecutor {
    store: Arc<VersionedStore>,
}

impl TransactionExecutor {
    pub fn new(store: Arc<VersionedStore>) -> Self {
        TransactionExecutor { store }
    }

    pub fn store(&self) -> &Arc<VersionedStore> {
        &self.store
    }

    /// Execute `ops` and commit the resulting snapshot at `ts`
    ///
    /// Returns the operations with read values filled in. A write without a
    /// value rejects the whole transaction and leaves the store untouched.
    pub fn execute(&self, mut ops: Vec<Operation>, ts: LogicalTimestamp) -> TxnResult<Vec<Operation>> {
        let timer = Timer::new(metrics::TXN_DURATION_MS);
        let (mut working, base) = self.store.latest_snapshot()?;

        for op in ops.iter_mut() {
            match op.kind {
                OpKind::Read => {
                    if let Some(current) = working.get(op.key) {
                        op.value = Some(current);
                    }
                }
                OpKind::Write => {
                    let value = op.value.ok_or(TxnError::MissingWriteValue { key: op.key })?;
                    working.insert(op.key, value);
                }
            }
        }

        self.store.put(ts, working)?;
        timer.stop();

        metrics::record_counter(metrics::TXN_EXECUTED, 1);
        metrics::record_counter(metrics::TXN_OPERATIONS, ops.len() as u64);
        debug!(%ts, %base, ops = ops.len(), "transaction committed");

        Ok(ops)
    }
}
