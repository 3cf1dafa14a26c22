pub mod config;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod protocol;
pub mod shutdown;
pub mod store;
pub mod sync;
pub mod txn;

pub use config::Config;
pub use logging::{init_logging, LogLevel};
pub use node::{NodeError, NodeService};
pub use shutdown::ShutdownCoordinator;
pub use store::{LogicalTimestamp, Snapshot, VersionedStore};
pub use txn::{Operation, TransactionExecutor};
