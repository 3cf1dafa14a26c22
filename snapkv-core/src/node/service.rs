/*
    service.rs - Wire the store, handlers and replication into one node

    run():
    1. Start the replication loop (when enabled) on its own task
    2. Run the message loop until end of input or shutdown
    3. Stop replication and wait for it

    A replication failure is fatal: it triggers an immediate shutdown, the
    message loop stops reading, and run() returns the replication error.
*/

use crate::config::Config;
use crate::node::context::NodeContext;
use crate::node::handlers::RequestHandler;
use crate::node::runtime::NodeRuntime;
use crate::node::{NodeError, NodeResult};
use crate::protocol::Message;
use crate::shutdown::ShutdownCoordinator;
use crate::store::VersionedStore;
use crate::sync::{AntiEntropyStats, ReplicationLoop};
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tokio::sync::mpsc;
use tracing::{error, info};

pub struct NodeService {
    store: Arc<VersionedStore>,
    ctx: NodeContext,
    handler: Arc<RequestHandler>,
    replication: Option<Arc<ReplicationLoop>>,
    coordinator: Arc<ShutdownCoordinator>,
}

impl NodeService {
    /// Build a node; the returned receiver is the node's outbound message stream
    pub fn new(
        config: &Config,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let store = Arc::new(VersionedStore::new());
        let (ctx, outbox) = NodeContext::new();
        let handler = Arc::new(RequestHandler::new(store.clone()));

        let replication = config.replication.enabled.then(|| {
            Arc::new(ReplicationLoop::new(
                config.replication.anti_entropy(),
                store.clone(),
                ctx.clone(),
            ))
        });

        let service = NodeService {
            store,
            ctx,
            handler,
            replication,
            coordinator,
        };
        (service, outbox)
    }

    pub fn store(&self) -> &Arc<VersionedStore> {
        &self.store
    }

    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    /// `None` when replication is disabled
    pub fn replication_stats(&self) -> Option<AntiEntropyStats> {
        self.replication.as_ref().map(|r| r.stats())
    }

    /// Serve requests from `input` until it ends or shutdown is signalled
    pub async fn run<R>(self, input: R) -> NodeResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        // Registered before replication starts so an early failure is not missed
        let runtime_listener = self.coordinator.listener("runtime");

        let replication_task = self.replication.clone().map(|replication| {
            let listener = self.coordinator.listener("replication");
            let coordinator = self.coordinator.clone();
            tokio::spawn(async move {
                let result = replication.run(listener).await;
                if let Err(e) = &result {
                    error!(error = %e, "Replication failed, halting node");
                    coordinator.shutdown_immediately().await;
                }
                result
            })
        });
        if replication_task.is_none() {
            info!("Replication disabled");
        }

        let runtime = NodeRuntime::new(self.ctx.clone(), self.handler.clone());
        let served = runtime.run(input, runtime_listener).await;

        if !self.coordinator.is_shutting_down().await {
            self.coordinator.shutdown().await;
        }

        if let Some(task) = replication_task {
            task.await
                .map_err(|e| NodeError::TaskFailed(e.to_string()))??;
        }
        served?;

        if let Ok(stats) = self.store.stats() {
            info!(
                versions = stats.versions,
                latest = %stats.latest_timestamp,
                "Node stopped"
            );
        }
        Ok(())
    }
}
