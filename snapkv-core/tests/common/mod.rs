/*
    Shared harness for node-level integration tests

    Each TestNode is a real NodeService reading from an in-memory duplex
    pipe. A Cluster routes every node's outbound messages: node ids are
    delivered to that node's input, anything else goes to the client
    channel.
*/

#![allow(dead_code)]

use serde_json::{json, Value as Json};
use snapkv_core::node::NodeResult;
use snapkv_core::protocol::Message;
use snapkv_core::{Config, NodeService, ShutdownCoordinator, VersionedStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(5);

type Input = Arc<Mutex<DuplexStream>>;

pub struct TestNode {
    pub id: String,
    input: Input,
    store: Arc<VersionedStore>,
    coordinator: Arc<ShutdownCoordinator>,
    task: JoinHandle<NodeResult<()>>,
}

impl TestNode {
    pub fn spawn(id: &str, config: &Config) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let coordinator = Arc::new(ShutdownCoordinator::new(Duration::from_secs(2)));
        let (service, outbox) = NodeService::new(config, coordinator.clone());
        let store = service.store().clone();

        let (writer, reader) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(service.run(BufReader::new(reader)));

        let node = TestNode {
            id: id.to_string(),
            input: Arc::new(Mutex::new(writer)),
            store,
            coordinator,
            task,
        };
        (node, outbox)
    }

    pub fn store(&self) -> &Arc<VersionedStore> {
        &self.store
    }

    /// Deliver a raw JSON message to this node
    pub async fn send(&self, message: Json) {
        write_line(&self.input, &message.to_string())
            .await
            .expect("node input closed");
    }

    pub async fn stop(self) -> NodeResult<()> {
        self.coordinator.shutdown().await;
        self.task.await.expect("node task panicked")
    }
}

async fn write_line(input: &Input, line: &str) -> std::io::Result<()> {
    let mut input = input.lock().await;
    input.write_all(format!("{}\n", line).as_bytes()).await
}

pub fn init(client: &str, node: &str, msg_id: u64, node_ids: &[&str]) -> Json {
    json!({
        "src": client,
        "dest": node,
        "body": {"type": "init", "msg_id": msg_id, "node_id": node, "node_ids": node_ids}
    })
}

pub fn txn(client: &str, node: &str, msg_id: u64, ops: Json) -> Json {
    json!({
        "src": client,
        "dest": node,
        "body": {"type": "txn", "msg_id": msg_id, "txn": ops}
    })
}

/// Wait for the reply to `msg_id`, skipping anything else
pub async fn reply_to(rx: &mut mpsc::UnboundedReceiver<Message>, msg_id: u64) -> Message {
    tokio::time::timeout(WAIT, async {
        loop {
            let message = rx.recv().await.expect("outbox closed before reply");
            if message.body.in_reply_to == Some(msg_id) {
                return message;
            }
        }
    })
    .await
    .expect("timed out waiting for reply")
}

/// Wait until a reply to every id in `msg_ids` has arrived, in any order
pub async fn replies_to(rx: &mut mpsc::UnboundedReceiver<Message>, msg_ids: &[u64]) -> Vec<Message> {
    let mut replies: Vec<Option<Message>> = vec![None; msg_ids.len()];
    tokio::time::timeout(WAIT, async {
        while replies.iter().any(Option::is_none) {
            let message = rx.recv().await.expect("outbox closed before reply");
            if let Some(i) = msg_ids
                .iter()
                .position(|id| message.body.in_reply_to == Some(*id))
            {
                replies[i] = Some(message);
            }
        }
    })
    .await
    .expect("timed out waiting for replies");
    replies.into_iter().flatten().collect()
}

/// Poll `condition` until it holds or the wait times out
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub struct Cluster {
    pub nodes: Vec<TestNode>,
    pub client: mpsc::UnboundedReceiver<Message>,
}

impl Cluster {
    pub fn spawn(ids: &[&str], config: &Config) -> Self {
        let mut nodes = Vec::new();
        let mut outboxes = Vec::new();
        for id in ids {
            let (node, outbox) = TestNode::spawn(id, config);
            nodes.push(node);
            outboxes.push(outbox);
        }

        let inputs: Arc<HashMap<String, Input>> = Arc::new(
            nodes
                .iter()
                .map(|node| (node.id.clone(), node.input.clone()))
                .collect(),
        );

        let (client_tx, client) = mpsc::unbounded_channel();
        for mut outbox in outboxes {
            let inputs = inputs.clone();
            let client_tx = client_tx.clone();
            tokio::spawn(async move {
                while let Some(message) = outbox.recv().await {
                    match inputs.get(&message.dest) {
                        Some(input) => {
                            let line = serde_json::to_string(&message).expect("encodable message");
                            // A stopped node no longer reads; drop what was meant for it
                            let _ = write_line(input, &line).await;
                        }
                        None => {
                            let _ = client_tx.send(message);
                        }
                    }
                }
            });
        }

        Cluster { nodes, client }
    }

    pub fn node(&self, id: &str) -> &TestNode {
        self.nodes
            .iter()
            .find(|node| node.id == id)
            .expect("unknown node id")
    }

    /// Send `init` to every node with the full membership
    pub async fn init_all(&mut self) {
        let ids: Vec<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();

        let mut msg_ids = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            let msg_id = 1000 + i as u64;
            node.send(init("c0", &node.id, msg_id, &ids)).await;
            msg_ids.push(msg_id);
        }
        replies_to(&mut self.client, &msg_ids).await;
    }

    pub async fn stop(self) {
        for node in self.nodes {
            node.stop().await.expect("node stopped with error");
        }
    }
}
