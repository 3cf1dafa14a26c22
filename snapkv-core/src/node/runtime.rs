/*
    runtime.rs - Line-oriented message loop

    Input:  one JSON message per line; each request is handled on its own task
    Output: write_messages drains the outbox, one JSON line per message

    The loop ends on end of input or on a shutdown signal. In both cases no
    further lines are read, and requests already in flight are allowed to
    finish before run() returns.
*/

use crate::node::context::NodeContext;
use crate::node::handlers::RequestHandler;
use crate::node::NodeResult;
use crate::protocol::{Message, ProtocolError, RawMessage};
use crate::shutdown::ShutdownListener;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

pub struct NodeRuntime {
    ctx: NodeContext,
    handler: Arc<RequestHandler>,
}

impl NodeRuntime {
    pub fn new(ctx: NodeContext, handler: Arc<RequestHandler>) -> Self {
        NodeRuntime { ctx, handler }
    }

    /// Read and dispatch messages until end of input or shutdown
    pub async fn run<R>(&self, input: R, mut shutdown: ShutdownListener) -> NodeResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut in_flight = JoinSet::new();
        let mut received: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Message loop stopping on shutdown");
                    break;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_task_result(joined);
                }
                line = lines.next_line() => {
                    match line.map_err(ProtocolError::from)? {
                        Some(line) => {
                            if let Some(raw) = parse_line(&line) {
                                received += 1;
                                let ctx = self.ctx.clone();
                                let handler = self.handler.clone();
                                in_flight.spawn(async move { handler.handle(&ctx, raw) });
                            }
                        }
                        None => {
                            debug!("Input closed");
                            break;
                        }
                    }
                }
            }
        }

        let pending = in_flight.len();
        if pending > 0 {
            debug!(pending, "Waiting for in-flight requests");
        }
        while let Some(joined) = in_flight.join_next().await {
            log_task_result(joined);
        }

        info!(received, "Message loop finished");
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<RawMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<RawMessage>(line) {
        Ok(raw) => Some(raw),
        Err(e) => {
            warn!(error = %e, line, "Dropping unparseable input line");
            None
        }
    }
}

fn log_task_result(result: Result<(), JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "Request task failed");
    }
}

/// Write every queued message to `out` until all senders are dropped
pub async fn write_messages<W>(mut outbox: mpsc::UnboundedReceiver<Message>, mut out: W) -> NodeResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbox.recv().await {
        let mut line = message.to_line()?;
        line.push('\n');
        out.write_all(line.as_bytes())
            .await
            .map_err(ProtocolError::from)?;
        out.flush().await.map_err(ProtocolError::from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ShutdownCoordinator;
    use crate::store::VersionedStore;
    use std::time::Duration;

    fn runtime() -> (NodeRuntime, mpsc::UnboundedReceiver<Message>) {
        let (ctx, rx) = NodeContext::new();
        let handler = Arc::new(RequestHandler::new(Arc::new(VersionedStore::new())));
        (NodeRuntime::new(ctx, handler), rx)
    }

    #[test]
    fn test_parse_line_skips_blank_and_garbage() {
        assert!(parse_line("   ").is_none());
        assert!(parse_line("not json").is_none());
        assert!(parse_line(r#"{"src":"c1","dest":"n1","body":{"type":"init"}}"#).is_some());
    }

    #[tokio::test]
    async fn test_run_handles_every_line_before_returning() {
        let (runtime, mut rx) = runtime();
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));

        let input = concat!(
            r#"{"src":"c0","dest":"n1","body":{"type":"init","msg_id":1,"node_id":"n1","node_ids":["n1"]}}"#,
            "\n\n",
            "garbage\n",
            r#"{"src":"c1","dest":"n1","body":{"type":"txn","msg_id":2,"txn":[["w",1,10]]}}"#,
            "\n",
        );

        runtime
            .run(input.as_bytes(), coordinator.listener("runtime"))
            .await
            .unwrap();

        let mut replies = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            replies.push(msg.body.in_reply_to);
        }
        replies.sort();
        assert_eq!(replies, vec![Some(1), Some(2)]);
        assert_eq!(coordinator.active_components(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (runtime, _rx) = runtime();
        let coordinator = Arc::new(ShutdownCoordinator::new(Duration::from_secs(1)));

        // Input that never ends
        let (_writer, reader) = tokio::io::duplex(64);
        let listener = coordinator.listener("runtime");

        let task = tokio::spawn(async move {
            runtime
                .run(tokio::io::BufReader::new(reader), listener)
                .await
        });

        coordinator.shutdown().await;
        task.await.unwrap().unwrap();
        assert_eq!(coordinator.active_components(), 0);
    }

    #[tokio::test]
    async fn test_write_messages_emits_lines() {
        let (ctx, rx) = NodeContext::new();
        ctx.initialize(crate::node::Membership::new("n1".to_string(), vec!["n1".to_string()]).unwrap())
            .unwrap();
        ctx.send("c1", crate::protocol::Body::new(crate::protocol::Payload::InitOk))
            .unwrap();
        ctx.send("c2", crate::protocol::Body::new(crate::protocol::Payload::InitOk))
            .unwrap();
        drop(ctx);

        let mut out = Vec::new();
        write_messages(rx, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(text.ends_with('\n'));
        assert!(lines[0].contains(r#""dest":"c1""#));
        assert!(lines[1].contains(r#""type":"init_ok""#));
    }
}
