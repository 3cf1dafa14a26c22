//! Graceful shutdown coordinator
//!
//! Long-running components hold a [`ShutdownListener`]. The coordinator
//! broadcasts a signal, and each listener is dropped once its component has
//! wound down; the coordinator waits (bounded by its timeout) until every
//! listener is gone.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{error, info, warn};

/// Shutdown signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Graceful,
    Immediate,
}

/// Shutdown state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    ShuttingDown,
    Shutdown,
}

pub struct ShutdownCoordinator {
    state: Arc<RwLock<ShutdownState>>,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
    /// Number of listeners not yet dropped
    active: Arc<watch::Sender<usize>>,
    timeout: Duration,
}

impl ShutdownCoordinator {
    /// `timeout` bounds how long `shutdown` waits for listeners to finish
    pub fn new(timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        let (active, _) = watch::channel(0);

        Self {
            state: Arc::new(RwLock::new(ShutdownState::Running)),
            shutdown_tx,
            active: Arc::new(active),
            timeout,
        }
    }

    /// Register a component that must acknowledge shutdown
    pub fn listener(&self, component: impl Into<String>) -> ShutdownListener {
        let component = component.into();
        self.active.send_modify(|n| *n += 1);

        ShutdownListener {
            rx: self.shutdown_tx.subscribe(),
            _guard: CompletionGuard {
                active: self.active.clone(),
            },
            component,
        }
    }

    /// Number of registered components that have not yet acknowledged
    pub fn active_components(&self) -> usize {
        *self.active.borrow()
    }

    /// Signal every listener and wait for them to finish
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.write().await;
            if *state != ShutdownState::Running {
                warn!("Shutdown already in progress");
                return;
            }
            *state = ShutdownState::ShuttingDown;
        }
        info!("Initiating graceful shutdown");

        // No receivers simply means no component is listening any more
        let _ = self.shutdown_tx.send(ShutdownSignal::Graceful);

        let mut active = self.active.subscribe();
        let drained = tokio::time::timeout(self.timeout, async {
            let _ = active.wait_for(|n| *n == 0).await;
        })
        .await
        .is_ok();

        if drained {
            info!("All components stopped");
        } else {
            warn!(
                remaining = self.active_components(),
                "Shutdown timed out waiting for components"
            );
        }

        *self.state.write().await = ShutdownState::Shutdown;
        info!("Shutdown complete");
    }

    /// Signal every listener without waiting for acknowledgement
    pub async fn shutdown_immediately(&self) {
        warn!("Initiating immediate shutdown");

        *self.state.write().await = ShutdownState::Shutdown;

        if let Err(e) = self.shutdown_tx.send(ShutdownSignal::Immediate) {
            error!("Failed to send immediate shutdown signal: {}", e);
        }
    }

    pub async fn is_shutting_down(&self) -> bool {
        *self.state.read().await != ShutdownState::Running
    }

    pub async fn state(&self) -> ShutdownState {
        *self.state.read().await
    }
}

/// A component's handle on the shutdown broadcast
///
/// Dropping the listener acknowledges shutdown.
pub struct ShutdownListener {
    rx: broadcast::Receiver<ShutdownSignal>,
    _guard: CompletionGuard,
    component: String,
}

impl ShutdownListener {
    /// Wait for the shutdown signal
    ///
    /// Cancel safe, so it can sit in a `select!` next to other work.
    pub async fn recv(&mut self) -> ShutdownSignal {
        let signal = match self.rx.recv().await {
            Ok(signal) => signal,
            Err(broadcast::error::RecvError::Lagged(_)) => ShutdownSignal::Graceful,
            // Coordinator dropped: nothing left to coordinate with
            Err(broadcast::error::RecvError::Closed) => ShutdownSignal::Immediate,
        };
        info!(component = %self.component, ?signal, "Received shutdown signal");
        signal
    }

    pub fn component(&self) -> &str {
        &self.component
    }
}

struct CompletionGuard {
    active: Arc<watch::Sender<usize>>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Install signal handlers for graceful shutdown
#[cfg(unix)]
pub fn install_signal_handlers(coordinator: Arc<ShutdownCoordinator>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to install signal handlers: {}", e);
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
        coordinator.shutdown().await;
    });
}

/// Install signal handlers for graceful shutdown (Windows)
#[cfg(windows)]
pub fn install_signal_handlers(coordinator: Arc<ShutdownCoordinator>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            return;
        }
        info!("Received Ctrl+C");
        coordinator.shutdown().await;
    });
}
