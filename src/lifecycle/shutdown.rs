//! Graceful Shutdown
//!
//! The [`ShutdownOrchestrator`] moves the application through
//! `Running -> ShuttingDown -> Closed` exactly once, whatever triggered it.

use super::LifecycleManager;
use crate::module::ModuleGraph;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShutdownState {
    Running = 0,
    ShuttingDown = 1,
    Closed = 2,
}

impl ShutdownState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::ShuttingDown,
            _ => Self::Closed,
        }
    }
}

/// Why shutdown started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Termination signal or an explicit request.
    Signal,
    /// An unrecoverable error; the process exits non-zero.
    Fatal(String),
}

/// Process exit status after shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }
}

/// Requests shutdown from anywhere in the application.
///
/// Only the first request is kept; later ones are ignored.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    trigger: CancellationToken,
    reason: Arc<Mutex<Option<ShutdownReason>>>,
}

impl ShutdownHandle {
    pub fn request(&self, reason: ShutdownReason) {
        let mut slot = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(reason);
            self.trigger.cancel();
        }
    }

    pub fn is_requested(&self) -> bool {
        self.trigger.is_cancelled()
    }

    /// Turn every later panic in the process into a `Fatal` request.
    ///
    /// The hook that was installed before still runs first. Panic hooks are
    /// process-wide, so a binary calls this once, before serving.
    pub fn request_on_panic(&self) {
        let handle = self.clone();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            previous(info);
            handle.request(ShutdownReason::Fatal(panic_message(info)));
        }));
    }

    /// Wait until shutdown is requested and return the first reason.
    pub async fn requested(&self) -> ShutdownReason {
        self.trigger.cancelled().await;
        self.reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or(ShutdownReason::Signal)
    }
}

fn panic_message(info: &std::panic::PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("panic");
    match info.location() {
        Some(location) => format!("{message} at {location}"),
        None => message.to_string(),
    }
}

/// Runs shutdown hooks, stops the transport and releases the module graph.
pub struct ShutdownOrchestrator {
    state: AtomicU8,
    lifecycle: Arc<LifecycleManager>,
    graph: Arc<ModuleGraph>,
    handle: ShutdownHandle,
    /// Tells the transport to stop accepting connections.
    stop: CancellationToken,
    /// Parent of every request token; cancelled when closing times out.
    requests: CancellationToken,
    close_timeout: Duration,
}

impl ShutdownOrchestrator {
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        graph: Arc<ModuleGraph>,
        close_timeout: Duration,
    ) -> Self {
        Self {
            state: AtomicU8::new(ShutdownState::Running as u8),
            lifecycle,
            graph,
            handle: ShutdownHandle::default(),
            stop: CancellationToken::new(),
            requests: CancellationToken::new(),
            close_timeout,
        }
    }

    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn handle(&self) -> &ShutdownHandle {
        &self.handle
    }

    /// Cancelled once the transport must stop accepting connections.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Token for one in-flight request.
    pub fn request_token(&self) -> CancellationToken {
        self.requests.child_token()
    }

    /// Claim the `Running -> ShuttingDown` transition.
    pub fn begin(&self) -> bool {
        self.state
            .compare_exchange(
                ShutdownState::Running as u8,
                ShutdownState::ShuttingDown as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Shut down once; a second call while shutting down or closed returns
    /// `None` and does nothing.
    ///
    /// `transport` resolves when the server has closed its connections; it
    /// is awaited after the stop token fires, bounded by the close timeout.
    pub async fn shutdown<F>(&self, reason: ShutdownReason, transport: F) -> Option<ExitStatus>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        if !self.begin() {
            tracing::debug!(?reason, "Shutdown already in progress");
            return None;
        }
        tracing::info!(?reason, "Starting graceful shutdown...");

        let mut failed = matches!(reason, ShutdownReason::Fatal(_));
        let hook_failures = self.lifecycle.stop().await;
        if hook_failures > 0 {
            tracing::warn!(hook_failures, "Some shutdown hooks failed");
        }

        self.stop.cancel();
        match tokio::time::timeout(self.close_timeout, transport).await {
            Ok(Ok(())) => tracing::info!("Transport closed"),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Transport failed while closing");
                failed = true;
            }
            Err(_) => {
                tracing::error!(
                    timeout_ms = self.close_timeout.as_millis() as u64,
                    "Transport did not close in time, cancelling in-flight requests"
                );
                self.requests.cancel();
                failed = true;
            }
        }

        self.graph.dispose();
        self.state
            .store(ShutdownState::Closed as u8, Ordering::Release);

        let status = if failed {
            ExitStatus::Failure
        } else {
            ExitStatus::Success
        };
        tracing::info!(exit_code = status.code(), "Graceful shutdown complete");
        Some(status)
    }
}

impl std::fmt::Debug for ShutdownOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownOrchestrator")
            .field("state", &self.state())
            .field("close_timeout", &self.close_timeout)
            .finish_non_exhaustive()
    }
}

/// Create a future that completes when a shutdown signal is received
///
/// If a handler cannot be installed the error is logged and that signal is
/// never observed.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{LifecycleError, OnApplicationShutdown, OnModuleDestroy};
    use crate::metadata::MetadataRegistry;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter {
        shutdowns: AtomicUsize,
        destroys: AtomicUsize,
    }

    #[async_trait]
    impl OnApplicationShutdown for Counter {
        async fn on_application_shutdown(&self) -> Result<(), LifecycleError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Err(LifecycleError::failed("flush failed"))
        }
    }

    #[async_trait]
    impl OnModuleDestroy for Counter {
        async fn on_module_destroy(&self) -> Result<(), LifecycleError> {
            self.destroys.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn orchestrator(counter: &Arc<Counter>, close_timeout: Duration) -> ShutdownOrchestrator {
        let mut lifecycle = LifecycleManager::new();
        lifecycle.on_shutdown(Arc::clone(counter), "Counter");
        lifecycle.on_destroy(Arc::clone(counter), "Counter");
        let graph = ModuleGraph::new(Arc::new(MetadataRegistry::new()));
        ShutdownOrchestrator::new(Arc::new(lifecycle), Arc::new(graph), close_timeout)
    }

    #[tokio::test]
    async fn test_signal_shutdown_runs_hooks_once() {
        let counter = Arc::new(Counter::default());
        let orchestrator = orchestrator(&counter, Duration::from_secs(1));
        let stop = orchestrator.stop_token();

        let status = orchestrator
            .shutdown(ShutdownReason::Signal, async move {
                stop.cancelled().await;
                Ok(())
            })
            .await;

        assert_eq!(status, Some(ExitStatus::Success));
        assert_eq!(orchestrator.state(), ShutdownState::Closed);
        assert_eq!(counter.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(counter.destroys.load(Ordering::SeqCst), 1);

        let again = orchestrator
            .shutdown(ShutdownReason::Fatal("late".into()), async { Ok(()) })
            .await;
        assert_eq!(again, None);
        assert_eq!(counter.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fatal_shutdown_exits_non_zero() {
        let counter = Arc::new(Counter::default());
        let orchestrator = orchestrator(&counter, Duration::from_secs(1));

        let status = orchestrator
            .shutdown(ShutdownReason::Fatal("listener died".into()), async { Ok(()) })
            .await;

        assert_eq!(status, Some(ExitStatus::Failure));
        assert_eq!(status.map(ExitStatus::code), Some(1));
        assert_eq!(counter.destroys.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_timeout_cancels_requests() {
        let counter = Arc::new(Counter::default());
        let orchestrator = orchestrator(&counter, Duration::from_millis(10));
        let request = orchestrator.request_token();

        let status = orchestrator
            .shutdown(ShutdownReason::Signal, std::future::pending())
            .await;

        assert_eq!(status, Some(ExitStatus::Failure));
        assert!(request.is_cancelled());
    }

    #[test]
    fn test_begin_is_claimed_once() {
        let counter = Arc::new(Counter::default());
        let orchestrator = orchestrator(&counter, Duration::from_secs(1));
        assert!(orchestrator.begin());
        assert!(!orchestrator.begin());
        assert_eq!(orchestrator.state(), ShutdownState::ShuttingDown);
    }

    #[tokio::test]
    async fn test_handle_keeps_first_reason() {
        let handle = ShutdownHandle::default();
        assert!(!handle.is_requested());
        handle.request(ShutdownReason::Fatal("boom".into()));
        handle.request(ShutdownReason::Signal);
        assert_eq!(handle.requested().await, ShutdownReason::Fatal("boom".into()));
    }
}
