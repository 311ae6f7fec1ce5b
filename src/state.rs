//! Shared application state for request handlers and pipeline stages.
//!
//! # Thread Safety
//!
//! The state is cloned into every handler and middleware closure. Flags use
//! atomics (visibility only, no ordering dependencies); suspend-time
//! accounting sits behind a small mutex; the memory-log handle shares its
//! ring through a read/write lock. Background tasks are tracked with
//! `TaskTracker` and stopped through a `CancellationToken`, mirroring the
//! server's stop sequence: listener drain first, then log-consumer drain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::config::Config;
use crate::memlog::MemoryLogHandle;

/// Path prefixes that belong to the scaffold itself. These are exempt from
/// suspension blocking and grouped as "base-service" in the `/api` listing.
pub const INFRASTRUCTURE_PREFIXES: [&str; 9] = [
    "/api",
    "/logs",
    "/dumplog",
    "/uptime",
    "/healthz",
    "/suspend",
    "/restart",
    "/shutdown",
    "/builder",
];

/// Whether a request path belongs to the infrastructure surface.
pub fn is_infrastructure(path: &str) -> bool {
    INFRASTRUCTURE_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

/// One registered route, recorded for the `/api` listing.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub name: String,
    pub method: String,
    pub path: String,
}

impl RouteEntry {
    pub fn new(name: &str, method: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            method: method.to_string(),
            path: path.to_string(),
        }
    }

    /// Fixed-width description line used by the `/api` listing.
    pub fn describe(&self) -> String {
        format!("{:<30}{:>6}    {}", self.name, self.method, self.path)
    }

    pub fn is_infrastructure(&self) -> bool {
        is_infrastructure(&self.path)
    }
}

#[derive(Debug, Default)]
struct SuspendTracking {
    suspended_at: Option<Instant>,
    total: Duration,
}

/// Shared application state. Cheap to clone; all internals are `Arc`-backed.
#[derive(Clone)]
pub struct AppState {
    /// Service name supplied to `ServerBuilder::build`.
    pub service_name: Arc<String>,
    /// Listen port the server was built for.
    pub port: u16,
    /// Immutable configuration consumed at build time.
    pub config: Arc<Config>,
    /// Memory-log handle; `None` when memory logging is disabled.
    pub mem_log: Option<MemoryLogHandle>,
    /// Timestamp when the server was started.
    pub started_at: Instant,

    healthy: Arc<AtomicBool>,
    suspended: Arc<AtomicBool>,
    suspend: Arc<Mutex<SuspendTracking>>,
    routes: Arc<Vec<RouteEntry>>,
    properties: Arc<serde_json::Value>,
    shutdown: CancellationToken,
    task_cancel: CancellationToken,
    task_tracker: TaskTracker,
}

impl AppState {
    pub fn new(
        service_name: &str,
        port: u16,
        config: Arc<Config>,
        mem_log: Option<MemoryLogHandle>,
        routes: Vec<RouteEntry>,
        properties: serde_json::Value,
    ) -> Self {
        Self {
            service_name: Arc::new(service_name.to_string()),
            port,
            config,
            mem_log,
            started_at: Instant::now(),
            healthy: Arc::new(AtomicBool::new(true)),
            suspended: Arc::new(AtomicBool::new(false)),
            suspend: Arc::new(Mutex::new(SuspendTracking::default())),
            routes: Arc::new(routes),
            properties: Arc::new(properties),
            shutdown: CancellationToken::new(),
            task_cancel: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        }
    }

    // =========================================================================
    // Health / suspension
    // =========================================================================

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Relaxed)
    }

    /// Enter Suspended. Returns `false` if already suspended.
    ///
    /// The mutex is the authority for the transition; the atomic flag is a
    /// fast read path for the suspend gate.
    pub fn try_suspend(&self) -> bool {
        let mut tracking = self.suspend.lock().unwrap_or_else(PoisonError::into_inner);
        if self.suspended.load(Ordering::Relaxed) {
            return false;
        }
        tracking.suspended_at = Some(Instant::now());
        self.suspended.store(true, Ordering::Relaxed);
        info!(service = %self.service_name, "API driven suspension successful");
        true
    }

    /// Leave Suspended, accumulating the elapsed suspended time.
    /// Returns `false` if not currently suspended.
    pub fn try_restart(&self) -> bool {
        let mut tracking = self.suspend.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.suspended.load(Ordering::Relaxed) {
            return false;
        }
        if let Some(since) = tracking.suspended_at.take() {
            tracking.total += since.elapsed();
        }
        self.suspended.store(false, Ordering::Relaxed);
        info!(service = %self.service_name, "API driven restart successful");
        true
    }

    /// Cumulative suspended time, including the current suspension if any.
    pub fn suspended_duration(&self) -> Duration {
        let tracking = self.suspend.lock().unwrap_or_else(PoisonError::into_inner);
        let mut total = tracking.total;
        if let Some(since) = tracking.suspended_at {
            total += since.elapsed();
        }
        total
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    // =========================================================================
    // Routes / properties
    // =========================================================================

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    /// Read-only configuration snapshot served by `/builder`.
    pub fn properties(&self) -> &serde_json::Value {
        &self.properties
    }

    // =========================================================================
    // Shutdown coordination
    // =========================================================================

    /// Token cancelled when graceful shutdown begins (signal or `/shutdown`).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Begin graceful shutdown of the HTTP listener.
    pub fn trigger_shutdown(&self) {
        info!(service = %self.service_name, "Shutdown triggered");
        self.shutdown.cancel();
    }

    /// Token observed by background tasks (the log consumer).
    pub fn task_cancel_token(&self) -> CancellationToken {
        self.task_cancel.clone()
    }

    /// Spawn a tracked background task.
    pub fn spawn_background<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.task_tracker.spawn(task);
    }

    /// Stop and await all background tasks: cancel, close, wait.
    ///
    /// Called after the HTTP listener has drained so in-flight requests can
    /// still reach the log channel; the consumer drains it before exiting.
    pub async fn shutdown_background(&self) {
        info!(service = %self.service_name, "Stopping background tasks");
        self.task_cancel.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;
        info!(service = %self.service_name, "All background tasks completed");
    }
}
