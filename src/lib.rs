//! # Cradle
//!
//! A reusable HTTP service scaffold: a builder-assembled middleware
//! pipeline with a fixed stage order, a lifecycle-managed server
//! (suspend/restart/shutdown), and a concurrent in-memory access log with
//! disk eviction, all inspectable over HTTP.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pipeline (custom-post → suspend → memlog → tracing →       │
//! │            auth → custom-authorizer → timeout → custom-pre) │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (healthz, lifecycle, logs, introspection, yours)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Memory log (ring buffer + consumer task + flush sink)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::routing::get;
//! use cradle::{AuthStrategy, Config, ServerBuilder};
//!
//! #[tokio::main]
//! async fn main() -> cradle::AppResult<()> {
//!     let config = Config::from_env()?;
//!     let server = ServerBuilder::with_properties(config)
//!         .with_timeout_handler()
//!         .with_auth(AuthStrategy::Basic)
//!         .route("hello", "GET", "/hello", get(|| async { "hello" }))
//!         .build("demo", 8080)?;
//!     server.run().await
//! }
//! ```
//!
//! ## Lifecycle Surface
//!
//! Every built server exposes `/healthz`, `/suspend`, `/restart`,
//! `/shutdown`, `/uptime`, `/api`, `/builder`, and (with memory logging)
//! `/logs/head/{n}`, `/logs/tail/{n}`, `/logs/size`, `/dumplog`.

pub mod builder;
pub mod config;
pub mod error;
pub mod handlers;
pub mod memlog;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use builder::ServerBuilder;
pub use config::{AuthStrategy, Config, LogSinkKind, MemoryLoggerKind};
pub use error::{AppError, AppResult};
pub use memlog::{LogEntry, SizeReport};
pub use middleware::{CustomMediator, PipelineStages, StageBinding, StageKind};
pub use server::Server;
pub use state::{AppState, RouteEntry};
