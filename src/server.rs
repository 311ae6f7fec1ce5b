//! The assembled server and its lifecycle.
//!
//! # Stop Sequence
//!
//! 1. The shutdown token fires (OS signal or `POST /shutdown`).
//! 2. The listener stops accepting and drains in-flight connections,
//!    bounded by the configured shutdown wait; exceeding the bound forces
//!    teardown with a warning.
//! 3. Background tasks are cancelled; the log consumer drains whatever is
//!    still queued, then exits.
//!
//! Steps run strictly in this order so that requests completing during the
//! drain can still reach the log channel before the consumer stops.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::memlog::LogConsumer;
use crate::state::AppState;
use crate::utils;

/// An immutable, ready-to-run server produced by the builder.
pub struct Server {
    state: AppState,
    router: Router,
    consumer: Option<LogConsumer>,
}

impl Server {
    pub(crate) fn new(state: AppState, router: Router, consumer: Option<LogConsumer>) -> Self {
        Self {
            state,
            router,
            consumer,
        }
    }

    /// Shared state, for observation before or during a run.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The fully staged router. Useful for driving the pipeline in tests
    /// without binding a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Split the server into its parts. Callers take responsibility for
    /// running the consumer task; [`Server::run`] does this automatically.
    pub fn into_parts(self) -> (AppState, Router, Option<LogConsumer>) {
        (self.state, self.router, self.consumer)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the bind fails or the listener
    /// errors while serving.
    pub async fn run(self) -> AppResult<()> {
        let addr = self.state.config.server_addr(self.state.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Internal(format!("failed to bind {addr}: {e}")))?;
        self.run_with_listener(listener).await
    }

    /// Serve on an already-bound listener until shutdown.
    pub async fn run_with_listener(mut self, listener: TcpListener) -> AppResult<()> {
        if let Some(consumer) = self.consumer.take() {
            self.state.spawn_background(consumer.run());
        }

        tokio::spawn(utils::watch_shutdown_signal(self.state.shutdown_token()));

        let local_addr = listener
            .local_addr()
            .map_err(|e| AppError::Internal(format!("listener address unavailable: {e}")))?;
        info!(
            service = %self.state.service_name,
            addr = %local_addr,
            "Server listening"
        );

        let shutdown = self.state.shutdown_token();
        let graceful = {
            let token = shutdown.clone();
            async move {
                token.cancelled().await;
            }
        };

        let serve = axum::serve(
            listener,
            self.router
                .clone()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(graceful);

        let drain_bound = self.state.config.shutdown_wait;
        let forced_teardown = async {
            shutdown.cancelled().await;
            tokio::time::sleep(drain_bound).await;
        };

        tokio::select! {
            result = serve => {
                result.map_err(|e| AppError::Internal(format!("server error: {e}")))?;
                info!(service = %self.state.service_name, "HTTP listener stopped");
            }
            _ = forced_teardown => {
                warn!(
                    service = %self.state.service_name,
                    wait = ?drain_bound,
                    "Graceful drain exceeded shutdown wait, forcing teardown"
                );
            }
        }

        self.state.shutdown_background().await;
        info!(service = %self.state.service_name, "Server shutdown complete");
        Ok(())
    }
}
