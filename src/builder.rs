//! Owned, fluent server builder.
//!
//! A `ServerBuilder` is a value: configure it, register routes, then call
//! [`ServerBuilder::build`] to consume it into an immutable [`Server`].
//! Nothing here is process-global; two builders in the same process never
//! observe each other.
//!
//! ```rust,ignore
//! let server = ServerBuilder::with_properties(config)
//!     .with_memory_logger()
//!     .with_timeout_handler()
//!     .with_auth(AuthStrategy::Basic)
//!     .route("list-orders", "GET", "/orders", get(list_orders))
//!     .build("orders", 8080)?;
//! server.run().await?;
//! ```

use std::sync::Arc;

use axum::routing::MethodRouter;
use serde_json::json;
use tracing::info;

use crate::config::{AuthStrategy, Config, LogSinkKind, MemoryLoggerKind};
use crate::error::{AppError, AppResult};
use crate::memlog::{self, Sink};
use crate::middleware::{CustomMediator, PipelineStages, StageBinding, StageKind};
use crate::routes::{apply_stages, infrastructure_routes};
use crate::server::Server;
use crate::state::{AppState, RouteEntry};

/// Value recorded in the `/builder` snapshot for unset injection points.
const NO_MEDIATOR: &str = "none";

/// Fluent builder for a [`Server`].
pub struct ServerBuilder {
    config: Config,
    stages: PipelineStages,
    memory_logging: bool,
    custom_pre_name: String,
    custom_post_name: String,
    custom_authorizer_name: String,
    service_routes: Vec<(RouteEntry, MethodRouter<AppState>)>,
}

impl ServerBuilder {
    /// Builder with default configuration: suspend gate, memory logging,
    /// tracing and no-auth active; timeout and injection points inert.
    pub fn with_defaults() -> Self {
        Self::with_properties(Config::default())
    }

    /// Builder seeded from an explicit configuration value.
    ///
    /// The configured auth strategy becomes the auth-stage binding; all
    /// other stages start at their defaults.
    pub fn with_properties(config: Config) -> Self {
        let mut stages = PipelineStages::with_defaults();
        stages.replace(StageKind::Auth, StageBinding::Auth(config.auth_strategy));
        Self {
            config,
            stages,
            memory_logging: true,
            custom_pre_name: NO_MEDIATOR.to_string(),
            custom_post_name: NO_MEDIATOR.to_string(),
            custom_authorizer_name: NO_MEDIATOR.to_string(),
            service_routes: Vec::new(),
        }
    }

    // =========================================================================
    // Stage selection
    // =========================================================================

    /// Enable the memory-logging stage and the `/logs` + `/dumplog` routes
    /// (enabled by default).
    pub fn with_memory_logger(mut self) -> Self {
        self.memory_logging = true;
        self.stages
            .replace(StageKind::MemoryLogging, StageBinding::MemoryLogging);
        self
    }

    /// Disable memory logging entirely: no ring, no consumer task, no
    /// `/logs` or `/dumplog` routes.
    pub fn without_memory_logger(mut self) -> Self {
        self.memory_logging = false;
        self.stages
            .replace(StageKind::MemoryLogging, StageBinding::PassThrough);
        self
    }

    /// Enforce the configured handler deadline.
    pub fn with_timeout_handler(mut self) -> Self {
        self.stages.replace(StageKind::Timeout, StageBinding::Timeout);
        self
    }

    /// Enable request-id tracing (enabled by default).
    pub fn with_tracing(mut self) -> Self {
        self.stages.replace(StageKind::Tracing, StageBinding::Tracing);
        self
    }

    /// Select the authentication strategy for the auth stage.
    pub fn with_auth(mut self, strategy: AuthStrategy) -> Self {
        self.config.auth_strategy = strategy;
        self.stages
            .replace(StageKind::Auth, StageBinding::Auth(strategy));
        self
    }

    /// Install a caller-supplied mediator at the custom-authorizer stage
    /// (between auth and timeout).
    pub fn with_custom_authorizer(mut self, name: &str, mediator: CustomMediator) -> Self {
        self.custom_authorizer_name = name.to_string();
        self.stages.replace(
            StageKind::CustomAuthorizer,
            StageBinding::Custom {
                name: name.to_string(),
                mediator,
            },
        );
        self
    }

    /// Install a caller-supplied mediator at the custom-pre stage
    /// (innermost, closest to the handler).
    pub fn with_custom_pre(mut self, name: &str, mediator: CustomMediator) -> Self {
        self.custom_pre_name = name.to_string();
        self.stages.replace(
            StageKind::CustomPre,
            StageBinding::Custom {
                name: name.to_string(),
                mediator,
            },
        );
        self
    }

    /// Install a caller-supplied mediator at the custom-post stage
    /// (outermost, observes the final response).
    pub fn with_custom_post(mut self, name: &str, mediator: CustomMediator) -> Self {
        self.custom_post_name = name.to_string();
        self.stages.replace(
            StageKind::CustomPost,
            StageBinding::Custom {
                name: name.to_string(),
                mediator,
            },
        );
        self
    }

    // =========================================================================
    // Log sink selection
    // =========================================================================

    /// Select the flush destination for the memory log.
    pub fn with_log_sink(mut self, sink: LogSinkKind) -> Self {
        self.config.log_sink = sink;
        self
    }

    /// Directory receiving `<service>.log.<snapshotID>` files (file sink).
    pub fn with_log_file_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.config.log_file_dir = dir.into();
        self
    }

    // =========================================================================
    // Route registration
    // =========================================================================

    /// Register a service route. The name appears in the `/api` listing.
    pub fn route(mut self, name: &str, method: &str, path: &str, handler: MethodRouter<AppState>) -> Self {
        self.service_routes
            .push((RouteEntry::new(name, method, path), handler));
        self
    }

    // =========================================================================
    // Build
    // =========================================================================

    /// Consume the builder into an immutable [`Server`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the configuration fails validation,
    /// when a service route collides with an infrastructure prefix, or when
    /// the file sink points at a directory that does not exist.
    pub fn build(self, service: &str, port: u16) -> AppResult<Server> {
        self.config.validate()?;

        if service.is_empty() {
            return Err(AppError::Config("service name cannot be empty".to_string()));
        }

        for (entry, _) in &self.service_routes {
            if entry.is_infrastructure() {
                return Err(AppError::Config(format!(
                    "service route {} collides with an infrastructure path",
                    entry.path
                )));
            }
        }

        if self.memory_logging && self.config.log_sink == LogSinkKind::File {
            let dir = &self.config.log_file_dir;
            if !dir.is_dir() {
                return Err(AppError::Config(format!(
                    "LOG_FILE_DIR {} does not exist or is not a directory",
                    dir.display()
                )));
            }
        }

        let properties = self.snapshot(service, port);

        let (mut entries, mut router) = infrastructure_routes(self.memory_logging);
        for (entry, handler) in self.service_routes {
            router = router.route(&entry.path, handler);
            entries.push(entry);
        }

        let config = Arc::new(self.config);

        let mut state = AppState::new(service, port, config.clone(), None, entries, properties);

        let consumer = if self.memory_logging {
            let sink = Sink::from_config(config.log_sink, &config.log_file_dir);
            let (handle, consumer) = memlog::channel(
                service,
                config.memory_logger_capacity,
                sink,
                state.task_cancel_token(),
            );
            state.mem_log = Some(handle);
            Some(consumer)
        } else {
            None
        };

        let router = apply_stages(router.with_state(state.clone()), &self.stages, &state);

        info!(
            service,
            port,
            memory_logging = self.memory_logging,
            auth = %config.auth_strategy,
            "Server built"
        );

        Ok(Server::new(state, router, consumer))
    }

    /// The configuration snapshot served by `/builder`.
    fn snapshot(&self, service: &str, port: u16) -> serde_json::Value {
        let qos = if self.memory_logging {
            match self.config.memory_logger {
                MemoryLoggerKind::EntryBound => {
                    format!("EntryBound({})", self.config.memory_logger_capacity)
                }
                MemoryLoggerKind::MemoryBound => "MemoryBound".to_string(),
            }
        } else {
            "disabled".to_string()
        };

        json!({
            "serviceName": service,
            "listenPort": port,
            "handlerTimeout (secs)": self.config.handler_timeout.as_secs(),
            "rateLimit (per min)": self.config.rate_limit_per_min,
            "shutdownWait (secs)": self.config.shutdown_wait.as_secs(),
            "authStrategy": self.config.auth_strategy.to_string(),
            "logFileDir": self.config.log_file_dir.display().to_string(),
            "LogSink": self.config.log_sink.to_string(),
            "memoryLoggerType": self.config.memory_logger.to_string(),
            "MemoryLoggerQoS": qos,
            "CustomPreMediator": self.custom_pre_name,
            "CustomPostMediator": self.custom_post_name,
            "CustomAuthorizer": self.custom_authorizer_name,
        })
    }
}
