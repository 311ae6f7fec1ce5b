use std::process::ExitCode;

use axum::Json;
use axum::routing::get;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cradle::memlog::{LogTee, tee};
use cradle::{Config, ServerBuilder};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the demo service, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    // A misconfigured service must not start. The subscriber is not up
    // yet, so this failure goes to stderr directly.
    let config = Config::from_env().map_err(|e| {
        eprintln!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    let port = config.listen_port;

    // Subscriber first, so build-time diagnostics are captured. The tee
    // buffers its copy of each line until the memory log exists.
    let (tee_writer, tee_rx) = LogTee::detached();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(tee_writer)
        .init();

    info!("Starting demo service v{}", env!("CARGO_PKG_VERSION"));

    let server = ServerBuilder::with_properties(config)
        .with_timeout_handler()
        .route("hello", "GET", "/hello", get(hello))
        .build("demo", port)
        .map_err(|e| {
            error!("Failed to build server: {e}");
            exitcode::CONFIG
        })?;

    match server.state().mem_log.clone() {
        Some(handle) => {
            tokio::spawn(tee::forward(tee_rx, handle));
        }
        // without a ring, tee lines have nowhere to go
        None => drop(tee_rx),
    }

    server.run().await.map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })
}

/// Minimal service route so the `/api` listing has a service group.
async fn hello() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "hello" }))
}
