//! Lifecycle endpoints: suspend, restart, shutdown, uptime.
//!
//! # Endpoints
//!
//! - `POST /suspend` - enter the suspended state (204, or 400 if already suspended)
//! - `GET /suspend` - report the suspended flag
//! - `POST /restart` - leave the suspended state (204, or 400 if not suspended)
//! - `POST /shutdown` - begin graceful stop (204 after a short delay)
//! - `GET /uptime` - elapsed run time and cumulative suspended time

use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Delay before the shutdown token fires, giving in-flight work a moment
/// to settle before the listener stops accepting.
const SHUTDOWN_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize)]
pub struct SuspendedResponse {
    pub suspended: bool,
}

#[derive(Debug, Serialize)]
pub struct UptimeResponse {
    pub uptime: String,
    // Trailing colon is part of the wire contract; clients parse it as-is.
    #[serde(rename = "suspended:")]
    pub suspended: String,
}

/// Enter the suspended state.
#[instrument(skip(state))]
pub async fn suspend(State(state): State<AppState>) -> AppResult<StatusCode> {
    if state.try_suspend() {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::BadRequest("already suspended".to_string()))
    }
}

/// Report the suspended flag.
#[instrument(skip(state))]
pub async fn suspend_status(State(state): State<AppState>) -> Json<SuspendedResponse> {
    Json(SuspendedResponse {
        suspended: state.is_suspended(),
    })
}

/// Leave the suspended state.
#[instrument(skip(state))]
pub async fn restart(State(state): State<AppState>) -> AppResult<StatusCode> {
    if state.try_restart() {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::BadRequest("not suspended".to_string()))
    }
}

/// Begin graceful shutdown: sleep briefly, fire the token, then answer
/// 204. The token fires before the response goes out, but the graceful
/// drain keeps this connection alive until the 204 is delivered.
#[instrument(skip(state))]
pub async fn shutdown(State(state): State<AppState>) -> StatusCode {
    info!(service = %state.service_name, "API driven shutdown requested");
    tokio::time::sleep(SHUTDOWN_DELAY).await;
    state.trigger_shutdown();
    StatusCode::NO_CONTENT
}

/// Elapsed run time and cumulative suspended time.
#[instrument(skip(state))]
pub async fn uptime(State(state): State<AppState>) -> Json<UptimeResponse> {
    Json(UptimeResponse {
        uptime: format_hms(state.uptime()),
        suspended: format_hms(state.suspended_duration()),
    })
}

/// `"H: 1, M: 2, S: 3"`, truncating sub-second remainders.
fn format_hms(d: Duration) -> String {
    let total = d.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("H: {hours}, M: {minutes}, S: {seconds}")
}
