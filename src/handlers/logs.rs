//! Memory-log inspection endpoints.
//!
//! # Endpoints
//!
//! - `GET /logs/head/{n}` - first n buffered entries
//! - `GET /logs/tail/{n}` - last n buffered entries
//! - `GET /logs/size` - `{"max", "current", "evicted"}`
//! - `POST /dumplog` - force a flush to the sink
//!
//! All reads take a snapshot under the shared lock; out-of-range `n` is
//! clamped, never an error. These routes are registered only when memory
//! logging is enabled.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::instrument;

use crate::error::{AppError, AppResult};
use crate::memlog::{LogEntry, MemoryLogHandle, SizeReport};
use crate::state::AppState;

fn handle(state: &AppState) -> AppResult<&MemoryLogHandle> {
    state
        .mem_log
        .as_ref()
        .ok_or_else(|| AppError::NotFound("memory logging is disabled".to_string()))
}

/// First n buffered entries, oldest first.
#[instrument(skip(state))]
pub async fn head(
    State(state): State<AppState>,
    Path(n): Path<usize>,
) -> AppResult<Json<Vec<LogEntry>>> {
    Ok(Json(handle(&state)?.head(n).await))
}

/// Last n buffered entries, still in append order.
#[instrument(skip(state))]
pub async fn tail(
    State(state): State<AppState>,
    Path(n): Path<usize>,
) -> AppResult<Json<Vec<LogEntry>>> {
    Ok(Json(handle(&state)?.tail(n).await))
}

/// Capacity, occupancy, and lifetime eviction count.
#[instrument(skip(state))]
pub async fn size(State(state): State<AppState>) -> AppResult<Json<SizeReport>> {
    Ok(Json(handle(&state)?.size().await))
}

/// Request an out-of-band flush. The consumer performs the flush
/// asynchronously and records a trailer entry in the fresh generation.
#[instrument(skip(state))]
pub async fn dump(State(state): State<AppState>) -> AppResult<StatusCode> {
    handle(&state)?.request_dump();
    Ok(StatusCode::NO_CONTENT)
}
