//! Handler deadline enforcement.
//!
//! Bounds the time the inner stages (including the handler) may take. On
//! expiry the client receives 503 with a short text body; the handler future
//! is dropped at the await point.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::state::AppState;

pub const TIMEOUT_BODY: &str = "timed out";

pub async fn enforce_deadline(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let deadline = state.config.handler_timeout;
    let path = req.uri().path().to_string();

    match tokio::time::timeout(deadline, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(%path, timeout = ?deadline, "Handler exceeded deadline");
            (StatusCode::SERVICE_UNAVAILABLE, TIMEOUT_BODY).into_response()
        }
    }
}
