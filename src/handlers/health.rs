//! Health probe endpoint.
//!
//! `GET /healthz` is bodyless: 200 when the server is healthy and not
//! suspended, 503 otherwise. Probes are not recorded in the memory log.

use axum::extract::State;
use axum::http::StatusCode;
use tracing::instrument;

use crate::state::AppState;

/// Health probe for load balancers and orchestration.
#[instrument(skip(state))]
pub async fn healthz(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    if state.is_healthy() && !state.is_suspended() {
        Ok(StatusCode::OK)
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
