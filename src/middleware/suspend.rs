//! Suspension gate.
//!
//! While the server is suspended, service routes answer 503 without invoking
//! the inner stages. Infrastructure paths always pass so the server can be
//! observed and restarted while suspended.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::state::{AppState, is_infrastructure};

pub const SUSPENDED_BODY: &str = "Temporarily Suspended";

pub async fn suspend_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if state.is_suspended() && !is_infrastructure(req.uri().path()) {
        debug!(path = %req.uri().path(), "Rejecting request while suspended");
        return (StatusCode::SERVICE_UNAVAILABLE, SUSPENDED_BODY).into_response();
    }
    next.run(req).await
}
