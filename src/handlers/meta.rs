//! Introspection endpoints.
//!
//! # Endpoints
//!
//! - `GET /api` - registered routes grouped into `"base-service"`
//!   (infrastructure) and one group per service name
//! - `GET /builder` - the configuration snapshot captured at build time
//!
//! # `/api` Response Body
//!
//! ```json
//! {
//!   "base-service": ["healthz                          GET    /healthz", ...],
//!   "orders": ["list-orders                      GET    /orders", ...]
//! }
//! ```

use axum::Json;
use axum::extract::State;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::state::AppState;

/// Registered routes grouped by infrastructure vs. service.
#[instrument(skip(state))]
pub async fn api_listing(State(state): State<AppState>) -> Json<Value> {
    let mut base = Vec::new();
    let mut service = Vec::new();

    for route in state.routes() {
        let line = Value::String(route.describe());
        if route.is_infrastructure() {
            base.push(line);
        } else {
            service.push(line);
        }
    }

    let mut groups = Map::new();
    groups.insert("base-service".to_string(), Value::Array(base));
    groups.insert(state.service_name.to_string(), Value::Array(service));
    Json(Value::Object(groups))
}

/// Read-only snapshot of the effective builder configuration.
#[instrument(skip(state))]
pub async fn builder_snapshot(State(state): State<AppState>) -> Json<Value> {
    Json(state.properties().clone())
}
