//! Router assembly: infrastructure routes plus the staged pipeline.
//!
//! # Pipeline (applied in order)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌───────────────────┐
//! │   custom-post     │ ← caller injection point (observes final response)
//! └─────────┬─────────┘
//!           ▼
//! ┌───────────────────┐
//! │   suspend-gate    │ ← 503 for service routes while suspended
//! └─────────┬─────────┘
//!           ▼
//! ┌───────────────────┐
//! │  memory-logging   │ ← records one access line per exchange
//! └─────────┬─────────┘
//!           ▼
//! ┌───────────────────┐
//! │     tracing       │ ← X-Request-Id generation/propagation
//! └─────────┬─────────┘
//!           ▼
//! ┌───────────────────┐
//! │      auth         │ ← 403 if credentials rejected
//! └─────────┬─────────┘
//!           ▼
//! ┌───────────────────┐
//! │ custom-authorizer │ ← caller injection point
//! └─────────┬─────────┘
//!           ▼
//! ┌───────────────────┐
//! │     timeout       │ ← 503 if the handler exceeds its deadline
//! └─────────┬─────────┘
//!           ▼
//! ┌───────────────────┐
//! │   custom-pre      │ ← caller injection point (closest to the handler)
//! └─────────┬─────────┘
//!           ▼
//!        Handler
//! ```
//!
//! # Route Groups
//!
//! - Infrastructure: `/healthz`, `/suspend`, `/restart`, `/shutdown`,
//!   `/api`, `/uptime`, `/builder`, and (when memory logging is enabled)
//!   `/logs/*` and `/dumplog`
//! - Service: whatever the builder registered

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::{
    PipelineStages, RequestIdLayer, StageBinding, access_log, authenticate, enforce_deadline,
    suspend_gate,
};
use crate::state::{AppState, RouteEntry};

/// Infrastructure routes and their registry entries for the `/api` listing.
///
/// `/logs/*` and `/dumplog` exist only when memory logging is enabled;
/// without a ring there is nothing to inspect or flush.
pub fn infrastructure_routes(memory_logging: bool) -> (Vec<RouteEntry>, Router<AppState>) {
    let mut entries = vec![
        RouteEntry::new("healthz", "GET", "/healthz"),
        RouteEntry::new("suspend", "POST", "/suspend"),
        RouteEntry::new("suspend-status", "GET", "/suspend"),
        RouteEntry::new("restart", "POST", "/restart"),
        RouteEntry::new("shutdown", "POST", "/shutdown"),
        RouteEntry::new("api-listing", "GET", "/api"),
        RouteEntry::new("uptime", "GET", "/uptime"),
        RouteEntry::new("builder-snapshot", "GET", "/builder"),
    ];

    let mut router = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route(
            "/suspend",
            post(handlers::suspend).get(handlers::suspend_status),
        )
        .route("/restart", post(handlers::restart))
        .route("/shutdown", post(handlers::shutdown))
        .route("/api", get(handlers::api_listing))
        .route("/uptime", get(handlers::uptime))
        .route("/builder", get(handlers::builder_snapshot));

    if memory_logging {
        entries.extend([
            RouteEntry::new("logs-head", "GET", "/logs/head/{n}"),
            RouteEntry::new("logs-tail", "GET", "/logs/tail/{n}"),
            RouteEntry::new("logs-size", "GET", "/logs/size"),
            RouteEntry::new("dumplog", "POST", "/dumplog"),
        ]);
        router = router
            .route("/logs/head/{n}", get(handlers::head))
            .route("/logs/tail/{n}", get(handlers::tail))
            .route("/logs/size", get(handlers::size))
            .route("/dumplog", post(handlers::dump));
    }

    (entries, router)
}

/// Wrap the stateful router in the staged pipeline.
///
/// Layers are applied innermost first, so iterating the stage list in
/// reverse canonical order leaves the canonical outermost stage outermost.
pub fn apply_stages(router: Router, stages: &PipelineStages, state: &AppState) -> Router {
    let mut router = router;

    for (kind, binding) in stages.iter_innermost_first() {
        router = match binding {
            StageBinding::PassThrough => router,
            StageBinding::SuspendGate => {
                router.layer(from_fn_with_state(state.clone(), suspend_gate))
            }
            StageBinding::MemoryLogging => {
                router.layer(from_fn_with_state(state.clone(), access_log))
            }
            StageBinding::Tracing => {
                // span instrumentation inside, request-id tagging outside
                router
                    .layer(TraceLayer::new_for_http())
                    .layer(RequestIdLayer::new())
            }
            StageBinding::Auth(strategy) => {
                info!(stage = kind.name(), strategy = %strategy, "Auth stage active");
                router.layer(from_fn_with_state(*strategy, authenticate))
            }
            StageBinding::Timeout => {
                router.layer(from_fn_with_state(state.clone(), enforce_deadline))
            }
            StageBinding::Custom { name, mediator } => {
                info!(stage = kind.name(), mediator = %name, "Custom mediator active");
                let mediator = mediator.clone();
                router.layer(from_fn(move |req, next| {
                    let mediator = mediator.clone();
                    async move { mediator(req, next).await }
                }))
            }
        };
    }

    router
}
