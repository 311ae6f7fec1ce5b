//! Pipeline stages (mediators) composed around the router.
//!
//! Stage order is fixed; see [`stage`] for the canonical list and the
//! builder for how bindings are selected.

pub mod auth;
pub mod logging;
pub mod request_id;
pub mod stage;
pub mod suspend;
pub mod timeout;

pub use auth::{AUTH_USER_HEADER, AuthUser, authenticate};
pub use logging::{ACCESS_LOG_TARGET, access_log};
pub use request_id::{REQUEST_ID_HEADER, RequestIdExt, RequestIdLayer};
pub use stage::{CustomMediator, PipelineStages, StageBinding, StageKind};
pub use suspend::suspend_gate;
pub use timeout::enforce_deadline;
