mod health;
mod lifecycle;
mod logs;
mod meta;

pub use health::healthz;
pub use lifecycle::{SuspendedResponse, UptimeResponse, restart, shutdown, suspend, suspend_status, uptime};
pub use logs::{dump, head, size, tail};
pub use meta::{api_listing, builder_snapshot};
