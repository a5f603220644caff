//! axum adapter: turns incoming requests into visit contexts and records them.

pub mod context;
pub mod ip_extractor;
pub mod middleware;
pub mod routes;
pub mod session;

pub use context::{is_ajax, ContextBuilder};
pub use ip_extractor::ClientIpExtractor;
pub use middleware::{track_visits, VisitTracker};
pub use routes::{with_cookie_sessions, with_tracking};
pub use session::session_from_cookie;
