use axum::{middleware, Router};
use std::sync::Arc;

use super::middleware::{track_visits, VisitTracker};
use super::session::session_from_cookie;

/// Wrap every route of `router` with visit tracking.
pub fn with_tracking(router: Router, tracker: Arc<VisitTracker>) -> Router {
    router.layer(middleware::from_fn_with_state(tracker, track_visits))
}

/// Read sessions from `cookie_name`. Must be layered outside the tracker so
/// the session is present when the visit is recorded.
pub fn with_cookie_sessions(router: Router, cookie_name: &str) -> Router {
    let cookie_name: Arc<str> = Arc::from(cookie_name);
    router.layer(middleware::from_fn_with_state(cookie_name, session_from_cookie))
}
