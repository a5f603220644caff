use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use super::context::ContextBuilder;
use crate::tracker::{RecordOutcome, Recorder};

pub struct VisitTracker {
    pub recorder: Arc<Recorder>,
    pub contexts: ContextBuilder,
}

impl VisitTracker {
    pub fn new(recorder: Arc<Recorder>, contexts: ContextBuilder) -> Self {
        Self { recorder, contexts }
    }
}

/// Record the request as a visit before handing it to the inner service.
///
/// Tracking failures are logged and never fail the request.
pub async fn track_visits(
    State(tracker): State<Arc<VisitTracker>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    if let Some(ctx) = tracker.contexts.build(&parts) {
        match tracker.recorder.record(&ctx).await {
            Ok(RecordOutcome::Skipped(reason)) => {
                tracing::trace!(url = %ctx.url, ?reason, "visit not recorded");
            }
            Ok(_) => {}
            Err(err) => {
                warn!(url = %ctx.url, error = %err, "failed to record visit");
            }
        }
    }

    next.run(Request::from_parts(parts, body)).await
}
