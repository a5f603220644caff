use axum::{routing::get, Router};
use std::sync::Arc;

use crate::storage::Storage;

use super::handlers::{health_check, list_visits, top_paths, AppState};

pub fn create_api_router(storage: Arc<dyn Storage>) -> Router {
    let state = Arc::new(AppState { storage });

    Router::new()
        .route("/health", get(health_check))
        .route("/api/visits", get(list_visits))
        .route("/api/visits/top", get(top_paths))
        .with_state(state)
}
