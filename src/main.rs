use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use visits::api;
use visits::config::Config;
use visits::storage;
use visits::tracker::{Recorder, SystemClock, TransformerRegistry};
use visits::web::{self, ClientIpExtractor, ContextBuilder, VisitTracker};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    info!(
        "Using {:?} storage: {}",
        config.database.backend, config.database.url
    );
    let storage = storage::connect(&config.database)
        .await
        .context("failed to connect to database")?;

    let registry = TransformerRegistry::with_builtins();
    let recorder = Recorder::new(
        &config.visits,
        Arc::clone(&storage),
        &registry,
        Arc::new(SystemClock),
    )
    .await
    .context("visit tracking is misconfigured")?;

    info!(
        "Tracking visitors by {} with a {} minute reset window",
        recorder.tracking_method(),
        recorder.reset_minutes()
    );
    if !config.visits.transformers.is_empty() {
        info!("Transformers: {}", config.visits.transformers.join(", "));
    }

    let mut app = api::create_api_router(Arc::clone(&storage));

    if config.visits.track_all_pages {
        let extractor = ClientIpExtractor::from_config(&config.request)?;
        let tracker = Arc::new(VisitTracker::new(
            Arc::new(recorder),
            ContextBuilder::new(extractor, config.request.default_scheme.clone()),
        ));
        app = web::with_tracking(app, tracker);
        info!("📈 Tracking all pages");
    } else {
        info!("Page tracking is disabled (VISITS_TRACK_ALL_PAGES=false)");
    }

    let app = web::with_cookie_sessions(app, &config.request.session_cookie_name);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
