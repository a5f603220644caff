//! End-to-end tests for the tracking middleware and the visits API
//!
//! Requests go through a real axum router with sessions, client IP
//! extraction and the recorder wired together.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::{Layer, ServiceExt};
use visits::api::create_api_router;
use visits::config::{RequestConfig, TrustedProxyMode, VisitsConfig};
use visits::models::{NewVisit, TopPath, Visit};
use visits::storage::{SimilarQuery, SqliteStorage, Storage, StorageError, StorageResult};
use visits::tracker::{ManualClock, Recorder, TransformerRegistry};
use visits::web::{with_cookie_sessions, with_tracking, ClientIpExtractor, ContextBuilder, VisitTracker};

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// Helper layer to inject ConnectInfo for tests
#[derive(Clone)]
struct TestConnectInfoLayer;

impl<S> Layer<S> for TestConnectInfoLayer {
    type Service = TestConnectInfoMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TestConnectInfoMiddleware { inner }
    }
}

#[derive(Clone)]
struct TestConnectInfoMiddleware<S> {
    inner: S,
}

impl<S, B> tower::Service<Request<B>> for TestConnectInfoMiddleware<S>
where
    S: tower::Service<Request<B>> + Clone,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let addr = SocketAddr::from(([10, 0, 0, 1], 12345));
        req.extensions_mut()
            .insert(axum::extract::connect_info::ConnectInfo(addr));
        self.inner.call(req)
    }
}

async fn create_app(
    storage: Arc<dyn Storage>,
    visits: VisitsConfig,
    request: RequestConfig,
) -> Router {
    let recorder = Recorder::new(
        &visits,
        Arc::clone(&storage),
        &TransformerRegistry::with_builtins(),
        Arc::new(ManualClock::new(1_700_000_000)),
    )
    .await
    .unwrap();

    let tracker = Arc::new(VisitTracker::new(
        Arc::new(recorder),
        ContextBuilder::new(
            ClientIpExtractor::from_config(&request).unwrap(),
            request.default_scheme.clone(),
        ),
    ));

    let pages = Router::new()
        .route("/", get(|| async { "home" }))
        .route("/admin/settings", get(|| async { "admin" }))
        .route("/blog/{slug}", get(|| async { "post" }));

    let app = with_tracking(pages, tracker);
    with_cookie_sessions(app, &request.session_cookie_name)
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("host", "example.com")
        .header("user-agent", "integration-test")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_repeat_page_views_increment() {
    let storage = create_test_storage().await;
    let app = create_app(
        Arc::clone(&storage),
        VisitsConfig::default(),
        RequestConfig::default(),
    )
    .await;

    for _ in 0..3 {
        let response = app
            .clone()
            .layer(TestConnectInfoLayer)
            .oneshot(get_request("/blog/hello?utm=x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let visits = storage.list(10, 0).await.unwrap();
    assert_eq!(visits.len(), 1);
    let visit = &visits[0];
    assert_eq!(visit.views, 3);
    assert_eq!(visit.host, "example.com");
    assert_eq!(visit.path, "/blog/hello");
    assert_eq!(visit.query.as_deref(), Some("utm=x"));
    assert_eq!(visit.ip_address.as_deref(), Some("10.0.0.1"));
    assert_eq!(visit.user_agent, "integration-test");
}

#[tokio::test]
async fn test_excluded_and_ajax_requests_pass_through_untracked() {
    let storage = create_test_storage().await;
    let visits = VisitsConfig {
        exclude_uris: vec!["/admin.*".to_string()],
        ..VisitsConfig::default()
    };
    let app = create_app(Arc::clone(&storage), visits, RequestConfig::default()).await;

    let response = app
        .clone()
        .layer(TestConnectInfoLayer)
        .oneshot(get_request("/admin/settings"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let ajax = Request::builder()
        .uri("/")
        .header("host", "example.com")
        .header("x-requested-with", "XMLHttpRequest")
        .body(Body::empty())
        .unwrap();
    let response = app
        .layer(TestConnectInfoLayer)
        .oneshot(ajax)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(storage.list(10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_session_cookie_tracking() {
    let storage = create_test_storage().await;
    let visits = VisitsConfig {
        tracking_method: "session_id".to_string(),
        ..VisitsConfig::default()
    };
    let app = create_app(Arc::clone(&storage), visits, RequestConfig::default()).await;

    for session in ["alpha", "alpha", "beta"] {
        let request = Request::builder()
            .uri("/")
            .header("host", "example.com")
            .header("cookie", format!("theme=dark; visits_session={session}"))
            .body(Body::empty())
            .unwrap();
        app.clone()
            .layer(TestConnectInfoLayer)
            .oneshot(request)
            .await
            .unwrap();
    }

    let mut visits = storage.list(10, 0).await.unwrap();
    visits.sort_by(|a, b| a.session_id.cmp(&b.session_id));
    assert_eq!(visits.len(), 2);
    assert_eq!(visits[0].session_id, "alpha");
    assert_eq!(visits[0].views, 2);
    assert_eq!(visits[1].session_id, "beta");
    assert_eq!(visits[1].views, 1);
}

#[tokio::test]
async fn test_forwarded_client_ip_behind_trusted_proxy() {
    let storage = create_test_storage().await;
    let request_config = RequestConfig {
        trusted_proxy_mode: TrustedProxyMode::Standard,
        trusted_proxies: vec!["10.0.0.0/8".to_string()],
        ..RequestConfig::default()
    };
    let app = create_app(Arc::clone(&storage), VisitsConfig::default(), request_config).await;

    let request = Request::builder()
        .uri("/")
        .header("host", "example.com")
        .header("x-forwarded-for", "203.0.113.7, 10.1.2.3")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap();
    app.layer(TestConnectInfoLayer)
        .oneshot(request)
        .await
        .unwrap();

    let visits = storage.list(10, 0).await.unwrap();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].ip_address.as_deref(), Some("203.0.113.7"));
    assert_eq!(visits[0].scheme, "https");
}

/// Storage that passes the startup check but fails every query
struct BrokenStorage;

#[async_trait::async_trait]
impl Storage for BrokenStorage {
    async fn init(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn table_exists(&self) -> StorageResult<bool> {
        Ok(true)
    }

    async fn find_similar(&self, _query: &SimilarQuery<'_>) -> StorageResult<Option<Visit>> {
        Err(StorageError::Other(anyhow::anyhow!("connection reset")))
    }

    async fn insert(&self, _visit: &NewVisit, _now: i64) -> StorageResult<Visit> {
        Err(StorageError::Other(anyhow::anyhow!("connection reset")))
    }

    async fn increment_views(&self, _id: i64, _now: i64) -> StorageResult<Option<Visit>> {
        Err(StorageError::Other(anyhow::anyhow!("connection reset")))
    }

    async fn list(&self, _limit: i64, _offset: i64) -> StorageResult<Vec<Visit>> {
        Err(StorageError::Other(anyhow::anyhow!("connection reset")))
    }

    async fn top_paths(&self, _limit: i64) -> StorageResult<Vec<TopPath>> {
        Err(StorageError::Other(anyhow::anyhow!("connection reset")))
    }
}

#[tokio::test]
async fn test_tracking_failure_does_not_fail_request() {
    let app = create_app(
        Arc::new(BrokenStorage),
        VisitsConfig::default(),
        RequestConfig::default(),
    )
    .await;

    let response = app
        .layer(TestConnectInfoLayer)
        .oneshot(get_request("/"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_api_storage_failure_is_500() {
    let api = create_api_router(Arc::new(BrokenStorage));

    let response = api
        .oneshot(Request::builder().uri("/api/visits").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_api_lists_visits_and_top_paths() {
    let storage = create_test_storage().await;
    let app = create_app(
        Arc::clone(&storage),
        VisitsConfig::default(),
        RequestConfig::default(),
    )
    .await;

    for uri in ["/", "/", "/blog/a"] {
        app.clone()
            .layer(TestConnectInfoLayer)
            .oneshot(get_request(uri))
            .await
            .unwrap();
    }

    let api = create_api_router(Arc::clone(&storage));

    let response = api
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = api
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/visits?limit=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed: Vec<Visit> = body_json(response).await;
    assert_eq!(listed.len(), 1);

    let response = api
        .oneshot(
            Request::builder()
                .uri("/api/visits/top")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let top: Vec<TopPath> = body_json(response).await;
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].path, "/");
    assert_eq!(top[0].views, 2);
}
