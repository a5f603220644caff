use crate::models::{NewVisit, TopPath, TrackingMethod, Visit};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Lookup for a prior visit from the same visitor on the same page.
#[derive(Debug, Clone)]
pub struct SimilarQuery<'a> {
    pub method: TrackingMethod,
    /// Null values match rows where the tracking column is null
    pub value: Option<&'a str>,
    pub host: &'a str,
    pub path: &'a str,
    /// Lower bound on `created_at` (Unix seconds, inclusive)
    pub since: i64,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Create the visits table and its indexes
    async fn init(&self) -> StorageResult<()>;

    /// Whether the visits table exists
    async fn table_exists(&self) -> StorageResult<bool>;

    /// Most recently created visit matching the query, if any
    async fn find_similar(&self, query: &SimilarQuery<'_>) -> StorageResult<Option<Visit>>;

    /// Persist a new visit with a view count of one
    async fn insert(&self, visit: &NewVisit, now: i64) -> StorageResult<Visit>;

    /// Add one view to an existing visit.
    /// Returns `None` if the row no longer exists.
    async fn increment_views(&self, id: i64, now: i64) -> StorageResult<Option<Visit>>;

    /// List visits, newest first
    async fn list(&self, limit: i64, offset: i64) -> StorageResult<Vec<Visit>>;

    /// Pages ordered by total views
    async fn top_paths(&self, limit: i64) -> StorageResult<Vec<TopPath>>;
}

/// Name of the table holding visit rows.
pub const VISITS_TABLE: &str = "visits";
