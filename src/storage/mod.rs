pub mod postgres;
pub mod sqlite;
pub mod trait_def;

use std::sync::Arc;

use crate::config::{DatabaseBackend, DatabaseConfig};

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{SimilarQuery, Storage, StorageError, StorageResult, VISITS_TABLE};

/// Open the configured backend
pub async fn connect(config: &DatabaseConfig) -> StorageResult<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.backend {
        DatabaseBackend::Sqlite => {
            Arc::new(SqliteStorage::new(&config.url, config.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            Arc::new(PostgresStorage::new(&config.url, config.max_connections).await?)
        }
    };
    Ok(storage)
}
