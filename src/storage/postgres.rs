use crate::models::{NewVisit, TopPath, Visit};
use crate::storage::{SimilarQuery, Storage, StorageResult, VISITS_TABLE};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

const VISIT_COLUMNS: &str = "id, session_id, user_id, ip_address, user_agent, scheme, host, port, \
                             path, query, views, created_at, updated_at";

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visits (
                id BIGSERIAL PRIMARY KEY,
                session_id TEXT NOT NULL DEFAULT '',
                user_id TEXT,
                ip_address TEXT,
                user_agent TEXT NOT NULL DEFAULT '',
                scheme TEXT NOT NULL,
                host TEXT NOT NULL,
                port INTEGER,
                path TEXT NOT NULL,
                query TEXT,
                views BIGINT NOT NULL DEFAULT 1,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        for (name, column) in [
            ("idx_visits_session_id", "session_id"),
            ("idx_visits_user_id", "user_id"),
            ("idx_visits_ip_address", "ip_address"),
            ("idx_visits_created_at", "created_at"),
        ] {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {name} ON visits({column})"
            ))
            .execute(self.pool.as_ref())
            .await?;
        }

        Ok(())
    }

    async fn table_exists(&self) -> StorageResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )
            "#,
        )
        .bind(VISITS_TABLE)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(exists)
    }

    async fn find_similar(&self, query: &SimilarQuery<'_>) -> StorageResult<Option<Visit>> {
        let sql = format!(
            r#"
            SELECT {VISIT_COLUMNS}
            FROM visits
            WHERE {column} IS NOT DISTINCT FROM $1 AND host = $2 AND path = $3 AND created_at >= $4
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
            column = query.method.column(),
        );

        let visit = sqlx::query_as::<_, Visit>(&sql)
            .bind(query.value)
            .bind(query.host)
            .bind(query.path)
            .bind(query.since)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(visit)
    }

    async fn insert(&self, visit: &NewVisit, now: i64) -> StorageResult<Visit> {
        let sql = format!(
            r#"
            INSERT INTO visits (session_id, user_id, ip_address, user_agent, scheme, host, port,
                                path, query, views, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 1, $10, $10)
            RETURNING {VISIT_COLUMNS}
            "#
        );

        let stored = sqlx::query_as::<_, Visit>(&sql)
            .bind(&visit.session_id)
            .bind(&visit.user_id)
            .bind(&visit.ip_address)
            .bind(&visit.user_agent)
            .bind(&visit.scheme)
            .bind(&visit.host)
            .bind(visit.port)
            .bind(&visit.path)
            .bind(&visit.query)
            .bind(now)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(stored)
    }

    async fn increment_views(&self, id: i64, now: i64) -> StorageResult<Option<Visit>> {
        let sql = format!(
            r#"
            UPDATE visits
            SET views = views + 1, updated_at = $1
            WHERE id = $2
            RETURNING {VISIT_COLUMNS}
            "#
        );

        let visit = sqlx::query_as::<_, Visit>(&sql)
            .bind(now)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(visit)
    }

    async fn list(&self, limit: i64, offset: i64) -> StorageResult<Vec<Visit>> {
        let sql = format!(
            r#"
            SELECT {VISIT_COLUMNS}
            FROM visits
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#
        );

        let visits = sqlx::query_as::<_, Visit>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(visits)
    }

    async fn top_paths(&self, limit: i64) -> StorageResult<Vec<TopPath>> {
        let rows = sqlx::query_as::<_, TopPath>(
            r#"
            SELECT host, path, COUNT(*) AS visits, SUM(views)::BIGINT AS views
            FROM visits
            GROUP BY host, path
            ORDER BY views DESC, visits DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }
}
