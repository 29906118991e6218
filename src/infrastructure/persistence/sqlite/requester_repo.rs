//! SQLite Requester Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::DbPool;
use crate::application::ports::{RepositoryError, RequesterRecord, RequesterRepositoryPort};

/// SQLite Requester Repository
pub struct SqliteRequesterRepository {
    pool: DbPool,
}

impl SqliteRequesterRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct RequesterRow {
    id: String,
    search_count: i64,
    language: Option<String>,
    created_at: String,
    updated_at: String,
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| RepositoryError::SerializationError(e.to_string()))?
        .with_timezone(&Utc))
}

impl TryFrom<RequesterRow> for RequesterRecord {
    type Error = RepositoryError;

    fn try_from(row: RequesterRow) -> Result<Self, Self::Error> {
        Ok(RequesterRecord {
            requester_id: row.id,
            search_count: row.search_count.max(0) as u64,
            language: row.language,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl RequesterRepositoryPort for SqliteRequesterRepository {
    async fn record_search(&self, requester_id: &str) -> Result<u64, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO requesters (id, search_count, created_at, updated_at)
            VALUES (?, 1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                search_count = search_count + 1,
                updated_at = excluded.updated_at
            RETURNING search_count
            "#,
        )
        .bind(requester_id)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(count.max(0) as u64)
    }

    async fn set_language(&self, requester_id: &str, language: &str) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO requesters (id, search_count, language, created_at, updated_at)
            VALUES (?, 0, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                language = excluded.language,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(requester_id)
        .bind(language)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn find(&self, requester_id: &str) -> Result<Option<RequesterRecord>, RepositoryError> {
        let row: Option<RequesterRow> = sqlx::query_as(
            "SELECT id, search_count, language, created_at, updated_at FROM requesters WHERE id = ?",
        )
        .bind(requester_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        row.map(RequesterRecord::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};

    async fn repo() -> SqliteRequesterRepository {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteRequesterRepository::new(pool)
    }

    #[tokio::test]
    async fn test_record_search_counts() {
        let repo = repo().await;
        assert_eq!(repo.record_search("42").await.unwrap(), 1);
        assert_eq!(repo.record_search("42").await.unwrap(), 2);
        assert_eq!(repo.record_search("7").await.unwrap(), 1);

        let record = repo.find("42").await.unwrap().unwrap();
        assert_eq!(record.search_count, 2);
        assert!(record.language.is_none());
    }

    #[tokio::test]
    async fn test_set_language_keeps_count() {
        let repo = repo().await;
        repo.record_search("42").await.unwrap();
        repo.set_language("42", "ru").await.unwrap();
        repo.set_language("new", "en").await.unwrap();

        let existing = repo.find("42").await.unwrap().unwrap();
        assert_eq!(existing.search_count, 1);
        assert_eq!(existing.language.as_deref(), Some("ru"));

        let fresh = repo.find("new").await.unwrap().unwrap();
        assert_eq!(fresh.search_count, 0);
        assert!(repo.find("missing").await.unwrap().is_none());
    }
}
