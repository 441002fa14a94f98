use log::error;
use sqlx::Row;

use super::{ConfigStore, Revision, StorageError, StoreResult};

#[derive(Debug, Clone)]
pub struct DatabasePersistance {
    pool: sqlx::SqlitePool,
}

impl DatabasePersistance {
    pub async fn new(database_path: &str) -> StoreResult<DatabasePersistance> {
        let url = database_path.to_string() + "?mode=rwc";
        let pool = match sqlx::sqlite::SqlitePool::connect(&url).await {
            Ok(v) => v,
            Err(err) => {
                error!("Error while connecting to database: {:?}", err);
                error!("Database url: {}", url);
                return Err(err.into());
            }
        };
        let mut conn = pool.acquire().await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS revisions (id INTEGER PRIMARY KEY, content TEXT, digest TEXT, created_at TIMESTAMP)",
        )
        .execute(&mut conn)
        .await?;
        Ok(DatabasePersistance { pool })
    }
}

#[async_trait::async_trait]
impl ConfigStore for DatabasePersistance {
    async fn latest(&self) -> StoreResult<Option<Revision>> {
        let mut conn = self.pool.acquire().await?;
        let revision = sqlx::query(
            "SELECT id, content, digest, created_at FROM revisions ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&mut conn)
        .await?
        .map(|row| Revision {
            id: row.get(0),
            content: row.get(1),
            digest: row.get(2),
            created_at: row.get(3),
        });
        Ok(revision)
    }

    async fn append(&self, content: String, digest: String) -> StoreResult<Revision> {
        let mut conn = self.pool.acquire().await?;
        let id = sqlx::query(
            "INSERT INTO revisions (content, digest, created_at) VALUES ($1, $2, CURRENT_TIMESTAMP)",
        )
        .bind(&content)
        .bind(&digest)
        .execute(&mut conn)
        .await?
        .last_insert_rowid();
        let created_at = sqlx::query("SELECT created_at FROM revisions WHERE id = $1")
            .bind(id)
            .fetch_one(&mut conn)
            .await?
            .get(0);
        Ok(Revision {
            id,
            content,
            digest,
            created_at,
        })
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(value: sqlx::Error) -> Self {
        Self::InternalError(value.to_string())
    }
}
