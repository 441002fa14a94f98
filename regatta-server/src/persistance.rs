/// One stored version of the whole configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    pub id: i64,
    /// The serialized [`regatta::ConfigDocument`].
    pub content: String,
    pub digest: String,
    pub created_at: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{0}")]
    UserError(String),
    #[error("{0}")]
    InternalError(String),
}

pub type StoreResult<T> = Result<T, StorageError>;

/// Append-only revision store backing the config service.
#[async_trait::async_trait]
pub trait ConfigStore: Send + Sync {
    async fn latest(&self) -> StoreResult<Option<Revision>>;
    async fn append(&self, content: String, digest: String) -> StoreResult<Revision>;
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(tag = "type")]
pub enum PersistanceConfig {
    Memory,
    Sqlite { path: String },
}

pub async fn build(config: PersistanceConfig) -> StoreResult<Persistances> {
    match config {
        PersistanceConfig::Memory => Ok(Persistances::Memory(memory::MemoryStore::default())),
        PersistanceConfig::Sqlite { path } => Ok(Persistances::Sqlite(
            sqlite::DatabasePersistance::new(&path).await?,
        )),
    }
}

#[derive(Clone)]
pub enum Persistances {
    Memory(memory::MemoryStore),
    Sqlite(sqlite::DatabasePersistance),
}

impl Persistances {
    pub fn boxed(&self) -> Box<dyn ConfigStore> {
        match self {
            Persistances::Memory(p) => Box::new(p.clone()),
            Persistances::Sqlite(p) => Box::new(p.clone()),
        }
    }
}

#[macro_export]
macro_rules! test_store {
    ($create:expr) => {
        #[tokio::test]
        async fn starts_without_a_latest_revision() {
            let store = $create().await;
            $crate::persistance::test_suite::starts_empty(store).await;
        }

        #[tokio::test]
        async fn append_then_latest_round_trips() {
            let store = $create().await;
            $crate::persistance::test_suite::append_round_trip(store).await;
        }

        #[tokio::test]
        async fn latest_returns_the_newest_revision() {
            let store = $create().await;
            $crate::persistance::test_suite::revision_ordering(store).await;
        }
    };
}


mod memory;
mod sqlite;
