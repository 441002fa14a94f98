use std::sync::Arc;

use regatta::ConfigDocument;
use tokio::sync::RwLock;
use warp::Filter;

use crate::persistance::{Persistances, StorageError};
use crate::views::AdminError;

/// The current configuration and the digest its entity tags derive from.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub document: ConfigDocument,
    pub digest: String,
}

/// Shared access to the configuration document.
///
/// Reads clone the snapshot. Writes clone the document, run the caller's
/// mutation under the write lock, append a revision to the store and swap
/// the snapshot, so revisions are totally ordered.
#[derive(Clone)]
pub struct ConfigService {
    persistances: Persistances,
    snapshot: Arc<RwLock<Snapshot>>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("stored revision is not a valid document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("could not read seed file {path}: {source}")]
    Seed {
        path: String,
        source: std::io::Error,
    },
    #[error("seed document is invalid: {0}")]
    InvalidSeed(String),
}

impl ConfigService {
    /// Loads the latest stored revision, else the seed file, else starts
    /// from the empty document.
    pub async fn load(
        persistances: Persistances,
        seed_path: Option<&str>,
    ) -> Result<ConfigService, LoadError> {
        let store = persistances.boxed();
        let document = match store.latest().await? {
            Some(revision) => serde_json::from_str(&revision.content)?,
            None => match seed_path {
                Some(path) => {
                    let content =
                        std::fs::read_to_string(path).map_err(|source| LoadError::Seed {
                            path: path.to_string(),
                            source,
                        })?;
                    let mut document: ConfigDocument = serde_json::from_str(&content)?;
                    let messages = document.validate();
                    if !messages.is_empty() {
                        return Err(LoadError::InvalidSeed(messages.join(", ")));
                    }
                    document
                }
                None => ConfigDocument::default(),
            },
        };
        let digest = regatta::digest(&document);
        Ok(ConfigService {
            persistances,
            snapshot: Arc::new(RwLock::new(Snapshot { document, digest })),
        })
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Runs a mutation against a copy of the current document. The closure
    /// validates its own change; on success the result is persisted as a new
    /// revision and becomes the snapshot.
    pub async fn update<R, F>(&self, mutate: F) -> Result<R, AdminError>
    where
        F: FnOnce(&mut ConfigDocument) -> Result<R, AdminError>,
    {
        let mut guard = self.snapshot.write().await;
        let mut document = guard.document.clone();
        let outcome = mutate(&mut document)?;
        let digest = regatta::digest(&document);
        let content = serde_json::to_string(&document)
            .map_err(|err| AdminError::Internal(err.to_string()))?;
        self.persistances
            .boxed()
            .append(content, digest.clone())
            .await?;
        *guard = Snapshot { document, digest };
        Ok(outcome)
    }
}

impl From<StorageError> for AdminError {
    fn from(value: StorageError) -> Self {
        AdminError::Internal(value.to_string())
    }
}

pub fn with(
    service: ConfigService,
) -> impl Filter<Extract = (ConfigService,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || service.clone())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::persistance::{build, PersistanceConfig};
    use regatta::pipeline::Pipeline;

    fn pipeline(name: &str) -> Pipeline {
        let mut pipeline = Pipeline::new(name);
        pipeline.stages = vec![serde_json::from_str(
            r#"{"name":"build","jobs":[{"name":"compile"}]}"#,
        )
        .unwrap()];
        pipeline
    }

    #[tokio::test]
    async fn updates_survive_a_reload() {
        let persistances = build(PersistanceConfig::Memory).await.unwrap();
        let service = ConfigService::load(persistances.clone(), None)
            .await
            .unwrap();
        service
            .update(|document| {
                document.add_pipeline("first", pipeline("p1"));
                Ok(())
            })
            .await
            .unwrap();
        let reloaded = ConfigService::load(persistances, None).await.unwrap();
        let snapshot = reloaded.snapshot().await;
        assert!(snapshot.document.find_pipeline(&"p1".into()).is_some());
    }

    #[tokio::test]
    async fn failed_updates_change_nothing() {
        let persistances = build(PersistanceConfig::Memory).await.unwrap();
        let service = ConfigService::load(persistances.clone(), None)
            .await
            .unwrap();
        let before = service.snapshot().await;
        let result: Result<(), _> = service
            .update(|document| {
                document.add_pipeline("first", pipeline("p1"));
                Err(AdminError::NotFound)
            })
            .await;
        assert!(result.is_err());
        let after = service.snapshot().await;
        assert_eq!(before.digest, after.digest);
        assert!(persistances.boxed().latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn seed_files_initialize_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        let mut document = ConfigDocument::default();
        document.add_pipeline("first", pipeline("seeded"));
        std::fs::write(&path, serde_json::to_string(&document).unwrap()).unwrap();

        let persistances = build(PersistanceConfig::Memory).await.unwrap();
        let service = ConfigService::load(persistances, Some(path.to_str().unwrap()))
            .await
            .unwrap();
        let snapshot = service.snapshot().await;
        assert!(snapshot.document.find_pipeline(&"seeded".into()).is_some());
    }

    #[tokio::test]
    async fn invalid_seed_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        let mut document = ConfigDocument::default();
        document.add_pipeline("first", Pipeline::new("no-stages"));
        std::fs::write(&path, serde_json::to_string(&document).unwrap()).unwrap();

        let persistances = build(PersistanceConfig::Memory).await.unwrap();
        let result = ConfigService::load(persistances, Some(path.to_str().unwrap())).await;
        assert!(matches!(result, Err(LoadError::InvalidSeed(_))));
    }
}
