use std::sync::Arc;

use tokio::sync::Mutex;

use super::{ConfigStore, Revision, StoreResult};

#[derive(Default, Clone)]
pub struct MemoryStore {
    data: Arc<Mutex<Vec<Revision>>>,
}

#[async_trait::async_trait]
impl ConfigStore for MemoryStore {
    async fn latest(&self) -> StoreResult<Option<Revision>> {
        let data = self.data.lock().await;
        Ok(data.last().cloned())
    }

    async fn append(&self, content: String, digest: String) -> StoreResult<Revision> {
        let mut data = self.data.lock().await;
        let revision = Revision {
            id: data.len() as i64 + 1,
            content,
            digest,
            created_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        data.push(revision.clone());
        Ok(revision)
    }
}
