//! In-memory object store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageResult;
use crate::keys::validate_key;
use crate::store::{ObjectBody, ObjectStore};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// Object store kept in process memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    base_url: String,
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    puts: Arc<RwLock<u64>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory://bucket")
    }
}

impl MemoryStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Arc::new(RwLock::new(HashMap::new())),
            puts: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn get(&self, key: &str) -> Option<(Vec<u8>, String)> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| (o.data.clone(), o.content_type.clone()))
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of successful `put` calls, including overwrites.
    pub async fn put_count(&self) -> u64 {
        *self.puts.read().await
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, body: ObjectBody, key: &str, content_type: &str) -> StorageResult<String> {
        validate_key(key)?;
        let data = match body {
            ObjectBody::Bytes(data) => data,
            ObjectBody::File(path) => tokio::fs::read(&path).await?,
        };
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        *self.puts.write().await += 1;
        Ok(format!("{}/{}", self.base_url, key))
    }

    async fn check(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_overwrites_same_key() {
        let store = MemoryStore::new("https://cdn.test/");
        let url = store
            .put(ObjectBody::Bytes(vec![1]), "videos/a.mp4", "video/mp4")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.test/videos/a.mp4");

        store
            .put(ObjectBody::Bytes(vec![2, 2]), "videos/a.mp4", "video/mp4")
            .await
            .unwrap();
        assert_eq!(store.keys().await, vec!["videos/a.mp4".to_string()]);
        assert_eq!(store.get("videos/a.mp4").await.unwrap().0, vec![2, 2]);
        assert_eq!(store.put_count().await, 2);
    }

    #[tokio::test]
    async fn test_put_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final.mp4");
        tokio::fs::write(&path, b"video").await.unwrap();

        let store = MemoryStore::default();
        store
            .put(ObjectBody::File(path), "videos/b.mp4", "video/mp4")
            .await
            .unwrap();
        assert_eq!(store.get("videos/b.mp4").await.unwrap().0, b"video".to_vec());
    }
}
