//! In-process persistence adapter.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::PersistenceAdapter;
use crate::error::Result;

/// Persistence adapter keeping blobs in a map. Useful for tests and for
/// embedding where durability is handled elsewhere.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// Whether a key is present.
    pub async fn contains(&self, key: &str) -> bool {
        self.blobs.read().await.contains_key(key)
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryAdapter {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, blob: Vec<u8>) -> Result<()> {
        self.blobs.write().await.insert(key.to_string(), blob);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.blobs.write().await.remove(key);
        Ok(())
    }
}
