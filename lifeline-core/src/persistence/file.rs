//! File-backed persistence adapter.
//!
//! Each key maps to `{base_dir}/{encoded_key}.blob`. Writes go to a sibling
//! temp file first and are renamed into place, so readers never observe a
//! half-written blob.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::PersistenceAdapter;
use crate::error::{Error, Result};

/// Persistence adapter storing one file per key.
#[derive(Debug, Clone)]
pub struct FileAdapter {
    base_dir: PathBuf,
}

impl FileAdapter {
    /// Create a new file adapter. Creates `base_dir` if it doesn't exist.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir).map_err(|e| {
            Error::persistence(format!(
                "failed to create directory {}: {}",
                base_dir.display(),
                e
            ))
        })?;
        Ok(Self { base_dir })
    }

    /// Directory holding the blobs.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the file path for a key.
    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.blob", encode_key(key)))
    }
}

#[async_trait]
impl PersistenceAdapter for FileAdapter {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::persistence(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn set(&self, key: &str, blob: Vec<u8>) -> Result<()> {
        let path = self.blob_path(key);
        let tmp = path.with_extension("blob.tmp");

        tokio::fs::write(&tmp, &blob).await.map_err(|e| {
            Error::persistence(format!("failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            Error::persistence(format!("failed to replace {}: {}", path.display(), e))
        })?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.blob_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::persistence(format!(
                "failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

/// Encode a key for safe use as a filename.
/// Alphanumerics, `-` and `_` pass through; every other byte becomes `%XX`,
/// which keeps distinct keys on distinct files.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn encode_key_escapes_special_chars() {
        assert_eq!(encode_key("user_123"), "user_123");
        assert_eq!(encode_key("lifeline:session:a/b"), "lifeline%3Asession%3Aa%2Fb");
        assert_ne!(encode_key("a:b"), encode_key("a_b"));
    }

    #[tokio::test]
    async fn round_trip_set_and_get() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path()).unwrap();

        adapter.set("lifeline:backup", b"{}".to_vec()).await.unwrap();
        assert_eq!(adapter.get("lifeline:backup").await.unwrap(), Some(b"{}".to_vec()));
        assert!(adapter.blob_path("lifeline:backup").exists());
    }

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path()).unwrap();

        assert!(adapter.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_overwrites_and_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let adapter = FileAdapter::new(dir.path().join("nested")).unwrap();

        adapter.set("key", b"old".to_vec()).await.unwrap();
        adapter.set("key", b"new".to_vec()).await.unwrap();
        assert_eq!(adapter.get("key").await.unwrap(), Some(b"new".to_vec()));

        adapter.delete("key").await.unwrap();
        adapter.delete("key").await.unwrap();
        assert!(adapter.get("key").await.unwrap().is_none());
    }
}
