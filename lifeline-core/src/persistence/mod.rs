//! Durable key/blob persistence.
//!
//! The in-memory session store is authoritative; adapters only hold recovery
//! snapshots. Callers treat every adapter error as best-effort.

mod file;
mod memory;

pub use file::FileAdapter;
pub use memory::MemoryAdapter;

use async_trait::async_trait;

use crate::error::Result;

/// Key → blob store backing backups and per-user snapshots.
///
/// Implementations own their own timeout policy.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Read a blob. Returns `None` when the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write (or replace) a blob.
    async fn set(&self, key: &str, blob: Vec<u8>) -> Result<()>;

    /// Remove a blob. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
