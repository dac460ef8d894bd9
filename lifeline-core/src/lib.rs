//! lifeline-core - Session lifecycle library
//!
//! Tracks one active session per user, archives ended sessions into a
//! bounded history, and keeps the whole state recoverable:
//!
//! - **session**: In-memory store, cross-device merge, metrics
//! - **scheduler**: Periodic expiry sweep
//! - **backup**: Full-state backup and restore
//! - **persistence**: Key/blob adapters (file, memory)
//! - **manager**: Wires the above together with an init/close lifecycle

pub mod backup;
pub mod clock;
pub mod config;
pub mod environment;
pub mod error;
pub mod manager;
pub mod persistence;
pub mod scheduler;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use backup::{BackupService, BackupSummary, RestoreSummary};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use manager::SessionManager;
pub use persistence::{FileAdapter, MemoryAdapter, PersistenceAdapter};
pub use session::{ActiveLookup, SessionStore};
pub use types::*;
