//! Command implementations for the lifeline CLI.
//!
//! Every command restores the store from the data directory, runs, and
//! checkpoints again when it changed anything.

pub mod export;
pub mod forget;
pub mod metrics;
pub mod session;
pub mod status;
pub mod sweep;

use anyhow::{Context, Result};
use lifeline_core::{FileAdapter, SessionManager};
use std::sync::Arc;

use crate::config::Config;

/// Open the manager over the configured data directory and restore state.
pub async fn open_manager(config: &Config) -> Result<SessionManager> {
    config.ensure_dirs()?;
    let adapter = FileAdapter::new(config.store_dir()).context("Failed to open session store")?;

    // One-shot process: state travels through the backup, so no background tasks
    let sessions = config
        .sessions
        .clone()
        .with_auto_cleanup(false)
        .with_persist_on_mutation(false);

    let manager = SessionManager::new(sessions, Arc::new(adapter))?;
    manager.initialize().await?;
    Ok(manager)
}

/// Persist the store after a mutating command.
pub async fn checkpoint(manager: &SessionManager) -> Result<()> {
    let summary = manager
        .checkpoint()
        .await
        .context("Failed to write session backup")?;
    tracing::debug!(sessions = summary.sessions, bytes = summary.bytes, "Checkpoint written");
    Ok(())
}

/// Render milliseconds as `1h 02m 03s`.
pub fn format_duration_ms(ms: u64) -> String {
    let secs = ms / 1000;
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// First 8 characters of an ID, for compact listings.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
