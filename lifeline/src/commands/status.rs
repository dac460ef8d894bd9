//! Store status command.
//!
//! Summarizes what the data directory holds: users, active and archived
//! sessions, and when the backup was last written.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use lifeline_core::SessionManager;
use serde::Serialize;

use crate::config::Config;

/// Store status for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub timestamp: String,
    pub data_dir: String,
    pub users: usize,
    pub active_sessions: usize,
    pub archived_sessions: usize,
    pub last_backup: Option<String>,
    pub session_timeout_secs: u64,
    pub max_history: usize,
}

pub async fn execute(json: bool, config: &Config) -> Result<()> {
    let manager = super::open_manager(config).await?;
    let status = gather_status(&manager, config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }

    Ok(())
}

async fn gather_status(manager: &SessionManager, config: &Config) -> Result<StoreStatus> {
    let stats = manager.store().stats()?;
    let last_backup = manager
        .backup()
        .last_backup_at()
        .await
        .unwrap_or_default()
        .map(|at| at.to_rfc3339());

    Ok(StoreStatus {
        timestamp: Utc::now().to_rfc3339(),
        data_dir: config.paths.data_dir.display().to_string(),
        users: stats.users,
        active_sessions: stats.active_sessions,
        archived_sessions: stats.archived_sessions,
        last_backup,
        session_timeout_secs: config.sessions.session_timeout_secs,
        max_history: config.sessions.max_history,
    })
}

fn print_status(status: &StoreStatus) {
    println!();
    println!("{}", "Lifeline Status".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("  {:<18} {}", "Data dir:".cyan(), status.data_dir);
    println!("  {:<18} {}", "Users:".cyan(), status.users);
    println!(
        "  {:<18} {}",
        "Active sessions:".cyan(),
        status.active_sessions.to_string().green()
    );
    println!("  {:<18} {}", "Archived:".cyan(), status.archived_sessions);
    match &status.last_backup {
        Some(at) => println!("  {:<18} {}", "Last backup:".cyan(), at),
        None => println!("  {:<18} {}", "Last backup:".cyan(), "never".yellow()),
    }
    println!(
        "  {:<18} {}s, history {}",
        "Timeout:".cyan(),
        status.session_timeout_secs,
        status.max_history
    );
    println!();
}
