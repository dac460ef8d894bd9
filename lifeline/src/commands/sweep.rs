//! Manual expiry sweep.

use anyhow::Result;
use colored::Colorize;

use super::{checkpoint, open_manager, short_id};
use crate::config::Config;

pub async fn execute(config: &Config) -> Result<()> {
    let manager = open_manager(config).await?;
    let archived = manager.store().sweep_expired()?;

    if archived.is_empty() {
        println!("{}", "No idle sessions".dimmed());
        return Ok(());
    }

    checkpoint(&manager).await?;
    println!("{} Archived {} idle session(s)", "✓".green(), archived.len());
    for (user_id, session_id) in &archived {
        println!("  {} {}", short_id(session_id).dimmed(), user_id);
    }
    Ok(())
}
