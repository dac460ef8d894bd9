//! Data export command (user data access requests).

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use super::open_manager;
use crate::config::Config;

pub async fn execute(user_id: &str, output: Option<&Path>, config: &Config) -> Result<()> {
    let manager = open_manager(config).await?;
    let export = manager.store().export_session_data(user_id)?;
    let json = serde_json::to_string_pretty(&export)?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Exported {} session(s) for {} to {}",
                "✓".green(),
                export.history.len() + usize::from(export.active_session.is_some()),
                user_id,
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}
