//! Compliance erase command.

use anyhow::Result;
use colored::Colorize;

use super::{checkpoint, open_manager};
use crate::config::Config;

pub async fn execute(user_id: &str, config: &Config) -> Result<()> {
    let manager = open_manager(config).await?;

    if manager.forget_user(user_id).await? {
        checkpoint(&manager).await?;
        println!("{} Erased all session data for {}", "✓".green(), user_id);
    } else {
        println!("{} No session data held for {}", "⚠".yellow(), user_id);
    }
    Ok(())
}
