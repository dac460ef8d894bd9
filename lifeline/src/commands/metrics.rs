//! Per-user metrics command.

use anyhow::Result;
use colored::Colorize;
use lifeline_core::SessionMetrics;

use super::{format_duration_ms, open_manager};
use crate::config::Config;

pub async fn execute(user_id: &str, json: bool, config: &Config) -> Result<()> {
    let manager = open_manager(config).await?;
    let metrics = manager.store().session_metrics(user_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        print_metrics(user_id, &metrics);
    }
    Ok(())
}

fn print_metrics(user_id: &str, metrics: &SessionMetrics) {
    println!("{}", format!("Session metrics for {}", user_id).cyan().bold());
    println!("  Total sessions:   {}", metrics.total_sessions);
    println!("  Active:           {}", metrics.active_sessions_count);
    println!(
        "  Average duration: {}",
        format_duration_ms(metrics.average_session_duration.round() as u64)
    );
    println!(
        "  Most active:      {}",
        metrics
            .most_active_time_of_day
            .map(|t| t.as_str())
            .unwrap_or("-")
    );
    println!(
        "  Frequent device:  {}",
        metrics
            .frequent_device_type
            .map(|d| d.as_str())
            .unwrap_or("-")
    );

    let consistency = format!("{:.0}%", metrics.session_consistency * 100.0);
    let consistency = if metrics.session_consistency >= 0.75 {
        consistency.green()
    } else if metrics.session_consistency >= 0.4 {
        consistency.yellow()
    } else {
        consistency.red()
    };
    println!("  Consistency:      {}", consistency);
}
