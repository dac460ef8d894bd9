//! Session lifecycle commands.
//!
//! Thin wrappers over the session store; every mutation is checkpointed to
//! the backup before returning.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use lifeline_core::{
    ActiveLookup, ActivityKind, ConversationStyle, PreferencesUpdate, Session, SessionManager,
    Theme,
};
use std::path::Path;

use super::{checkpoint, format_duration_ms, open_manager, short_id};
use crate::cli::{SessionAction, SessionCommand};
use crate::config::Config;

pub async fn execute(cmd: SessionCommand, config: &Config) -> Result<()> {
    let manager = open_manager(config).await?;

    match cmd.action {
        SessionAction::Start {
            user_id,
            theme,
            language,
            style,
        } => {
            let overrides = preference_overrides(theme.as_deref(), language, style.as_deref())?;
            start(&manager, &user_id, overrides)?;
        }
        SessionAction::Activity { user_id, kind } => activity(&manager, &user_id, &kind)?,
        SessionAction::Show { user_id, json } => show(&manager, &user_id, json)?,
        SessionAction::End { user_id } => end(&manager, &user_id)?,
        SessionAction::Resume {
            user_id,
            session_id,
        } => resume(&manager, &user_id, &session_id)?,
        SessionAction::Merge { user_id, from } => merge(&manager, &user_id, &from)?,
        SessionAction::History { user_id, limit } => {
            history(&manager, &user_id, limit)?;
            return Ok(());
        }
    }

    checkpoint(&manager).await
}

/// Build a preference overlay from CLI flags. `None` when no flag was given.
fn preference_overrides(
    theme: Option<&str>,
    language: Option<String>,
    style: Option<&str>,
) -> Result<Option<PreferencesUpdate>> {
    let mut update = PreferencesUpdate::default();
    let mut any = false;

    if let Some(theme) = theme {
        let Some(theme) = Theme::from_str(theme) else {
            bail!("Unknown theme '{}' (expected light, dark or auto)", theme);
        };
        update = update.with_theme(theme);
        any = true;
    }
    if let Some(language) = language {
        update = update.with_language(language);
        any = true;
    }
    if let Some(style) = style {
        let Some(style) = ConversationStyle::from_str(style) else {
            bail!(
                "Unknown conversation style '{}' (expected casual, formal, technical or concise)",
                style
            );
        };
        update = update.with_conversation_style(style);
        any = true;
    }

    Ok(any.then_some(update))
}

fn start(
    manager: &SessionManager,
    user_id: &str,
    overrides: Option<PreferencesUpdate>,
) -> Result<()> {
    let previous = manager.store().get_active_session(user_id)?;
    let session = manager.store().start_session(user_id, overrides)?;

    if let Some(previous) = previous {
        println!(
            "  {} Ended previous session {}",
            "↺".yellow(),
            short_id(&previous.id)
        );
    }
    println!("{} Session started", "✓".green());
    println!("  ID:       {}", session.id);
    println!("  User:     {}", session.user_id);
    println!("  Device:   {}", session.metadata.device_type);
    println!("  Theme:    {}", session.preferences.theme.as_str());
    println!("  Language: {}", session.preferences.language);
    Ok(())
}

fn activity(manager: &SessionManager, user_id: &str, kind: &str) -> Result<()> {
    let kind = ActivityKind::parse(kind);
    if !manager.store().record_activity(user_id, kind.clone())? {
        println!("{} No active session for {}", "⚠".yellow(), user_id);
        return Ok(());
    }

    let count = manager
        .store()
        .peek_active_session(user_id)?
        .map(|s| s.interaction_count)
        .unwrap_or_default();
    println!(
        "{} Recorded {} ({} interactions)",
        "✓".green(),
        kind,
        count
    );
    Ok(())
}

fn show(manager: &SessionManager, user_id: &str, json: bool) -> Result<()> {
    match manager.store().lookup_active_session(user_id)? {
        ActiveLookup::Found(session) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                print_session(&session);
            }
        }
        ActiveLookup::Expired(session) => {
            if json {
                println!("null");
            } else {
                println!(
                    "{} Session {} expired (idle since {})",
                    "⚠".yellow(),
                    short_id(&session.id),
                    session.last_activity.to_rfc3339()
                );
            }
        }
        ActiveLookup::Missing => {
            if json {
                println!("null");
            } else {
                println!("{}", format!("No active session for {}", user_id).yellow());
            }
        }
    }
    Ok(())
}

fn end(manager: &SessionManager, user_id: &str) -> Result<()> {
    match manager.store().end_session(user_id)? {
        Some(session) => println!(
            "{} Ended session {} after {} ({} interactions)",
            "✓".green(),
            short_id(&session.id),
            format_duration_ms(session.session_duration),
            session.interaction_count
        ),
        None => println!("{} No active session for {}", "⚠".yellow(), user_id),
    }
    Ok(())
}

fn resume(manager: &SessionManager, user_id: &str, session_id: &str) -> Result<()> {
    match manager.store().resume_session(user_id, session_id)? {
        Some(session) => println!(
            "{} Resumed {} as {}",
            "✓".green(),
            short_id(session_id),
            session.id
        ),
        None => bail!("No archived session {} for {}", session_id, user_id),
    }
    Ok(())
}

fn merge(manager: &SessionManager, user_id: &str, from: &Path) -> Result<()> {
    let candidates = read_sessions(from)?;
    let merged = manager.store().merge_sessions(user_id, &candidates)?;

    println!(
        "{} Merged {} session(s) into {}",
        "✓".green(),
        candidates.len(),
        short_id(&merged.id)
    );
    println!("  Contexts: {}", merged.conversation_contexts.len());
    println!("  Patterns: {}", merged.behavior_patterns.len());
    Ok(())
}

fn history(manager: &SessionManager, user_id: &str, limit: usize) -> Result<()> {
    let history = manager.store().history(user_id)?;
    if history.is_empty() {
        println!("{}", format!("No archived sessions for {}", user_id).yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("Archived sessions for {} ({})", user_id, history.len())
            .cyan()
            .bold()
    );
    for session in history.iter().rev().take(limit) {
        let ended = session
            .end_time
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}  {}  {:>12}  {:>4} interactions  {}",
            short_id(&session.id).dimmed(),
            ended,
            format_duration_ms(session.session_duration),
            session.interaction_count,
            session.metadata.device_type
        );
    }
    Ok(())
}

fn print_session(session: &Session) {
    println!("{}", "Active session".cyan().bold());
    println!("  ID:           {}", session.id);
    println!("  User:         {}", session.user_id);
    println!("  Started:      {}", session.start_time.to_rfc3339());
    println!("  Last active:  {}", session.last_activity.to_rfc3339());
    println!(
        "  Duration:     {}",
        format_duration_ms(session.session_duration)
    );
    println!("  Interactions: {}", session.interaction_count);
    println!(
        "  Device:       {} ({})",
        session.metadata.device_type, session.metadata.browser
    );
    println!(
        "  Preferences:  theme={} language={} style={}",
        session.preferences.theme.as_str(),
        session.preferences.language,
        session.preferences.conversation_style.as_str()
    );
    if !session.conversation_contexts.is_empty() {
        println!("  Contexts:");
        for (id, context) in &session.conversation_contexts {
            println!("    {} {} [{}]", id.dimmed(), context.intent, context.topics.join(", "));
        }
    }
    if !session.behavior_patterns.is_empty() {
        println!("  Patterns:");
        for (kind, pattern) in &session.behavior_patterns {
            println!(
                "    {} x{} (confidence {:.2})",
                kind, pattern.frequency, pattern.confidence
            );
        }
    }
}

fn read_sessions(path: &Path) -> Result<Vec<Session>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of sessions", path.display()))
}
