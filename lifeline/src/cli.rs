//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Lifeline session lifecycle CLI
///
/// Inspect and drive per-user sessions held in the local data directory.
#[derive(Parser, Debug)]
#[command(name = "lifeline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show store status (users, sessions, last backup)
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Session lifecycle (start, activity, end, resume, merge)
    Session(SessionCommand),

    /// Show aggregate metrics for a user
    Metrics {
        /// User ID
        user_id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Export all session data held for a user
    Export {
        /// User ID
        user_id: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Erase all session data held for a user
    Forget {
        /// User ID
        user_id: String,
    },

    /// Archive idle sessions now
    Sweep,

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct SessionCommand {
    #[command(subcommand)]
    pub action: SessionAction,
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Start a new session (ends the current one)
    Start {
        /// User ID
        user_id: String,

        /// Theme (light, dark, auto)
        #[arg(short, long)]
        theme: Option<String>,

        /// Preferred language code
        #[arg(short, long)]
        language: Option<String>,

        /// Conversation style (casual, formal, technical, concise)
        #[arg(short, long)]
        style: Option<String>,
    },

    /// Record an interaction on the active session
    Activity {
        /// User ID
        user_id: String,

        /// Activity kind
        #[arg(short, long, default_value = "message")]
        kind: String,
    },

    /// Show the active session
    Show {
        /// User ID
        user_id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// End the active session
    End {
        /// User ID
        user_id: String,
    },

    /// Start a new session from an archived one
    Resume {
        /// User ID
        user_id: String,

        /// Archived session ID
        session_id: String,
    },

    /// Merge sessions from other devices into the active one
    Merge {
        /// User ID
        user_id: String,

        /// JSON file holding an array of sessions
        #[arg(short, long)]
        from: PathBuf,
    },

    /// List archived sessions
    History {
        /// User ID
        user_id: String,

        /// Maximum number of entries to show (newest first)
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_session_start_with_overrides() {
        let cli = Cli::try_parse_from([
            "lifeline", "session", "start", "u1", "--theme", "dark", "--language", "fr",
        ])
        .unwrap();

        let Commands::Session(SessionCommand {
            action: SessionAction::Start { user_id, theme, language, style },
        }) = cli.command
        else {
            panic!("expected session start");
        };
        assert_eq!(user_id, "u1");
        assert_eq!(theme.as_deref(), Some("dark"));
        assert_eq!(language.as_deref(), Some("fr"));
        assert!(style.is_none());
    }

    #[test]
    fn activity_kind_defaults_to_message() {
        let cli = Cli::try_parse_from(["lifeline", "session", "activity", "u1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Session(SessionCommand {
                action: SessionAction::Activity { ref kind, .. },
            }) if kind == "message"
        ));
    }

    #[test]
    fn merge_requires_source_file() {
        assert!(Cli::try_parse_from(["lifeline", "session", "merge", "u1"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
