//! Session manager configuration
//!
//! Defines the tunables for session expiry, history bounds, cleanup and
//! persistence keys.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for the timeout and cleanup interval (365 days)
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity timeout in seconds (default: 1800 = 30 minutes)
    pub session_timeout_secs: u64,

    /// Cleanup sweep interval in seconds (default: 300 = 5 minutes)
    pub cleanup_interval_secs: u64,

    /// Maximum number of ended sessions kept per user (default: 50)
    pub max_history: usize,

    /// Persistence key for the full-state backup
    pub backup_key: String,

    /// Key prefix for per-user session snapshots
    pub session_key_prefix: String,

    /// Mirror each user's active session to persistence on every change (default: false)
    pub persist_on_mutation: bool,

    /// Run the background cleanup sweep (default: true)
    pub auto_cleanup: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 1800, // 30 minutes
            cleanup_interval_secs: 300, // 5 minutes
            max_history: 50,
            backup_key: "lifeline:session_backup".to_string(),
            session_key_prefix: "lifeline:session:".to_string(),
            persist_on_mutation: false,
            auto_cleanup: true,
        }
    }
}

impl SessionConfig {
    /// Set the inactivity timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout_secs = timeout.as_secs();
        self
    }

    /// Set the cleanup sweep interval
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval_secs = interval.as_secs();
        self
    }

    /// Set the per-user history bound
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// Set the backup key
    pub fn with_backup_key(mut self, key: impl Into<String>) -> Self {
        self.backup_key = key.into();
        self
    }

    /// Enable or disable per-mutation persistence
    pub fn with_persist_on_mutation(mut self, enabled: bool) -> Self {
        self.persist_on_mutation = enabled;
        self
    }

    /// Enable or disable the background cleanup sweep
    pub fn with_auto_cleanup(mut self, enabled: bool) -> Self {
        self.auto_cleanup = enabled;
        self
    }

    /// Inactivity timeout as a chrono duration
    pub fn timeout(&self) -> chrono::Duration {
        i64::try_from(self.session_timeout_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Cleanup interval as a std duration
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Persistence key for one user's active session
    pub fn session_key(&self, user_id: &str) -> String {
        format!("{}{}", self.session_key_prefix, user_id)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (field, value) in [
            ("session_timeout_secs", self.session_timeout_secs),
            ("cleanup_interval_secs", self.cleanup_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigValidationError::InvalidValue {
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            }
            if value > MAX_DURATION_SECS {
                return Err(ConfigValidationError::InvalidValue {
                    field: field.into(),
                    message: format!("must be at most {} seconds", MAX_DURATION_SECS),
                });
            }
        }

        if self.max_history == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "max_history".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.backup_key.trim().is_empty() {
            return Err(ConfigValidationError::MissingKey("backup_key".into()));
        }

        if self.session_key_prefix.trim().is_empty() {
            return Err(ConfigValidationError::MissingKey("session_key_prefix".into()));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("{0} is required")]
    MissingKey(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.session_timeout_secs, 1800);
        assert_eq!(config.cleanup_interval_secs, 300);
        assert_eq!(config.max_history, 50);
        assert!(!config.persist_on_mutation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = SessionConfig::default()
            .with_timeout(Duration::from_secs(60))
            .with_cleanup_interval(Duration::from_secs(10))
            .with_max_history(5)
            .with_persist_on_mutation(true);

        assert_eq!(config.session_timeout_secs, 60);
        assert_eq!(config.timeout(), chrono::Duration::seconds(60));
        assert_eq!(config.cleanup_interval(), Duration::from_secs(10));
        assert_eq!(config.max_history, 5);
        assert!(config.persist_on_mutation);
        assert_eq!(config.session_key("u1"), "lifeline:session:u1");
    }

    #[test]
    fn test_config_validation() {
        let mut config = SessionConfig::default();
        config.session_timeout_secs = 0;
        assert!(config.validate().is_err());

        let config = SessionConfig::default().with_max_history(0);
        assert!(config.validate().is_err());

        let config = SessionConfig::default().with_backup_key("  ");
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::MissingKey(_))
        ));
    }

    #[test]
    fn test_oversized_durations_rejected() {
        let mut config = SessionConfig::default();
        config.session_timeout_secs = 10_u64.pow(16);
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidValue { ref field, .. }) if field == "session_timeout_secs"
        ));

        let mut config = SessionConfig::default();
        config.cleanup_interval_secs = MAX_DURATION_SECS + 1;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.session_timeout_secs = MAX_DURATION_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeout_saturates_instead_of_panicking() {
        let mut config = SessionConfig::default();
        config.session_timeout_secs = 10_u64.pow(16);
        assert_eq!(config.timeout(), chrono::Duration::MAX);

        config.session_timeout_secs = u64::MAX;
        assert_eq!(config.timeout(), chrono::Duration::MAX);
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"session_timeout_secs": 120}"#).unwrap();
        assert_eq!(config.session_timeout_secs, 120);
        assert_eq!(config.max_history, 50);
    }
}
