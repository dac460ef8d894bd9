//! Full-state backup and restore.
//!
//! The backup is a single JSON blob holding every session the store knows
//! about, flattened:
//!
//! ```text
//! { "sessions": [Session, ...], "createdAt": "<rfc3339>", "version": "1.0" }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::persistence::PersistenceAdapter;
use crate::session::{SessionStore, UserSessions};
use crate::types::Session;

/// Backup format version written by this crate.
pub const BACKUP_VERSION: &str = "1.0";

/// On-disk backup document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupBlob {
    pub sessions: Vec<Session>,
    pub created_at: DateTime<Utc>,
    pub version: String,
}

/// Result of writing a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSummary {
    pub sessions: usize,
    pub users: usize,
    pub bytes: usize,
    pub created_at: DateTime<Utc>,
}

/// Result of restoring a backup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSummary {
    pub users: usize,
    pub active: usize,
    pub archived: usize,
    /// Sessions marked active in the blob that lost to a newer one.
    pub demoted: usize,
}

/// Writes and reads the backup blob for a store.
pub struct BackupService {
    store: Arc<SessionStore>,
    persistence: Arc<dyn PersistenceAdapter>,
    key: String,
}

impl BackupService {
    pub fn new(store: Arc<SessionStore>, persistence: Arc<dyn PersistenceAdapter>) -> Self {
        let key = store.config().backup_key.clone();
        Self {
            store,
            persistence,
            key,
        }
    }

    /// Persistence key the blob lives under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serialize every session and write the blob.
    pub async fn write_backup(&self) -> Result<BackupSummary> {
        let sessions = self.store.snapshot()?;
        let users = sessions
            .iter()
            .map(|s| s.user_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        let blob = BackupBlob {
            sessions,
            created_at: self.store.now(),
            version: BACKUP_VERSION.to_string(),
        };

        let bytes = serde_json::to_vec(&blob)?;
        let summary = BackupSummary {
            sessions: blob.sessions.len(),
            users,
            bytes: bytes.len(),
            created_at: blob.created_at,
        };
        self.persistence.set(&self.key, bytes).await?;

        info!(
            key = %self.key,
            sessions = summary.sessions,
            users = summary.users,
            "Backup written"
        );
        Ok(summary)
    }

    /// Best-effort backup. Failures are logged and reported as `false`.
    pub async fn create_backup(&self) -> bool {
        match self.write_backup().await {
            Ok(_) => true,
            Err(e) => {
                error!(key = %self.key, error = %e, "Failed to write backup");
                false
            }
        }
    }

    /// Read the blob and install it. Returns `None` when no backup exists.
    ///
    /// Users in the blob have their state replaced; other users are left alone.
    pub async fn read_backup(&self) -> Result<Option<RestoreSummary>> {
        let Some(bytes) = self.persistence.get(&self.key).await? else {
            return Ok(None);
        };

        let blob: BackupBlob = serde_json::from_slice(&bytes)?;
        if blob.version != BACKUP_VERSION {
            warn!(
                key = %self.key,
                version = %blob.version,
                "Backup version differs, attempting restore anyway"
            );
        }

        let (users, summary) = group_backup(blob.sessions);
        self.store.install_user_sessions(users)?;

        info!(
            key = %self.key,
            users = summary.users,
            active = summary.active,
            archived = summary.archived,
            demoted = summary.demoted,
            backup_created_at = %blob.created_at,
            "Backup restored"
        );
        Ok(Some(summary))
    }

    /// Creation time of the stored backup, without restoring it.
    pub async fn last_backup_at(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(bytes) = self.persistence.get(&self.key).await? else {
            return Ok(None);
        };
        let blob: BackupBlob = serde_json::from_slice(&bytes)?;
        Ok(Some(blob.created_at))
    }

    /// Remove one user's sessions from the stored blob, leaving everything
    /// else in it untouched. Returns whether any entry was removed.
    pub async fn purge_user(&self, user_id: &str) -> Result<bool> {
        let Some(bytes) = self.persistence.get(&self.key).await? else {
            return Ok(false);
        };

        let mut blob: BackupBlob = serde_json::from_slice(&bytes)?;
        let before = blob.sessions.len();
        blob.sessions.retain(|s| s.user_id != user_id);
        let removed = before - blob.sessions.len();
        if removed == 0 {
            return Ok(false);
        }

        self.persistence
            .set(&self.key, serde_json::to_vec(&blob)?)
            .await?;
        info!(
            key = %self.key,
            user_id = %user_id,
            removed = removed,
            "User purged from backup"
        );
        Ok(true)
    }

    /// Best-effort restore. `false` when the blob is absent or unreadable.
    pub async fn restore_from_backup(&self) -> bool {
        match self.read_backup().await {
            Ok(Some(_)) => true,
            Ok(None) => {
                info!(key = %self.key, "No backup to restore");
                false
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to restore backup");
                false
            }
        }
    }
}

/// Split a flat session list into per-user state.
///
/// The most recently active of the sessions marked active wins; the rest are
/// finalized at their last activity and join the history, which is ordered
/// by end time.
fn group_backup(sessions: Vec<Session>) -> (Vec<UserSessions>, RestoreSummary) {
    let mut by_user: BTreeMap<String, Vec<Session>> = BTreeMap::new();
    for session in sessions {
        if session.user_id.trim().is_empty() {
            warn!(session_id = %session.id, "Skipping backup entry without a user");
            continue;
        }
        by_user
            .entry(session.user_id.clone())
            .or_default()
            .push(session);
    }

    let mut summary = RestoreSummary::default();
    let mut users = Vec::with_capacity(by_user.len());

    for (user_id, sessions) in by_user {
        let (mut actives, mut history): (Vec<Session>, Vec<Session>) =
            sessions.into_iter().partition(|s| s.is_active);

        let mut active: Option<Session> = None;
        // Stable sort: among equal timestamps the first listed stays in front
        actives.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        for session in actives {
            if active.is_none() {
                active = Some(session);
            } else {
                let mut demoted = session;
                demoted.finalize(demoted.last_activity);
                summary.demoted += 1;
                history.push(demoted);
            }
        }

        for session in history.iter_mut().filter(|s| s.end_time.is_none()) {
            session.finalize(session.last_activity);
        }
        history.sort_by_key(Session::closed_at);

        summary.users += 1;
        summary.active += usize::from(active.is_some());
        summary.archived += history.len();
        users.push(UserSessions {
            user_id,
            active,
            history,
        });
    }

    (users, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::SessionConfig;
    use crate::persistence::MemoryAdapter;
    use crate::types::{PreferencesUpdate, Theme};
    use chrono::{Duration, TimeZone};

    fn setup(config: SessionConfig) -> (Arc<SessionStore>, Arc<MemoryAdapter>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(SessionStore::new(config).with_clock(clock.clone()));
        (store, Arc::new(MemoryAdapter::new()), clock)
    }

    #[tokio::test]
    async fn restore_without_backup_returns_false() {
        let (store, persistence, _) = setup(SessionConfig::default());
        let backup = BackupService::new(store, persistence);
        assert!(!backup.restore_from_backup().await);
        assert!(backup.read_backup().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn backup_round_trip_into_fresh_store() {
        let (store, persistence, clock) = setup(SessionConfig::default());
        store
            .start_session("u1", Some(PreferencesUpdate::default().with_theme(Theme::Dark)))
            .unwrap();
        clock.advance(Duration::minutes(2));
        store.start_session("u1", None).unwrap();
        store.start_session("u2", None).unwrap();

        let backup = BackupService::new(store.clone(), persistence.clone());
        let summary = backup.write_backup().await.unwrap();
        assert_eq!(summary.sessions, 3);
        assert_eq!(summary.users, 2);
        assert!(persistence.contains("lifeline:session_backup").await);

        let fresh = Arc::new(SessionStore::new(SessionConfig::default()).with_clock(clock.clone()));
        let restore = BackupService::new(fresh.clone(), persistence);
        let restored = restore.read_backup().await.unwrap().unwrap();
        assert_eq!(restored.users, 2);
        assert_eq!(restored.active, 2);
        assert_eq!(restored.archived, 1);

        assert_eq!(
            fresh.peek_active_session("u1").unwrap(),
            store.peek_active_session("u1").unwrap()
        );
        assert_eq!(fresh.history("u1").unwrap(), store.history("u1").unwrap());
        assert_eq!(fresh.history("u1").unwrap()[0].preferences.theme, Theme::Dark);
    }

    #[tokio::test]
    async fn summary_users_match_written_sessions() {
        let (store, persistence, _) = setup(SessionConfig::default());
        store.start_session("u1", None).unwrap();
        store.start_session("u2", None).unwrap();
        store.end_session("u2").unwrap();

        let summary = BackupService::new(store, persistence.clone())
            .write_backup()
            .await
            .unwrap();
        let bytes = persistence
            .get("lifeline:session_backup")
            .await
            .unwrap()
            .unwrap();
        let blob: BackupBlob = serde_json::from_slice(&bytes).unwrap();
        let users: HashSet<&str> = blob.sessions.iter().map(|s| s.user_id.as_str()).collect();

        assert_eq!(summary.sessions, blob.sessions.len());
        assert_eq!(summary.users, users.len());
        assert_eq!(summary.users, 2);
    }

    #[tokio::test]
    async fn purge_user_keeps_other_users() {
        let (store, persistence, clock) = setup(SessionConfig::default());
        store.start_session("u1", None).unwrap();
        store.start_session("u1", None).unwrap();
        store.start_session("u2", None).unwrap();
        let backup = BackupService::new(store, persistence.clone());
        backup.write_backup().await.unwrap();

        assert!(backup.purge_user("u1").await.unwrap());
        assert!(!backup.purge_user("u1").await.unwrap());

        let fresh = Arc::new(SessionStore::new(SessionConfig::default()).with_clock(clock));
        BackupService::new(fresh.clone(), persistence)
            .read_backup()
            .await
            .unwrap();
        assert!(!fresh.has_session_data("u1").unwrap());
        assert!(fresh.peek_active_session("u2").unwrap().is_some());
    }

    #[tokio::test]
    async fn blob_shape_uses_camel_case() {
        let (store, persistence, _) = setup(SessionConfig::default());
        store.start_session("u1", None).unwrap();
        BackupService::new(store, persistence.clone())
            .write_backup()
            .await
            .unwrap();

        let bytes = persistence
            .get("lifeline:session_backup")
            .await
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["version"], "1.0");
        assert!(value["createdAt"].is_string());
        assert_eq!(value["sessions"][0]["userId"], "u1");
        assert_eq!(value["sessions"][0]["isActive"], true);
    }

    #[tokio::test]
    async fn duplicate_actives_demote_older() {
        let (store, persistence, clock) = setup(SessionConfig::default());
        let older = store.start_session("u1", None).unwrap();
        store.delete_user_sessions("u1").unwrap();
        clock.advance(Duration::minutes(5));
        let newer = store.start_session("u1", None).unwrap();
        store.delete_user_sessions("u1").unwrap();

        let blob = BackupBlob {
            sessions: vec![older.clone(), newer.clone()],
            created_at: clock.now(),
            version: BACKUP_VERSION.into(),
        };
        persistence
            .set("lifeline:session_backup", serde_json::to_vec(&blob).unwrap())
            .await
            .unwrap();

        let restored = BackupService::new(store.clone(), persistence)
            .read_backup()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.demoted, 1);

        let active = store.peek_active_session("u1").unwrap().unwrap();
        assert_eq!(active.id, newer.id);
        let history = store.history("u1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, older.id);
        assert!(!history[0].is_active);
        assert_eq!(history[0].end_time, Some(older.last_activity));
    }

    #[tokio::test]
    async fn restore_leaves_unlisted_users_alone() {
        let (store, persistence, _) = setup(SessionConfig::default());
        store.start_session("u1", None).unwrap();
        BackupService::new(store.clone(), persistence.clone())
            .write_backup()
            .await
            .unwrap();

        let (other, _, _) = setup(SessionConfig::default());
        let local = other.start_session("local", None).unwrap();
        let backup = BackupService::new(other.clone(), persistence);
        assert!(backup.restore_from_backup().await);

        assert!(other.peek_active_session("u1").unwrap().is_some());
        assert_eq!(other.peek_active_session("local").unwrap().unwrap().id, local.id);
    }

    #[tokio::test]
    async fn restore_trims_history_to_bound() {
        let (store, persistence, clock) = setup(SessionConfig::default());
        for _ in 0..6 {
            store.start_session("u1", None).unwrap();
            clock.advance(Duration::minutes(1));
            store.end_session("u1").unwrap();
        }
        BackupService::new(store.clone(), persistence.clone())
            .write_backup()
            .await
            .unwrap();

        let (small, _, _) = setup(SessionConfig::default().with_max_history(4));
        BackupService::new(small.clone(), persistence)
            .read_backup()
            .await
            .unwrap();

        let kept: Vec<String> = small.history("u1").unwrap().into_iter().map(|s| s.id).collect();
        let expected: Vec<String> = store.history("u1").unwrap()[2..]
            .iter()
            .map(|s| s.id.clone())
            .collect();
        assert_eq!(kept, expected);
    }

    #[tokio::test]
    async fn malformed_blob_is_reported_not_raised() {
        let (store, persistence, _) = setup(SessionConfig::default());
        persistence
            .set("lifeline:session_backup", b"not json".to_vec())
            .await
            .unwrap();

        let backup = BackupService::new(store.clone(), persistence);
        assert!(!backup.restore_from_backup().await);
        assert!(backup.read_backup().await.is_err());
        assert_eq!(store.stats().unwrap().users, 0);
    }
}
