//! In-memory session store.
//!
//! Thread-safe via one internal Mutex covering both the active map and the
//! history map. Every public operation holds the lock end to end.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{compute_metrics, merge_into};
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::environment::{EnvironmentProbe, StaticEnvironment};
use crate::error::{Error, Result};
use crate::types::{
    ActivityKind, BehaviorPattern, ConversationContext, EndReason, Personalizations, Preferences,
    PreferencesUpdate, Session, SessionEvent, SessionEventKind, SessionExport, SessionMetrics,
    StoreStats,
};

const MAX_ID_LEN: usize = 256;

/// Outcome of an active-session lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveLookup {
    /// The session is active and within the timeout.
    Found(Session),
    /// The session had idled past the timeout and was archived by this lookup.
    Expired(Session),
    /// No active session for the user.
    Missing,
}

impl ActiveLookup {
    /// The active session, if one was found.
    pub fn into_active(self) -> Option<Session> {
        match self {
            Self::Found(session) => Some(session),
            Self::Expired(_) | Self::Missing => None,
        }
    }
}

/// Everything held for one user, as installed by a restore.
#[derive(Debug, Clone, Default)]
pub struct UserSessions {
    pub user_id: String,
    pub active: Option<Session>,
    /// Ended sessions, oldest first.
    pub history: Vec<Session>,
}

#[derive(Debug, Default)]
struct StoreState {
    active: HashMap<String, Session>,
    history: HashMap<String, VecDeque<Session>>,
}

/// Authoritative store of active sessions and per-user history.
pub struct SessionStore {
    state: Mutex<StoreState>,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    environment: Arc<dyn EnvironmentProbe>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl SessionStore {
    /// Create a store using the wall clock and the process environment.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            config,
            clock: Arc::new(SystemClock),
            environment: Arc::new(StaticEnvironment::from_process()),
            events: None,
        }
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different environment probe for session metadata.
    pub fn with_environment(mut self, environment: Arc<dyn EnvironmentProbe>) -> Self {
        self.environment = environment;
        self
    }

    /// Publish change notifications on `sender`.
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current instant according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a new session, ending the user's current one first.
    pub fn start_session(
        &self,
        user_id: &str,
        initial_preferences: Option<PreferencesUpdate>,
    ) -> Result<Session> {
        validate_id("user_id", user_id)?;
        let now = self.clock.now();
        let mut state = self.lock()?;

        self.close_active(&mut state, user_id, now, EndReason::Replaced);

        let mut preferences = Preferences::default();
        if let Some(update) = initial_preferences {
            preferences.apply(update);
        }

        Ok(self.open_session(&mut state, user_id, preferences, now))
    }

    /// Explicit lookup that reports lazy expiry.
    pub fn lookup_active_session(&self, user_id: &str) -> Result<ActiveLookup> {
        validate_id("user_id", user_id)?;
        let now = self.clock.now();
        let mut state = self.lock()?;

        if let Some(expired) = self.expire_if_stale(&mut state, user_id, now) {
            return Ok(ActiveLookup::Expired(expired));
        }

        Ok(match state.active.get(user_id) {
            Some(session) => ActiveLookup::Found(session.clone()),
            None => ActiveLookup::Missing,
        })
    }

    /// The user's active session, archiving it instead if it has idled past
    /// the timeout.
    pub fn get_active_session(&self, user_id: &str) -> Result<Option<Session>> {
        Ok(self.lookup_active_session(user_id)?.into_active())
    }

    /// Non-mutating read of the active map; no expiry check.
    pub fn peek_active_session(&self, user_id: &str) -> Result<Option<Session>> {
        let state = self.lock()?;
        Ok(state.active.get(user_id).cloned())
    }

    /// End the user's active session. Returns the ended session, if any.
    pub fn end_session(&self, user_id: &str) -> Result<Option<Session>> {
        validate_id("user_id", user_id)?;
        let now = self.clock.now();
        let mut state = self.lock()?;
        Ok(self.close_active(&mut state, user_id, now, EndReason::Explicit))
    }

    /// Start a new session restoring the exact state of an archived one.
    pub fn resume_session(&self, user_id: &str, session_id: &str) -> Result<Option<Session>> {
        validate_id("user_id", user_id)?;
        validate_id("session_id", session_id)?;
        let now = self.clock.now();
        let mut state = self.lock()?;

        // Clone before the replacement end can evict it from history
        let Some(previous) = state
            .history
            .get(user_id)
            .and_then(|history| history.iter().find(|s| s.id == session_id))
            .cloned()
        else {
            debug!(user_id = %user_id, session_id = %session_id, "No archived session to resume");
            return Ok(None);
        };

        self.close_active(&mut state, user_id, now, EndReason::Replaced);
        self.open_session(&mut state, user_id, previous.preferences, now);

        let Some(session) = state.active.get_mut(user_id) else {
            return Ok(None);
        };
        session.conversation_contexts = previous.conversation_contexts;
        session.behavior_patterns = previous.behavior_patterns;
        session.personalizations = previous.personalizations;

        info!(
            user_id = %user_id,
            session_id = %session.id,
            resumed_from = %session_id,
            "Session resumed"
        );
        Ok(Some(session.clone()))
    }

    /// Consolidate sessions gathered from other devices into the active one,
    /// starting a session first when the user has none.
    pub fn merge_sessions(&self, user_id: &str, candidates: &[Session]) -> Result<Session> {
        validate_id("user_id", user_id)?;
        let now = self.clock.now();
        let mut state = self.lock()?;

        self.expire_if_stale(&mut state, user_id, now);
        if !state.active.contains_key(user_id) {
            self.open_session(&mut state, user_id, Preferences::default(), now);
        }

        let (own, foreign): (Vec<&Session>, Vec<&Session>) =
            candidates.iter().partition(|s| s.user_id == user_id);
        for session in &foreign {
            warn!(
                user_id = %user_id,
                session_id = %session.id,
                owner = %session.user_id,
                "Skipping merge candidate owned by another user"
            );
        }
        let own: Vec<Session> = own.into_iter().cloned().collect();

        let Some(target) = state.active.get_mut(user_id) else {
            return Err(Error::not_found("Session", user_id));
        };
        merge_into(target, &own);
        touch(target, now);
        let merged = target.clone();

        self.emit(user_id, &merged.id, SessionEventKind::Updated);
        info!(
            user_id = %user_id,
            session_id = %merged.id,
            candidates = own.len(),
            kind = %ActivityKind::Merge,
            "Sessions merged"
        );
        Ok(merged)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Activity & mutators
    // ─────────────────────────────────────────────────────────────────────────

    /// Record an interaction. Returns false when the user has no active session.
    pub fn record_activity(&self, user_id: &str, kind: ActivityKind) -> Result<bool> {
        self.mutate_active(user_id, kind, |_| {})
    }

    /// Overlay preferences (last write wins per field).
    pub fn update_preferences(&self, user_id: &str, update: PreferencesUpdate) -> Result<bool> {
        self.mutate_active(user_id, ActivityKind::PreferenceChange, |session| {
            session.preferences.apply(update)
        })
    }

    /// Insert or replace the context for one conversation.
    pub fn add_conversation_context(
        &self,
        user_id: &str,
        conversation_id: &str,
        context: ConversationContext,
    ) -> Result<bool> {
        validate_id("conversation_id", conversation_id)?;
        self.mutate_active(user_id, ActivityKind::ContextUpdate, |session| {
            session
                .conversation_contexts
                .insert(conversation_id.to_string(), context);
        })
    }

    /// Add a behavior pattern, replacing any existing pattern of the same type.
    pub fn add_behavior_pattern(&self, user_id: &str, pattern: BehaviorPattern) -> Result<bool> {
        validate_id("pattern_type", &pattern.pattern_type)?;
        self.mutate_active(user_id, ActivityKind::Behavior, |session| {
            session
                .behavior_patterns
                .insert(pattern.pattern_type.clone(), pattern);
        })
    }

    /// Merge personalization sections key by key.
    pub fn update_personalizations(
        &self,
        user_id: &str,
        update: &Personalizations,
    ) -> Result<bool> {
        self.mutate_active(user_id, ActivityKind::Personalization, |session| {
            session.personalizations.merge(update)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads & compliance
    // ─────────────────────────────────────────────────────────────────────────

    /// Aggregate metrics over the active session and full history.
    /// A session idle past the timeout is archived first.
    pub fn session_metrics(&self, user_id: &str) -> Result<SessionMetrics> {
        validate_id("user_id", user_id)?;
        let now = self.clock.now();
        let mut state = self.lock()?;
        self.expire_if_stale(&mut state, user_id, now);
        let history: Vec<Session> = state
            .history
            .get(user_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default();
        Ok(compute_metrics(&history, state.active.get(user_id)))
    }

    /// Deep copy of the user's active and archived sessions.
    /// A session idle past the timeout is archived first.
    pub fn export_session_data(&self, user_id: &str) -> Result<SessionExport> {
        validate_id("user_id", user_id)?;
        let now = self.clock.now();
        let mut state = self.lock()?;
        self.expire_if_stale(&mut state, user_id, now);
        Ok(SessionExport {
            user_id: user_id.to_string(),
            active_session: state.active.get(user_id).cloned(),
            history: state
                .history
                .get(user_id)
                .map(|h| h.iter().cloned().collect())
                .unwrap_or_default(),
            exported_at: now,
        })
    }

    /// Erase everything held for the user. Returns whether anything existed.
    pub fn delete_user_sessions(&self, user_id: &str) -> Result<bool> {
        validate_id("user_id", user_id)?;
        let mut state = self.lock()?;
        let active = state.active.remove(user_id);
        let history = state.history.remove(user_id);
        let existed = active.is_some() || history.as_ref().is_some_and(|h| !h.is_empty());

        if existed {
            let session_id = active.map(|s| s.id).unwrap_or_default();
            self.emit(user_id, &session_id, SessionEventKind::Deleted);
            info!(user_id = %user_id, "User session data deleted");
        }
        Ok(existed)
    }

    /// Whether any active or archived data exists for the user.
    pub fn has_session_data(&self, user_id: &str) -> Result<bool> {
        let state = self.lock()?;
        Ok(state.active.contains_key(user_id)
            || state.history.get(user_id).is_some_and(|h| !h.is_empty()))
    }

    /// The user's archived sessions, oldest first.
    pub fn history(&self, user_id: &str) -> Result<Vec<Session>> {
        let state = self.lock()?;
        Ok(state
            .history
            .get(user_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// All users with active or archived data, sorted.
    pub fn user_ids(&self) -> Result<Vec<String>> {
        let state = self.lock()?;
        let mut ids: Vec<String> = state
            .active
            .keys()
            .chain(state.history.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Aggregate counts.
    pub fn stats(&self) -> Result<StoreStats> {
        let state = self.lock()?;
        let mut users: Vec<&String> = state.active.keys().chain(state.history.keys()).collect();
        users.sort();
        users.dedup();
        Ok(StoreStats {
            users: users.len(),
            active_sessions: state.active.len(),
            archived_sessions: state.history.values().map(VecDeque::len).sum(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance (scheduler, backup)
    // ─────────────────────────────────────────────────────────────────────────

    /// Archive every session idle past the timeout.
    /// Returns `(user_id, session_id)` for each archived session.
    pub fn sweep_expired(&self) -> Result<Vec<(String, String)>> {
        let now = self.clock.now();
        let timeout = self.config.timeout();
        let mut state = self.lock()?;

        let stale: Vec<String> = state
            .active
            .iter()
            .filter(|(_, s)| now - s.last_activity > timeout)
            .map(|(user_id, _)| user_id.clone())
            .collect();

        let mut archived = Vec::with_capacity(stale.len());
        for user_id in stale {
            if let Some(session) = self.expire_if_stale(&mut state, &user_id, now) {
                archived.push((user_id, session.id));
            }
        }

        debug!(archived = archived.len(), "Expiry sweep complete");
        Ok(archived)
    }

    /// End every active session. Returns how many were ended.
    pub fn end_all_sessions(&self, reason: EndReason) -> Result<usize> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        let users: Vec<String> = state.active.keys().cloned().collect();

        let mut ended = 0;
        for user_id in users {
            if self.close_active(&mut state, &user_id, now, reason).is_some() {
                ended += 1;
            }
        }
        Ok(ended)
    }

    /// Every session held, flattened: per user (sorted), history oldest
    /// first followed by the active session.
    pub fn snapshot(&self) -> Result<Vec<Session>> {
        let state = self.lock()?;
        let mut users: Vec<&String> = state.active.keys().chain(state.history.keys()).collect();
        users.sort();
        users.dedup();

        let mut sessions = Vec::new();
        for user_id in users {
            if let Some(history) = state.history.get(user_id) {
                sessions.extend(history.iter().cloned());
            }
            if let Some(active) = state.active.get(user_id) {
                sessions.push(active.clone());
            }
        }
        Ok(sessions)
    }

    /// Replace the state of each listed user. History is trimmed to the
    /// configured bound, keeping the newest entries.
    pub fn install_user_sessions(&self, users: Vec<UserSessions>) -> Result<()> {
        let mut state = self.lock()?;
        for user in users {
            let mut history: VecDeque<Session> = user.history.into();
            while history.len() > self.config.max_history {
                history.pop_front();
            }

            if history.is_empty() {
                state.history.remove(&user.user_id);
            } else {
                state.history.insert(user.user_id.clone(), history);
            }

            match user.active {
                Some(session) => {
                    self.emit(&user.user_id, &session.id, SessionEventKind::Updated);
                    state.active.insert(user.user_id, session);
                }
                None => {
                    state.active.remove(&user.user_id);
                }
            }
        }
        Ok(())
    }

    /// Install `session` as the user's active session unless one exists.
    pub fn adopt_active(&self, session: Session) -> Result<bool> {
        validate_id("user_id", &session.user_id)?;
        if !session.is_active {
            return Ok(false);
        }

        let mut state = self.lock()?;
        if state.active.contains_key(&session.user_id) {
            return Ok(false);
        }
        debug!(user_id = %session.user_id, session_id = %session.id, "Adopted persisted session");
        state.active.insert(session.user_id.clone(), session);
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals (lock held by caller)
    // ─────────────────────────────────────────────────────────────────────────

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| Error::LockPoisoned)
    }

    fn mutate_active<F>(&self, user_id: &str, kind: ActivityKind, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut Session),
    {
        validate_id("user_id", user_id)?;
        let now = self.clock.now();
        let mut state = self.lock()?;

        self.expire_if_stale(&mut state, user_id, now);
        let Some(session) = state.active.get_mut(user_id) else {
            return Ok(false);
        };

        apply(session);
        touch(session, now);
        debug!(
            user_id = %user_id,
            session_id = %session.id,
            kind = %kind,
            interactions = session.interaction_count,
            "Activity recorded"
        );

        let session_id = session.id.clone();
        self.emit(user_id, &session_id, SessionEventKind::Updated);
        Ok(true)
    }

    fn open_session(
        &self,
        state: &mut StoreState,
        user_id: &str,
        preferences: Preferences,
        now: DateTime<Utc>,
    ) -> Session {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            start_time: now,
            last_activity: now,
            end_time: None,
            session_duration: 0,
            is_active: true,
            interaction_count: 0,
            preferences,
            conversation_contexts: Default::default(),
            behavior_patterns: Default::default(),
            personalizations: Personalizations::default(),
            metadata: self.environment.capture(),
        };

        state.active.insert(user_id.to_string(), session.clone());
        self.emit(user_id, &session.id, SessionEventKind::Started);
        info!(
            user_id = %user_id,
            session_id = %session.id,
            device = %session.metadata.device_type,
            "Session started"
        );
        session
    }

    /// Archive the active session if it has idled past the timeout.
    fn expire_if_stale(
        &self,
        state: &mut StoreState,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Option<Session> {
        let stale = state
            .active
            .get(user_id)
            .is_some_and(|s| now - s.last_activity > self.config.timeout());
        if stale {
            self.close_active(state, user_id, now, EndReason::Expired)
        } else {
            None
        }
    }

    /// Finalize and archive the active session. A session already idle past
    /// the timeout is recorded as expired at its last activity.
    fn close_active(
        &self,
        state: &mut StoreState,
        user_id: &str,
        now: DateTime<Utc>,
        reason: EndReason,
    ) -> Option<Session> {
        let mut session = state.active.remove(user_id)?;

        let stale = now - session.last_activity > self.config.timeout();
        let (reason, ended_at) = if stale || reason == EndReason::Expired {
            (EndReason::Expired, session.last_activity)
        } else {
            (reason, now)
        };
        session.finalize(ended_at);

        let history = state.history.entry(user_id.to_string()).or_default();
        history.push_back(session.clone());
        while history.len() > self.config.max_history {
            history.pop_front();
        }

        self.emit(user_id, &session.id, SessionEventKind::Ended(reason));
        info!(
            user_id = %user_id,
            session_id = %session.id,
            reason = %reason,
            duration_ms = session.session_duration,
            "Session ended"
        );
        Some(session)
    }

    fn emit(&self, user_id: &str, session_id: &str, kind: SessionEventKind) {
        if let Some(events) = &self.events {
            // A closed receiver only means nobody is mirroring changes
            let _ = events.send(SessionEvent {
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                kind,
            });
        }
    }
}

/// Count one interaction; `last_activity` never moves backwards.
fn touch(session: &mut Session, now: DateTime<Utc>) {
    session.last_activity = session.last_activity.max(now);
    session.interaction_count += 1;
    session.refresh_duration();
}

/// Reject empty, oversized or control-character identifiers.
fn validate_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_argument(field, "must not be empty"));
    }
    if value.len() > MAX_ID_LEN {
        return Err(Error::invalid_argument(
            field,
            format!("must be {} bytes or less", MAX_ID_LEN),
        ));
    }
    if value.chars().any(char::is_control) {
        return Err(Error::invalid_argument(
            field,
            "must not contain control characters",
        ));
    }
    Ok(())
}
