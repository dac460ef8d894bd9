//! SessionManager - owns the store and its background services
//!
//! ```text
//! initialize()                      close()
//!   ├─► restore backup                ├─► stop cleanup scheduler
//!   ├─► start cleanup scheduler       ├─► end all sessions (shutdown)
//!   └─► start persistence writer      ├─► write backup
//!                                     └─► drain + stop persistence writer
//! ```

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backup::{BackupService, BackupSummary};
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::environment::{EnvironmentProbe, StaticEnvironment};
use crate::error::Result;
use crate::persistence::PersistenceAdapter;
use crate::scheduler::CleanupScheduler;
use crate::session::SessionStore;
use crate::types::{EndReason, Session, SessionEvent, SessionEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Closed,
}

struct Lifecycle {
    phase: Phase,
    scheduler: Option<CleanupScheduler>,
    events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    writer: Option<WriterHandle>,
}

struct WriterHandle {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Session store plus backup, cleanup and optional per-mutation persistence.
pub struct SessionManager {
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    environment: Arc<dyn EnvironmentProbe>,
    store: Arc<SessionStore>,
    persistence: Arc<dyn PersistenceAdapter>,
    backup: BackupService,
    lifecycle: Mutex<Lifecycle>,
}

impl SessionManager {
    /// Create a manager. Fails if the configuration is invalid.
    pub fn new(config: SessionConfig, persistence: Arc<dyn PersistenceAdapter>) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(
            config,
            persistence,
            Arc::new(SystemClock),
            Arc::new(StaticEnvironment::from_process()),
        ))
    }

    /// Use a different time source.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self::assemble(self.config, self.persistence, clock, self.environment)
    }

    /// Use a different environment probe for session metadata.
    pub fn with_environment(self, environment: Arc<dyn EnvironmentProbe>) -> Self {
        Self::assemble(self.config, self.persistence, self.clock, environment)
    }

    fn assemble(
        config: SessionConfig,
        persistence: Arc<dyn PersistenceAdapter>,
        clock: Arc<dyn Clock>,
        environment: Arc<dyn EnvironmentProbe>,
    ) -> Self {
        let mut store = SessionStore::new(config.clone())
            .with_clock(clock.clone())
            .with_environment(environment.clone());

        let events = if config.persist_on_mutation {
            let (tx, rx) = mpsc::unbounded_channel();
            store = store.with_events(tx);
            Some(rx)
        } else {
            None
        };

        let store = Arc::new(store);
        let backup = BackupService::new(store.clone(), persistence.clone());

        Self {
            config,
            clock,
            environment,
            store,
            persistence,
            backup,
            lifecycle: Mutex::new(Lifecycle {
                phase: Phase::Idle,
                scheduler: None,
                events,
                writer: None,
            }),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn backup(&self) -> &BackupService {
        &self.backup
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Restore from backup and start background services.
    /// Calling it again, or after `close`, does nothing.
    pub async fn initialize(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match lifecycle.phase {
            Phase::Running => return Ok(()),
            Phase::Closed => {
                warn!("Session manager already closed, not reinitializing");
                return Ok(());
            }
            Phase::Idle => {}
        }

        self.backup.restore_from_backup().await;

        if self.config.auto_cleanup {
            lifecycle.scheduler = Some(CleanupScheduler::start(
                self.store.clone(),
                self.config.cleanup_interval(),
            ));
        }

        if let Some(events) = lifecycle.events.take() {
            lifecycle.writer = Some(spawn_writer(
                self.store.clone(),
                self.persistence.clone(),
                self.config.clone(),
                events,
            ));
        }

        lifecycle.phase = Phase::Running;
        info!(
            auto_cleanup = self.config.auto_cleanup,
            persist_on_mutation = self.config.persist_on_mutation,
            "Session manager initialized"
        );
        Ok(())
    }

    /// End every session, write the backup and stop background services.
    /// Works whether or not `initialize` ran. Calling it again does nothing.
    pub async fn close(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.phase == Phase::Closed {
            return Ok(());
        }

        if let Some(scheduler) = lifecycle.scheduler.take() {
            scheduler.stop();
        }

        let ended = self.store.end_all_sessions(EndReason::Shutdown)?;
        let backed_up = self.backup.create_backup().await;

        if let Some(writer) = lifecycle.writer.take() {
            let _ = writer.shutdown.send(());
            if let Err(e) = writer.join.await {
                warn!(error = %e, "Persistence writer did not stop cleanly");
            }
        } else if let Some(mut events) = lifecycle.events.take() {
            // Never initialized: no writer ran, so apply queued events here
            while let Ok(event) = events.try_recv() {
                mirror(&self.store, self.persistence.as_ref(), &self.config, event).await;
            }
        }

        lifecycle.phase = Phase::Closed;
        info!(ended = ended, backed_up = backed_up, "Session manager closed");
        Ok(())
    }

    /// Write a backup without ending any session.
    pub async fn checkpoint(&self) -> Result<BackupSummary> {
        self.backup.write_backup().await
    }

    /// Load a user's mirrored session when they have no active one here.
    /// Only meaningful with per-mutation persistence enabled.
    pub async fn hydrate_user(&self, user_id: &str) -> Result<bool> {
        if !self.config.persist_on_mutation {
            return Ok(false);
        }
        if self.store.get_active_session(user_id)?.is_some() {
            return Ok(false);
        }

        let key = self.config.session_key(user_id);
        let Some(bytes) = self.persistence.get(&key).await? else {
            return Ok(false);
        };
        let session: Session = serde_json::from_slice(&bytes)?;
        if session.user_id != user_id {
            warn!(
                key = %key,
                user_id = %user_id,
                owner = %session.user_id,
                "Mirrored session belongs to another user"
            );
            return Ok(false);
        }

        self.store.adopt_active(session)
    }

    /// Erase a user's data from the store, their mirrored session and the
    /// backup blob. Returns whether anything was held for them.
    pub async fn forget_user(&self, user_id: &str) -> Result<bool> {
        let existed = self.store.delete_user_sessions(user_id)?;
        if let Err(e) = self
            .persistence
            .delete(&self.config.session_key(user_id))
            .await
        {
            warn!(user_id = %user_id, error = %e, "Failed to delete mirrored session");
        }

        let purged = match self.backup.purge_user(user_id).await {
            Ok(purged) => purged,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to purge user from backup");
                false
            }
        };
        Ok(existed || purged)
    }
}

fn spawn_writer(
    store: Arc<SessionStore>,
    persistence: Arc<dyn PersistenceAdapter>,
    config: SessionConfig,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) -> WriterHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(event) => mirror(&store, persistence.as_ref(), &config, event).await,
                    None => break,
                },
                _ = &mut shutdown_rx => {
                    while let Ok(event) = events.try_recv() {
                        mirror(&store, persistence.as_ref(), &config, event).await;
                    }
                    break;
                }
            }
        }
        debug!("Persistence writer stopped");
    });

    WriterHandle {
        shutdown: shutdown_tx,
        join,
    }
}

/// Apply one store event to persistence. Failures are logged only.
async fn mirror(
    store: &SessionStore,
    persistence: &dyn PersistenceAdapter,
    config: &SessionConfig,
    event: SessionEvent,
) {
    let key = config.session_key(&event.user_id);

    let result = match event.kind {
        SessionEventKind::Started | SessionEventKind::Updated => {
            match store.peek_active_session(&event.user_id) {
                Ok(Some(session)) => match serde_json::to_vec(&session) {
                    Ok(blob) => persistence.set(&key, blob).await,
                    Err(e) => Err(e.into()),
                },
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            }
        }
        SessionEventKind::Ended(_) | SessionEventKind::Deleted => persistence.delete(&key).await,
    };

    if let Err(e) = result {
        warn!(
            key = %key,
            session_id = %event.session_id,
            error = %e,
            "Failed to mirror session change"
        );
    }
}
