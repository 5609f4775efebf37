use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::client::{FantocciniClient, GridClient};
use crate::error::{PoolError, Result};

/// Produces fresh `GridClient`s on demand, so the pool can replace a session
/// that has died without knowing whether it's talking to a real grid or a
/// test double.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn GridClient>>;
}

/// Connects to a live Selenium Grid endpoint via fantoccini.
pub struct FantocciniFactory {
    grid_url: String,
}

impl FantocciniFactory {
    pub fn new(grid_url: impl Into<String>) -> Self {
        FantocciniFactory { grid_url: grid_url.into() }
    }
}

#[async_trait]
impl SessionFactory for FantocciniFactory {
    async fn create(&self) -> Result<Box<dyn GridClient>> {
        let client = fantoccini::Client::new(&self.grid_url).await?;
        Ok(Box::new(FantocciniClient::new(client)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Healthy,
    Suspect,
    Dead,
}

struct SessionEntry {
    handle: Box<dyn GridClient>,
    state: SessionState,
    created_at: Instant,
    last_checked_at: Instant,
}

/// A session handle on loan from the pool, independent of any other
/// outstanding handle to the same session — the pool itself never blocks
/// concurrent `acquire` calls for the same id. Keeping two callers from
/// driving the same browser tab at once is the Lock Repository's job.
pub struct SessionGuard {
    session_id: String,
    client: Box<dyn GridClient>,
}

impl SessionGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn client_mut(&mut self) -> &mut (dyn GridClient + 'static) {
        &mut *self.client
    }
}

/// A warm cache of live WebDriver sessions fronting a Selenium Grid.
///
/// Warm-up runs in the background and never blocks callers that only need
/// an already-healthy session. A session that fails a liveness probe is
/// marked dead and replaced once; a second failure leaves it dead and it
/// drops out of `list()`.
pub struct SessionPool {
    factory: Arc<dyn SessionFactory>,
    init_timeout: Duration,
    registry: Arc<RwLock<IndexMap<String, SessionEntry>>>,
}

impl SessionPool {
    pub fn new(factory: Arc<dyn SessionFactory>, init_timeout: Duration) -> Self {
        SessionPool { factory, init_timeout, registry: Arc::new(RwLock::new(IndexMap::new())) }
    }

    /// Spins up to `capacity` sessions concurrently, bounded by `capacity`
    /// itself. A session that fails to start within `init_timeout` is
    /// dropped, not retried; `warm_up` returns the number that succeeded.
    pub async fn warm_up(&self, capacity: usize) -> Result<usize> {
        let mut tasks = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            let factory = Arc::clone(&self.factory);
            let timeout = self.init_timeout;
            tasks.push(tokio::spawn(async move {
                tokio::time::timeout(timeout, factory.create()).await
            }));
        }

        let mut started = 0;
        for task in tasks {
            match task.await {
                Ok(Ok(Ok(client))) => {
                    let id = uuid::Uuid::new_v4().simple().to_string();
                    let now = Instant::now();
                    self.registry.write().await.insert(
                        id,
                        SessionEntry {
                            handle: client,
                            state: SessionState::Healthy,
                            created_at: now,
                            last_checked_at: now,
                        },
                    );
                    started += 1;
                }
                Ok(Ok(Err(err))) => warn!(error = %err, "session failed to start during warm-up"),
                Ok(Err(_)) => warn!("session start timed out during warm-up"),
                Err(err) => warn!(error = %err, "warm-up task panicked"),
            }
        }
        info!(started, requested = capacity, "session pool warm-up complete");
        Ok(started)
    }

    /// Ids of sessions currently believed healthy. Dead sessions never
    /// appear; a suspect session still appears until its replacement
    /// attempt resolves.
    pub async fn list(&self) -> Vec<String> {
        self.registry
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.state != SessionState::Dead)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Picks any currently healthy session id, preferring the least
    /// recently checked so liveness checks spread across the pool.
    pub async fn pick_any(&self) -> Result<String> {
        let registry = self.registry.read().await;
        registry
            .iter()
            .filter(|(_, entry)| entry.state == SessionState::Healthy)
            .min_by_key(|(_, entry)| entry.last_checked_at)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| PoolError::NoSuchSession("<any>".to_string()))
    }

    /// Lends an independent handle onto the named session. Does not block
    /// on, or exclude, any other outstanding handle to the same session —
    /// the registry lock is held only long enough to clone the handle.
    ///
    /// Per the handle-lending contract: an absent or already-dead entry is
    /// synchronously replaced before lending; a present entry is probed for
    /// liveness first and, on a failed probe, replaced once and re-probed.
    pub async fn acquire(&self, session_id: &str) -> Result<SessionGuard> {
        let is_dead_or_absent = {
            let registry = self.registry.read().await;
            match registry.get(session_id) {
                None => true,
                Some(entry) => entry.state == SessionState::Dead,
            }
        };
        if is_dead_or_absent {
            self.replace_in_place(session_id)
                .await
                .map_err(|_| PoolError::NoSuchSession(session_id.to_string()))?;
        } else if self.probe(session_id).await.is_err() {
            self.replace_in_place(session_id).await?;
            self.probe(session_id).await?;
        }

        let registry = self.registry.read().await;
        let entry = registry
            .get(session_id)
            .ok_or_else(|| PoolError::NoSuchSession(session_id.to_string()))?;
        if entry.state == SessionState::Dead {
            return Err(PoolError::SessionDead(session_id.to_string()));
        }
        Ok(SessionGuard { session_id: session_id.to_string(), client: entry.handle.clone_box() })
    }

    /// Marks a session dead and attempts to replace it in place, once. If
    /// the replacement also fails the session stays dead and drops out of
    /// `list()`/`pick_any()`.
    pub async fn retire(&self, session_id: &str) -> Result<()> {
        {
            let mut registry = self.registry.write().await;
            if let Some(entry) = registry.get_mut(session_id) {
                entry.state = SessionState::Dead;
            }
        }
        debug!(session_id, "retiring session, attempting replacement");
        self.replace_in_place(session_id).await.map_err(|_| {
            warn!(session_id, "session replacement failed, leaving session dead");
            PoolError::SessionDead(session_id.to_string())
        })
    }

    /// Creates a fresh session and inserts it under `session_id`, replacing
    /// whatever entry (if any) was there. Shared by `acquire`'s
    /// replace-before-lend step and `retire`'s replace-after-failure step.
    async fn replace_in_place(&self, session_id: &str) -> Result<()> {
        match tokio::time::timeout(self.init_timeout, self.factory.create()).await {
            Ok(Ok(client)) => {
                let now = Instant::now();
                self.registry.write().await.insert(
                    session_id.to_string(),
                    SessionEntry {
                        handle: client,
                        state: SessionState::Healthy,
                        created_at: now,
                        last_checked_at: now,
                    },
                );
                info!(session_id, "session (re)created");
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(PoolError::GridUnreachable(session_id.to_string())),
        }
    }

    /// Cheap liveness probe: fetches the current URL, without going through
    /// `acquire` (which itself calls this). A failure marks the session
    /// suspect so the next failure retires it rather than flapping on a
    /// single transient error.
    pub async fn check_liveness(&self, session_id: &str) -> Result<()> {
        self.probe(session_id).await
    }

    async fn probe(&self, session_id: &str) -> Result<()> {
        let mut handle = {
            let registry = self.registry.read().await;
            let entry = registry
                .get(session_id)
                .ok_or_else(|| PoolError::NoSuchSession(session_id.to_string()))?;
            entry.handle.clone_box()
        };
        let probed = handle.current_url().await;
        {
            let mut registry = self.registry.write().await;
            if let Some(entry) = registry.get_mut(session_id) {
                entry.last_checked_at = Instant::now();
                entry.state = match (&probed, entry.state) {
                    (Ok(_), _) => SessionState::Healthy,
                    (Err(_), SessionState::Healthy) => SessionState::Suspect,
                    (Err(_), _) => SessionState::Dead,
                };
            }
        }
        probed.map(|_| ())
    }

    /// Closes every session's underlying client. Best-effort: a close
    /// failure for one session doesn't stop the others from closing.
    pub async fn shutdown(&self) {
        let mut registry = self.registry.write().await;
        for (id, entry) in registry.iter_mut() {
            if let Err(err) = entry.handle.close().await {
                warn!(session_id = %id, error = %err, "failed to close session cleanly");
            }
        }
    }
}
