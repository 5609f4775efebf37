//! Filesystem-backed TTL lock repository.
//!
//! Each key is represented by two sibling files under `lock_dir`: a
//! zero-byte marker created with `O_EXCL` semantics (the cross-process
//! ordering authority) and a JSON info file carrying the owner token
//! and expiry. See DESIGN.md for why a mutex cannot substitute for
//! this on a shared filesystem.

use crate::error::{LockError, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    pub lock_key: String,
    pub uuid: String,
    pub acquired_at: u64,
    pub ttl_seconds: u64,
    pub expires_at: u64,
}

#[derive(Debug, Clone)]
pub struct LockRepository {
    root: PathBuf,
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

impl LockRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Atomic test-and-set. Fails with `AlreadyHeld` if a live record
    /// exists for `key`.
    #[instrument(skip(self), fields(ttl_secs = ttl.as_secs()))]
    pub async fn acquire(&self, key: &str, ttl: Duration) -> Result<(String, LockInfo)> {
        let repo = self.clone();
        let key_owned = key.to_string();
        let result = tokio::task::spawn_blocking(move || repo.acquire_blocking(&key_owned, ttl))
            .await
            .expect("blocking lock task panicked");
        match &result {
            Ok(_) => debug!(key, "lock acquired"),
            Err(err) => debug!(key, error = %err, "lock acquire failed"),
        }
        result
    }

    /// Blocking variant: polls every [`POLL_INTERVAL`] until `wait_timeout`
    /// elapses, then returns `Timeout`. Releasing the returned guard is
    /// guaranteed on every exit path via `Drop`.
    pub async fn acquire_scoped(
        &self,
        key: &str,
        ttl: Duration,
        wait_timeout: Duration,
    ) -> Result<ScopedLock> {
        let deadline = tokio::time::Instant::now() + wait_timeout;
        loop {
            match self.acquire(key, ttl).await {
                Ok((token, info)) => {
                    return Ok(ScopedLock {
                        repo: self.clone(),
                        key: key.to_string(),
                        token,
                        info: Some(info),
                        released: false,
                    })
                }
                Err(LockError::AlreadyHeld(_)) => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(LockError::Timeout(key.to_string()));
                    }
                    tokio::time::sleep(POLL_INTERVAL.min(wait_timeout)).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Idempotent: no-ops if the record is missing. Fails with
    /// `NotOwner` if present and the token does not match.
    #[instrument(skip(self, token))]
    pub async fn release(&self, key: &str, token: &str) -> Result<()> {
        let repo = self.clone();
        let key_owned = key.to_string();
        let token_owned = token.to_string();
        let result = tokio::task::spawn_blocking(move || repo.release_blocking(&key_owned, &token_owned))
            .await
            .expect("blocking lock task panicked");
        if let Err(err) = &result {
            warn!(key, error = %err, "lock release failed");
        } else {
            debug!(key, "lock released");
        }
        result
    }

    pub async fn info(&self, key: &str) -> Result<Option<LockInfo>> {
        let repo = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || repo.info_blocking(&key))
            .await
            .expect("blocking lock task panicked")
    }

    pub async fn is_held(&self, key: &str) -> Result<bool> {
        Ok(self.info(key).await?.is_some())
    }

    /// Returns the subset of `keys` for which `is_held` is false, as
    /// of a single pass. Not linearizable with a concurrent `acquire`
    /// — callers must follow up with a real `acquire`.
    pub async fn filter_idle(&self, keys: &[String]) -> Result<Vec<String>> {
        let mut idle = Vec::new();
        for key in keys {
            if !self.is_held(key).await? {
                idle.push(key.clone());
            }
        }
        Ok(idle)
    }

    // ---- blocking internals ----

    fn marker_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.lock"))
    }

    fn info_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.lock.json"))
    }

    fn acquire_blocking(&self, key: &str, ttl: Duration) -> Result<(String, LockInfo)> {
        std::fs::create_dir_all(&self.root)?;

        for attempt in 0..2 {
            let now = now_epoch();

            if let Some(info) = self.read_info(key)? {
                if info.expires_at > now {
                    return Err(LockError::AlreadyHeld(key.to_string()));
                }
                // Stale record observed on the write path: clean it up.
                let _ = std::fs::remove_file(self.info_path(key));
            }

            match OpenOptions::new().write(true).create_new(true).open(self.marker_path(key)) {
                Ok(_marker) => {
                    let token = Uuid::new_v4().simple().to_string();
                    let info = LockInfo {
                        lock_key: key.to_string(),
                        uuid: token.clone(),
                        acquired_at: now,
                        ttl_seconds: ttl.as_secs(),
                        expires_at: now + ttl.as_secs(),
                    };
                    self.write_info(key, &info)?;
                    return Ok((token, info));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    // Marker exists. If a live info file also exists, someone
                    // else won the race.
                    if let Some(info) = self.read_info(key)? {
                        if info.expires_at > now_epoch() {
                            return Err(LockError::AlreadyHeld(key.to_string()));
                        }
                    }
                    // Marker present, info missing or stale: the previous
                    // holder crashed mid-acquire. Delete both and retry once.
                    let _ = std::fs::remove_file(self.marker_path(key));
                    let _ = std::fs::remove_file(self.info_path(key));
                    if attempt == 1 {
                        return Err(LockError::AlreadyHeld(key.to_string()));
                    }
                }
                Err(e) => return Err(LockError::Io(e)),
            }
        }

        Err(LockError::AlreadyHeld(key.to_string()))
    }

    fn release_blocking(&self, key: &str, token: &str) -> Result<()> {
        match self.read_info(key)? {
            None => Ok(()),
            Some(info) if info.uuid == token => {
                let _ = std::fs::remove_file(self.info_path(key));
                let _ = std::fs::remove_file(self.marker_path(key));
                Ok(())
            }
            Some(_) => Err(LockError::NotOwner(key.to_string())),
        }
    }

    fn info_blocking(&self, key: &str) -> Result<Option<LockInfo>> {
        let now = now_epoch();
        Ok(self.read_info(key)?.filter(|info| info.expires_at > now))
    }

    fn read_info(&self, key: &str) -> Result<Option<LockInfo>> {
        let path = self.info_path(key);
        match std::fs::read(&path) {
            Ok(bytes) => {
                let info: LockInfo = serde_json::from_slice(&bytes)
                    .map_err(|e| LockError::Corrupted(format!("{key}: {e}")))?;
                Ok(Some(info))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LockError::Io(e)),
        }
    }

    fn write_info(&self, key: &str, info: &LockInfo) -> Result<()> {
        let bytes = serde_json::to_vec(info).expect("LockInfo always serializes");
        let path = self.info_path(key);
        let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(&path)?;
        file.write_all(&bytes)?;
        Ok(())
    }
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before the epoch")
        .as_secs()
}

/// An owner-held lock that releases itself on every exit path.
///
/// The primary route is the explicit, awaitable [`ScopedLock::release`];
/// `Drop` is the unwind/panic/cancellation backstop and performs a
/// best-effort synchronous cleanup (it cannot `.await`, so it cannot
/// call the repository's async release path directly).
pub struct ScopedLock {
    repo: LockRepository,
    key: String,
    token: String,
    info: Option<LockInfo>,
    released: bool,
}

impl ScopedLock {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn info(&self) -> Option<&LockInfo> {
        self.info.as_ref()
    }

    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        self.repo.release(&self.key, &self.token).await
    }
}

impl Drop for ScopedLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Best-effort: only clears the record if we still own it.
        let info_path = self.repo.info_path(&self.key);
        let marker_path = self.repo.marker_path(&self.key);
        if let Ok(bytes) = std::fs::read(&info_path) {
            if let Ok(info) = serde_json::from_slice::<LockInfo>(&bytes) {
                if info.uuid == self.token {
                    let _ = std::fs::remove_file(&info_path);
                    let _ = std::fs::remove_file(&marker_path);
                }
            }
        }
    }
}
