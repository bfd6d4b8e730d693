//! The secure session store.
//!
//! Owns the master secret for the lifetime of one session and mediates
//! every encrypted read and write:
//!
//! - writes are collected into a pending set and flushed by a single
//!   shared debounce timer (last write wins per key);
//! - reads verify the record's integrity checksum before any decrypt
//!   attempt;
//! - a single inactivity timer expires the session after a quiet period,
//!   flushing best-effort and notifying subscribers exactly once.
//!
//! The master secret is never exposed through any accessor; it is only
//! consumed by the cipher engine at flush and read sites. Timers are
//! plain spawned tasks invalidated by generation counters: re-arming or
//! tearing down bumps the generation, and a timer that wakes to find a
//! newer generation does nothing. A flush that has already snapshotted
//! its batch is past its generation check and always runs to completion,
//! so cancellation can never drop acknowledged writes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::record::{storage_key, StoredRecord, STORAGE_PREFIX};
use crate::crypto::{self, CryptoError};
use crate::storage::{KeyValueStore, StoreError};

/// Errors surfaced by the session store.
#[derive(Error, Debug)]
pub enum SessionError {
    /// An operation requiring an active session was called while
    /// inactive. The caller must re-authenticate; this is never retried
    /// internally.
    #[error("No active secure session")]
    Inactive,

    /// The stored record's checksum did not match. The record is treated
    /// as corrupt and decryption is never attempted.
    #[error("Integrity check failed for key '{key}' - stored record is corrupt")]
    Integrity { key: String },

    /// Wrong password or corrupted data past the integrity check.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The storage backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A record value could not be serialized or deserialized.
    #[error("Record value (de)serialization failed: {0}")]
    Codec(#[from] serde_json::Error),

    /// A background crypto task was cancelled before completion.
    #[error("Vault task was cancelled before completion")]
    Cancelled,
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No master secret held; vault reads and writes are rejected.
    Inactive,
    /// Master secret in memory; vault operations permitted.
    Active,
}

/// Notification emitted exactly once when a session expires from
/// inactivity. Explicit `end_session`/`clear_session` calls do not emit
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionExpired;

/// Timing knobs for the session store.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Quiet period after the last `set_item` before the pending set is
    /// flushed.
    pub write_debounce: Duration,
    /// Inactivity period after which the session expires.
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            write_debounce: Duration::from_millis(300),
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Mutable session state, guarded by one mutex.
///
/// Nothing holds the guard across an await point, so the snapshot-and-
/// clear in the flush path is race-free.
#[derive(Default)]
struct State {
    /// The master secret. `Some` exactly while the session is active.
    master: Option<Arc<SecretString>>,
    /// Latest pending plaintext per logical key (last write wins).
    pending: HashMap<String, String>,
    /// Generation of the most recently armed debounce timer. A timer
    /// waking to an older generation has been superseded and must not
    /// flush.
    debounce_generation: u64,
    /// Generation of the most recently armed inactivity timer.
    idle_generation: u64,
}

struct Inner {
    store: Arc<dyn KeyValueStore>,
    scratch: Option<Arc<dyn KeyValueStore>>,
    config: SessionConfig,
    state: Mutex<State>,
    expiry_tx: broadcast::Sender<SessionExpired>,
}

/// The secure session store. Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SecureSession {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SecureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSession")
            .field("state", &self.state())
            .field("master", &"[REDACTED]")
            .finish()
    }
}

impl SecureSession {
    /// Create a session store over a durable backend, with default
    /// timing.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(store, SessionConfig::default())
    }

    /// Create a session store with custom timing.
    pub fn with_config(store: Arc<dyn KeyValueStore>, config: SessionConfig) -> Self {
        Self::build(store, None, config)
    }

    /// Create a session store that also owns an ephemeral scratch store,
    /// wiped on `clear_session`.
    pub fn with_scratch(
        store: Arc<dyn KeyValueStore>,
        scratch: Arc<dyn KeyValueStore>,
        config: SessionConfig,
    ) -> Self {
        Self::build(store, Some(scratch), config)
    }

    fn build(
        store: Arc<dyn KeyValueStore>,
        scratch: Option<Arc<dyn KeyValueStore>>,
        config: SessionConfig,
    ) -> Self {
        let (expiry_tx, _) = broadcast::channel(4);
        Self {
            inner: Arc::new(Inner {
                store,
                scratch,
                config,
                state: Mutex::new(State::default()),
                expiry_tx,
            }),
        }
    }

    /// Begin a session with the given master password.
    ///
    /// Always succeeds locally: the password is not validated here.
    /// Callers authenticate via the credential hasher first. Arms the
    /// inactivity timer immediately.
    ///
    /// Calling this while already active replaces the master secret in
    /// place. Writes still pending at that point stay queued and are
    /// encrypted under the new secret when they flush.
    ///
    /// Must be called from within a tokio runtime (timers are spawned
    /// tasks).
    pub fn init_session(&self, master: SecretString) {
        let mut state = self.inner.lock();
        state.master = Some(Arc::new(master));
        if !state.pending.is_empty() {
            Inner::arm_debounce(&self.inner, &mut state);
        }
        Inner::arm_idle(&self.inner, &mut state);
        info!("secure session started");
    }

    /// Whether a session is currently active.
    pub fn is_active(&self) -> bool {
        self.inner.lock().master.is_some()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.is_active() {
            SessionState::Active
        } else {
            SessionState::Inactive
        }
    }

    /// Reset the inactivity timer. Call on qualifying user activity.
    ///
    /// No-op while inactive. Resetting supersedes the current timer's
    /// generation, so a superseded timer that fires anyway does nothing;
    /// timers never stack.
    pub fn record_activity(&self) {
        let mut state = self.inner.lock();
        if state.master.is_some() {
            Inner::arm_idle(&self.inner, &mut state);
        }
    }

    /// Subscribe to the one-shot session-expired notification.
    pub fn subscribe_expiry(&self) -> broadcast::Receiver<SessionExpired> {
        self.inner.expiry_tx.subscribe()
    }

    /// Record a value as the pending write for `key` and (re)start the
    /// shared debounce timer.
    ///
    /// Returns immediately; the encrypted write happens when the timer
    /// fires. A later `set_item` for the same key replaces the pending
    /// value (last write wins).
    pub fn set_item<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SessionError> {
        let json = serde_json::to_string(value)?;
        let mut state = self.inner.lock();
        if state.master.is_none() {
            return Err(SessionError::Inactive);
        }
        state.pending.insert(key.to_owned(), json);
        Inner::arm_debounce(&self.inner, &mut state);
        Ok(())
    }

    /// Encrypt and persist a value now, bypassing the debounce window.
    ///
    /// Races with any in-flight debounce flush for the same key;
    /// whichever write completes last wins in the backend.
    pub async fn set_item_immediate<T: Serialize>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), SessionError> {
        let master = self.require_master()?;
        let json = serde_json::to_string(value)?;
        self.inner.persist_one(key, json, master).await
    }

    /// Read and decrypt the record stored under `key`.
    ///
    /// Returns `Ok(None)` when no record exists. The checksum is
    /// recomputed and compared before decryption; on mismatch this fails
    /// with [`SessionError::Integrity`] and the cipher is never invoked.
    pub async fn get_item<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, SessionError> {
        let master = self.require_master()?;
        let Some(raw) = self.inner.store.get(&storage_key(key))? else {
            return Ok(None);
        };
        let record: StoredRecord = serde_json::from_str(&raw)?;
        if !record.verify_integrity() {
            warn!(key, "integrity check failed, refusing to decrypt");
            return Err(SessionError::Integrity {
                key: key.to_owned(),
            });
        }
        let sealed = record.data;
        let plaintext = tokio::task::spawn_blocking(move || crypto::decrypt(&sealed, &master))
            .await
            .map_err(|_| SessionError::Cancelled)??;
        Ok(Some(serde_json::from_str(&plaintext)?))
    }

    /// Delete the record stored under `key`, along with any pending
    /// write for it.
    ///
    /// Callable without an active session: deleting data requires no
    /// access to it, so the read/write guards do not apply here.
    pub fn remove_item(&self, key: &str) -> Result<(), SessionError> {
        self.inner.lock().pending.remove(key);
        self.inner.store.remove(&storage_key(key))?;
        Ok(())
    }

    /// Enumerate logical keys stored under `secure_<user_prefix>_`,
    /// with the namespace stripped.
    pub fn get_secure_keys(&self, user_prefix: &str) -> Vec<String> {
        let prefix = format!("{STORAGE_PREFIX}{user_prefix}_");
        let mut keys = Vec::new();
        let mut index = 0;
        while let Some(key) = self.inner.store.key_at(index) {
            if let Some(logical) = key.strip_prefix(&prefix) {
                keys.push(logical.to_owned());
            }
            index += 1;
        }
        keys
    }

    /// End the session: cancel both timers, flush pending writes
    /// best-effort, and discard the master secret.
    pub async fn end_session(&self) {
        self.teardown(false).await;
    }

    /// End the session and additionally wipe the ephemeral scratch
    /// store.
    pub async fn clear_session(&self) {
        self.teardown(true).await;
    }

    async fn teardown(&self, wipe_scratch: bool) {
        let (batch, master) = {
            let mut state = self.inner.lock();
            // Invalidate sleeping timers. A flush that already snapshotted
            // its batch is past its generation check and completes.
            state.debounce_generation += 1;
            state.idle_generation += 1;
            (std::mem::take(&mut state.pending), state.master.take())
        };
        if let Some(master) = master {
            self.inner.flush_batch(batch, master).await;
            info!("secure session ended");
        }
        if wipe_scratch {
            self.inner.clear_scratch();
        }
    }

    fn require_master(&self) -> Result<Arc<SecretString>, SessionError> {
        self.inner.lock().master.clone().ok_or(SessionError::Inactive)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("session state mutex poisoned")
    }

    /// Supersede any sleeping debounce timer and arm a fresh one.
    fn arm_debounce(inner: &Arc<Self>, state: &mut State) {
        state.debounce_generation += 1;
        let generation = state.debounce_generation;
        let task_inner = Arc::clone(inner);
        let delay = inner.config.write_debounce;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task_inner.flush_pending(generation).await;
        });
    }

    /// Supersede any sleeping inactivity timer and arm a fresh one.
    fn arm_idle(inner: &Arc<Self>, state: &mut State) {
        state.idle_generation += 1;
        let generation = state.idle_generation;
        let task_inner = Arc::clone(inner);
        let timeout = inner.config.idle_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            task_inner.expire(generation).await;
        });
    }

    /// Debounce timer body: snapshot-and-clear the pending set, then
    /// persist every key as an independent concurrent operation. Keys
    /// whose write fails are re-queued for the next flush cycle; the
    /// rest of the batch is unaffected.
    ///
    /// The generation check and the snapshot happen under one lock
    /// acquisition, and nothing aborts this task afterwards, so a batch
    /// that leaves the pending set is always either written or re-queued.
    async fn flush_pending(self: Arc<Self>, generation: u64) {
        let (batch, master) = {
            let mut state = self.lock();
            if state.debounce_generation != generation {
                return;
            }
            let Some(master) = state.master.clone() else {
                return;
            };
            if state.pending.is_empty() {
                return;
            }
            (std::mem::take(&mut state.pending), master)
        };
        debug!(keys = batch.len(), "flushing pending writes");

        let results = join_all(batch.into_iter().map(|(key, value)| {
            let master = Arc::clone(&master);
            let inner = Arc::clone(&self);
            async move {
                let outcome = inner.persist_one(&key, value.clone(), master).await;
                (key, value, outcome)
            }
        }))
        .await;

        let mut state = self.lock();
        for (key, value, outcome) in results {
            if let Err(error) = outcome {
                warn!(key = %key, %error, "write failed, re-queueing for next flush");
                // A newer pending value written during the flush wins
                // over the failed one.
                state.pending.entry(key).or_insert(value);
            }
        }
    }

    /// Best-effort flush used on teardown and expiry. Failures are
    /// logged but nothing is re-queued: the session is going away.
    async fn flush_batch(self: &Arc<Self>, batch: HashMap<String, String>, master: Arc<SecretString>) {
        if batch.is_empty() {
            return;
        }
        debug!(keys = batch.len(), "final flush of pending writes");
        let results = join_all(batch.into_iter().map(|(key, value)| {
            let master = Arc::clone(&master);
            let inner = Arc::clone(self);
            async move { (key.clone(), inner.persist_one(&key, value, master).await) }
        }))
        .await;
        for (key, outcome) in results {
            if let Err(error) = outcome {
                warn!(key = %key, %error, "pending write lost during session teardown");
            }
        }
    }

    /// Inactivity timer body. Transitions to inactive, flushes
    /// best-effort, and emits the expiry notification exactly once.
    ///
    /// The generation check happens under the state lock, so an activity
    /// reset that wins the lock always wins the race: this timer then
    /// sees a newer generation and backs off, even though its sleep has
    /// already returned.
    async fn expire(self: Arc<Self>, generation: u64) {
        let (batch, master) = {
            let mut state = self.lock();
            // Reset or superseded while this timer was firing.
            if state.idle_generation != generation {
                return;
            }
            // Lost the race with an explicit end: nothing to do.
            let Some(master) = state.master.take() else {
                return;
            };
            // Supersede any sleeping debounce timer; its batch comes
            // with us.
            state.debounce_generation += 1;
            (std::mem::take(&mut state.pending), master)
        };
        info!("session expired after inactivity");
        self.flush_batch(batch, master).await;
        // Receiver lagging or absent is the subscriber's concern.
        let _ = self.expiry_tx.send(SessionExpired);
    }

    /// Encrypt one value and persist it as a checksummed record.
    async fn persist_one(
        &self,
        key: &str,
        value: String,
        master: Arc<SecretString>,
    ) -> Result<(), SessionError> {
        let sealed = tokio::task::spawn_blocking(move || crypto::encrypt(&value, &master))
            .await
            .map_err(|_| SessionError::Cancelled)??;
        let record = StoredRecord::seal(sealed);
        let json = serde_json::to_string(&record)?;
        self.store.set(&storage_key(key), &json)?;
        Ok(())
    }

    /// Wipe the ephemeral scratch store by enumerating its key space.
    fn clear_scratch(&self) {
        let Some(scratch) = &self.scratch else {
            return;
        };
        let mut keys = Vec::with_capacity(scratch.len());
        let mut index = 0;
        while let Some(key) = scratch.key_at(index) {
            keys.push(key);
            index += 1;
        }
        for key in keys {
            if let Err(error) = scratch.remove(&key) {
                warn!(key = %key, %error, "failed to clear scratch entry");
            }
        }
    }
}
