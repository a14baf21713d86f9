//! Permission snapshot store
//!
//! Owns the current actor's snapshot. Readers get an `Arc` to an immutable
//! snapshot and never see a half-updated one; the store replaces the whole
//! `Arc` under a short write lock.
//!
//! Loads are single-flight: concurrent `load()` calls queue behind one fetch
//! and reuse its result. Every `invalidate()` bumps a generation counter, and
//! a fetch that started under an older generation is discarded on arrival.

use chrono::{DateTime, Utc};
use console_rbac::{PermissionSnapshot, SnapshotSource};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::client::{HttpSnapshotFetcher, SnapshotFetcher};
use crate::config::{CachePolicy, SessionConfig};
use crate::error::{StoreError, StoreResult};
use crate::retry::{with_retry_if, RetryConfig};

/// Stale fetches tolerated per `load()` before giving up.
const MAX_STALE_REFETCHES: u32 = 3;

/// Server-side changes that can alter what the actor may do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationMutation {
    /// A role's definition changed.
    RoleEdited,
    /// A role was assigned to or removed from an actor.
    RoleAssigned,
    /// Permissions were added to or removed from the permission table.
    PermissionTableChanged,
    /// A permission was linked to or unlinked from a role.
    PermissionRoleLinkChanged,
}

impl AuthorizationMutation {
    /// Get the string representation of the mutation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationMutation::RoleEdited => "role_edited",
            AuthorizationMutation::RoleAssigned => "role_assigned",
            AuthorizationMutation::PermissionTableChanged => "permission_table_changed",
            AuthorizationMutation::PermissionRoleLinkChanged => "permission_role_link_changed",
        }
    }
}

/// What the store currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreStatus {
    /// Nothing loaded yet, or invalidated.
    Empty,
    /// A snapshot is available.
    Ready {
        /// Version of the installed snapshot.
        version: u64,
        /// When it was fetched.
        fetched_at: DateTime<Utc>,
    },
    /// The last load failed; no snapshot is held.
    Failed {
        /// Error code of the failure.
        code: &'static str,
        /// Error message.
        message: String,
    },
}

struct Cached {
    snapshot: Arc<PermissionSnapshot>,
    fetched_at: DateTime<Utc>,
}

#[derive(Default)]
struct Slot {
    cached: Option<Cached>,
    last_error: Option<(&'static str, String)>,
    /// Bumped by every invalidation.
    generation: u64,
}

struct StoreInner<F> {
    fetcher: F,
    slot: RwLock<Slot>,
    fetch_lock: Mutex<()>,
    /// Snapshots installed from the server so far.
    installs: AtomicU64,
    next_version: AtomicU64,
    fetches: AtomicU64,
    cache_policy: CachePolicy,
    retry: RetryConfig,
}

/// Fetches, caches and hands out the actor's permission snapshot.
///
/// Cloning is cheap and every clone shares the same snapshot.
pub struct SnapshotStore<F> {
    inner: Arc<StoreInner<F>>,
}

impl<F> Clone for SnapshotStore<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F> std::fmt::Debug for SnapshotStore<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("cache_policy", &self.inner.cache_policy)
            .field("fetches", &self.inner.fetches.load(Ordering::Relaxed))
            .finish()
    }
}

impl SnapshotStore<HttpSnapshotFetcher> {
    /// A store fetching over HTTP as configured.
    pub fn from_config(config: &SessionConfig) -> StoreResult<Self> {
        config.validate()?;
        let fetcher = HttpSnapshotFetcher::new(config)?;
        Ok(Self::new(fetcher, config))
    }
}

impl<F: SnapshotFetcher> SnapshotStore<F> {
    /// Create a store using the configuration's cache policy and retry budget.
    pub fn new(fetcher: F, config: &SessionConfig) -> Self {
        Self::with_policy(fetcher, config.cache_policy, config.retry())
    }

    /// Create a store with explicit policies.
    pub fn with_policy(fetcher: F, cache_policy: CachePolicy, retry: RetryConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                fetcher,
                slot: RwLock::new(Slot::default()),
                fetch_lock: Mutex::new(()),
                installs: AtomicU64::new(0),
                next_version: AtomicU64::new(0),
                fetches: AtomicU64::new(0),
                cache_policy,
                retry,
            }),
        }
    }

    /// The fetcher in use.
    pub fn fetcher(&self) -> &F {
        &self.inner.fetcher
    }

    /// The cached snapshot, fresh or not, without fetching.
    pub fn current(&self) -> Option<Arc<PermissionSnapshot>> {
        self.read_slot()
            .cached
            .as_ref()
            .map(|cached| Arc::clone(&cached.snapshot))
    }

    /// The cached snapshot, or the fail-closed one when none is held.
    pub fn current_or_deny_all(&self) -> Arc<PermissionSnapshot> {
        self.current()
            .unwrap_or_else(|| Arc::new(PermissionSnapshot::deny_all()))
    }

    /// What the store currently holds.
    pub fn status(&self) -> StoreStatus {
        let slot = self.read_slot();
        match (&slot.cached, &slot.last_error) {
            (Some(cached), _) => StoreStatus::Ready {
                version: cached.snapshot.version(),
                fetched_at: cached.fetched_at,
            },
            (None, Some((code, message))) => StoreStatus::Failed {
                code: *code,
                message: message.clone(),
            },
            (None, None) => StoreStatus::Empty,
        }
    }

    /// Number of fetch attempts made so far (retries included).
    pub fn fetch_count(&self) -> u64 {
        self.inner.fetches.load(Ordering::Relaxed)
    }

    /// Return the snapshot, fetching it when the cache is empty or stale.
    ///
    /// # Errors
    ///
    /// The fetch error after the retry budget is spent, or
    /// [`StoreError::Superseded`] when invalidations keep overtaking the fetch.
    /// A failed load leaves the store empty.
    #[instrument(skip(self))]
    pub async fn load(&self) -> StoreResult<Arc<PermissionSnapshot>> {
        if let Some(snapshot) = self.fresh() {
            debug!(version = snapshot.version(), "Permission snapshot served from cache");
            return Ok(snapshot);
        }

        let installs_before = self.inner.installs.load(Ordering::SeqCst);
        let _flight = self.inner.fetch_lock.lock().await;

        // Someone installed a snapshot while we queued: share it.
        if self.inner.installs.load(Ordering::SeqCst) != installs_before {
            if let Some(snapshot) = self.current() {
                debug!(version = snapshot.version(), "Joined in-flight permission snapshot load");
                return Ok(snapshot);
            }
        }
        if let Some(snapshot) = self.fresh() {
            return Ok(snapshot);
        }

        let mut stale = 0;
        loop {
            let generation = self.read_slot().generation;

            let result = with_retry_if(
                &self.inner.retry,
                || {
                    self.inner.fetches.fetch_add(1, Ordering::Relaxed);
                    self.inner.fetcher.fetch()
                },
                StoreError::is_retryable,
            )
            .await;

            match result {
                Ok(response) => match self.install(response.into_snapshot(), generation) {
                    Some(snapshot) => return Ok(snapshot),
                    None => {
                        stale += 1;
                        warn!(stale, "Discarding permission snapshot fetched before invalidation");
                        if stale >= MAX_STALE_REFETCHES {
                            return Err(StoreError::Superseded { attempts: stale });
                        }
                    }
                },
                Err(error) => {
                    warn!(code = error.error_code(), error = %error, "Permission snapshot load failed");
                    self.record_failure(&error, generation);
                    return Err(error);
                }
            }
        }
    }

    /// Discard the cached snapshot and force the next `load()` to fetch.
    ///
    /// Any fetch already in flight will be discarded when it completes.
    pub fn invalidate(&self) {
        let mut slot = self.write_slot();
        slot.generation += 1;
        slot.cached = None;
        slot.last_error = None;
        debug!(generation = slot.generation, "Permission snapshot invalidated");
    }

    /// Invalidate after `mutation` was confirmed by the server.
    pub fn notify_mutation(&self, mutation: AuthorizationMutation) {
        info!(mutation = mutation.as_str(), "Authorization changed, invalidating permission snapshot");
        self.invalidate();
    }

    /// Invalidate and load.
    pub async fn refresh(&self) -> StoreResult<Arc<PermissionSnapshot>> {
        self.invalidate();
        self.load().await
    }

    /// Withdraw grants locally before the server confirms the change.
    ///
    /// Installs a new snapshot without `identifiers`. This can only ever
    /// remove privileges; there is no local way to add one.
    ///
    /// # Returns
    ///
    /// The new snapshot, or `None` if no snapshot is held.
    pub fn revoke_locally<I, S>(&self, identifiers: I) -> Option<Arc<PermissionSnapshot>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let identifiers: Vec<S> = identifiers.into_iter().collect();
        let mut slot = self.write_slot();
        let (next, fetched_at) = {
            let cached = slot.cached.as_ref()?;
            let version = self.next_version();
            (
                Arc::new(cached.snapshot.without(&identifiers).with_version(version)),
                cached.fetched_at,
            )
        };
        warn!(
            count = identifiers.len(),
            version = next.version(),
            "Revoked permissions locally pending server confirmation"
        );
        slot.cached = Some(Cached {
            snapshot: Arc::clone(&next),
            fetched_at,
        });
        Some(next)
    }

    /// The cached snapshot if the cache policy still trusts it.
    fn fresh(&self) -> Option<Arc<PermissionSnapshot>> {
        let slot = self.read_slot();
        let cached = slot.cached.as_ref()?;
        self.inner
            .cache_policy
            .is_fresh(cached.fetched_at, Utc::now())
            .then(|| Arc::clone(&cached.snapshot))
    }

    /// Install a fetched snapshot unless an invalidation happened since
    /// `generation` was read.
    fn install(&self, snapshot: PermissionSnapshot, generation: u64) -> Option<Arc<PermissionSnapshot>> {
        let mut slot = self.write_slot();
        if slot.generation != generation {
            return None;
        }
        let snapshot = Arc::new(snapshot.with_version(self.next_version()));
        slot.cached = Some(Cached {
            snapshot: Arc::clone(&snapshot),
            fetched_at: Utc::now(),
        });
        slot.last_error = None;
        self.inner.installs.fetch_add(1, Ordering::SeqCst);
        debug!(
            version = snapshot.version(),
            granted = snapshot.granted().len(),
            superadmin = snapshot.is_superadmin(),
            "Permission snapshot installed"
        );
        Some(snapshot)
    }

    /// Fail closed: drop whatever was cached and remember why.
    fn record_failure(&self, error: &StoreError, generation: u64) {
        let mut slot = self.write_slot();
        if slot.generation != generation {
            return;
        }
        slot.cached = None;
        slot.last_error = Some((error.error_code(), error.to_string()));
    }

    fn next_version(&self) -> u64 {
        self.inner.next_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, Slot> {
        self.inner.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Slot> {
        self.inner.slot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F: SnapshotFetcher> SnapshotSource for SnapshotStore<F> {
    fn snapshot(&self) -> Option<Arc<PermissionSnapshot>> {
        self.current()
    }
}
