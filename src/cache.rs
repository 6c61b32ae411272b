//! Refreshable snapshot cache.
//!
//! The cache owns exactly one live [`Snapshot`] behind an `RwLock<Arc<_>>`.
//! Readers clone the `Arc` and keep serving from it for as long as they
//! need; a refresh builds the next snapshot off to the side and installs it
//! with a single pointer assignment, so a reader sees either the old or the
//! new snapshot and never a mix of the two.
//!
//! Refreshes are serialized by an async mutex.  There is no background
//! timer: callers ask [`Cache::ensure_fresh`] on access and the first
//! request past the expiration threshold performs the rebuild.  On failure
//! the previous snapshot stays in place.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use metrics::{counter, gauge, histogram};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::config::{CacheConfig, SiteConfig};
use crate::errors::IndexError;
use crate::listing::{group_entries, Entry, Group};
use crate::metrics::{
    REFRESH_DURATION_SECONDS, REFRESH_TOTAL, SNAPSHOT_ENTRIES, SNAPSHOT_GROUPS,
};
use crate::render::{render_html, render_json};
use crate::storage::lister::{list_all, ObjectLister};

/// Age after which a snapshot is rebuilt on next access.
pub const CACHE_EXPIRATION: TimeDelta = TimeDelta::hours(12);

/// Source of the current time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// One fully built, immutable listing.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Grouped entries.
    pub groups: Vec<Group>,
    /// Pre-rendered HTML page.
    pub html: Bytes,
    /// Pre-rendered JSON document.
    pub json: Bytes,
    /// When the listing behind this snapshot completed.
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Number of entries across all groups.
    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(|g| g.entries.len()).sum()
    }
}

/// Outcome of the most recent refresh attempts.
#[derive(Debug, Clone, Default)]
pub struct RefreshStatus {
    /// Start of the last attempt, successful or not.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Completion of the last successful refresh.
    pub last_success_at: Option<DateTime<Utc>>,
    /// Error of the last attempt, cleared by the next success.
    pub last_error: Option<String>,
    /// Failed attempts since the last success.
    pub consecutive_failures: u64,
}

/// Cache holding the live snapshot and everything needed to rebuild it.
pub struct Cache {
    lister: Arc<dyn ObjectLister>,
    site: SiteConfig,
    settings: CacheConfig,
    clock: Arc<dyn Clock>,
    current: RwLock<Arc<Snapshot>>,
    refresh_lock: Mutex<()>,
    status: RwLock<RefreshStatus>,
}

impl Cache {
    /// Build the cache with an initial synchronous refresh.
    ///
    /// Fails if the initial listing fails; the caller must not serve.
    pub async fn new(
        lister: Arc<dyn ObjectLister>,
        site: SiteConfig,
        settings: CacheConfig,
    ) -> Result<Self, IndexError> {
        Self::with_clock(lister, site, settings, Arc::new(SystemClock)).await
    }

    /// Like [`Cache::new`] with an explicit clock.
    pub async fn with_clock(
        lister: Arc<dyn ObjectLister>,
        site: SiteConfig,
        settings: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, IndexError> {
        let started = clock.now();
        let snapshot = build_snapshot(lister.as_ref(), &site, &settings, clock.as_ref()).await?;
        record_snapshot_metrics(&snapshot);
        info!(
            "Initial snapshot built: {} entries in {} groups",
            snapshot.entry_count(),
            snapshot.groups.len()
        );

        let status = RefreshStatus {
            last_attempt_at: Some(started),
            last_success_at: Some(snapshot.created_at),
            last_error: None,
            consecutive_failures: 0,
        };

        Ok(Self {
            lister,
            site,
            settings,
            clock,
            current: RwLock::new(Arc::new(snapshot)),
            refresh_lock: Mutex::new(()),
            status: RwLock::new(status),
        })
    }

    /// The live snapshot.
    pub async fn current(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    /// Whether the live snapshot is older than [`CACHE_EXPIRATION`].
    pub async fn is_expired(&self) -> bool {
        let snapshot = self.current().await;
        self.is_stale(&snapshot)
    }

    /// When the live snapshot expires.
    pub fn expires_at(snapshot: &Snapshot) -> DateTime<Utc> {
        snapshot.created_at + CACHE_EXPIRATION
    }

    /// Last refresh outcome.
    pub async fn status(&self) -> RefreshStatus {
        self.status.read().await.clone()
    }

    fn is_stale(&self, snapshot: &Snapshot) -> bool {
        self.clock.now() - snapshot.created_at > CACHE_EXPIRATION
    }

    /// Return the live snapshot, refreshing it first if it has expired.
    ///
    /// Concurrent callers that find the cache expired queue on the refresh
    /// lock; whoever gets it second sees the snapshot the first installed
    /// and returns it without listing again.
    pub async fn ensure_fresh(&self) -> Result<Arc<Snapshot>, IndexError> {
        let snapshot = self.current().await;
        if !self.is_stale(&snapshot) {
            return Ok(snapshot);
        }

        let _guard = self.refresh_lock.lock().await;
        let snapshot = self.current().await;
        if !self.is_stale(&snapshot) {
            debug!("Snapshot refreshed by a concurrent request");
            return Ok(snapshot);
        }
        self.refresh_locked().await
    }

    /// Rebuild the snapshot unconditionally.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, IndexError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Caller must hold `refresh_lock`.
    async fn refresh_locked(&self) -> Result<Arc<Snapshot>, IndexError> {
        let attempt_at = self.clock.now();
        let started = Instant::now();
        debug!("Refreshing snapshot");

        let result = build_snapshot(
            self.lister.as_ref(),
            &self.site,
            &self.settings,
            self.clock.as_ref(),
        )
        .await;
        histogram!(REFRESH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        let mut status = self.status.write().await;
        status.last_attempt_at = Some(attempt_at);

        match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *self.current.write().await = snapshot.clone();

                status.last_success_at = Some(snapshot.created_at);
                status.last_error = None;
                status.consecutive_failures = 0;

                counter!(REFRESH_TOTAL, "outcome" => "success").increment(1);
                record_snapshot_metrics(&snapshot);
                info!(
                    "Snapshot refreshed: {} entries in {} groups ({:.2}s)",
                    snapshot.entry_count(),
                    snapshot.groups.len(),
                    started.elapsed().as_secs_f64()
                );
                Ok(snapshot)
            }
            Err(err) => {
                status.last_error = Some(err.to_string());
                status.consecutive_failures += 1;

                counter!(REFRESH_TOTAL, "outcome" => "failure").increment(1);
                error!(
                    "Snapshot refresh failed ({} consecutive): {}",
                    status.consecutive_failures, err
                );
                Err(err)
            }
        }
    }
}

/// List, group and render a complete snapshot.
async fn build_snapshot(
    lister: &dyn ObjectLister,
    site: &SiteConfig,
    settings: &CacheConfig,
    clock: &dyn Clock,
) -> Result<Snapshot, IndexError> {
    let listing = list_all(lister);
    let objects = match settings.refresh_timeout {
        Some(limit) => tokio::time::timeout(limit, listing)
            .await
            .map_err(|_| IndexError::RefreshTimeout {
                seconds: limit.as_secs(),
            })?,
        None => listing.await,
    }
    .map_err(IndexError::Listing)?;

    let entries: Vec<Entry> = objects
        .into_iter()
        .map(|o| Entry::from_listed(o, &site.public_domain, site.encode_keys))
        .collect();
    let groups = group_entries(entries, &site.ungrouped_name);

    let created_at = clock.now();
    let html = render_html(&site.title, &groups, created_at)
        .map_err(|e| IndexError::Render(format!("html: {e}")))?;
    let json = render_json(&groups).map_err(|e| IndexError::Render(format!("json: {e}")))?;

    Ok(Snapshot {
        groups,
        html: Bytes::from(html),
        json: Bytes::from(json),
        created_at,
    })
}

fn record_snapshot_metrics(snapshot: &Snapshot) {
    gauge!(SNAPSHOT_ENTRIES).set(snapshot.entry_count() as f64);
    gauge!(SNAPSHOT_GROUPS).set(snapshot.groups.len() as f64);
}

// -- Tests -------------------------------------------------------------------
