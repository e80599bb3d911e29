//! Replication of remote changes into a local store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use srd_core::{Clock, DEFAULT_PAGE_SIZE, EntityStore, EntityType, PageRequest, SystemClock};
use tokio_util::sync::CancellationToken;

use super::{RemoteCatalog, SyncError};

/// Tuning for [`SyncClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    page_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl SyncConfig {
    /// Request pages of `page_size` entities, clamped to the wire limits.
    #[must_use]
    pub fn with_page_size(page_size: i64) -> Self {
        Self {
            page_size: PageRequest::new(0, page_size).page_size(),
        }
    }

    /// Entities requested per page.
    #[must_use]
    pub const fn page_size(self) -> u32 {
        self.page_size
    }
}

/// Outcome of one [`SyncClient::sync_all`] run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Marker to persist and pass to the next run.
    pub marker: DateTime<Utc>,
    /// Entities written to the local store.
    pub upserted: u64,
    /// Entities written, per type; types with no changes are omitted.
    pub per_type: BTreeMap<EntityType, u64>,
}

/// Pulls changes from a [`RemoteCatalog`] into a local [`EntityStore`].
pub struct SyncClient<R, L> {
    remote: R,
    local: L,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
}

impl<R, L> std::fmt::Debug for SyncClient<R, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<R: RemoteCatalog, L: EntityStore> SyncClient<R, L> {
    /// Sync from `remote` into `local` with default settings.
    pub fn new(remote: R, local: L) -> Self {
        Self {
            remote,
            local,
            config: SyncConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Override the page size and other tuning.
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Take "now" from `clock` when the remote is empty.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Local store written by the client.
    pub const fn local(&self) -> &L {
        &self.local
    }

    /// Newest `updated_at` on the remote.
    ///
    /// # Errors
    /// Returns [`SyncError`] when the remote cannot be read.
    pub fn remote_latest(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        self.remote.latest_updated_at()
    }

    /// Replicate every change after `last_marker` and return the next marker.
    ///
    /// The new marker is the remote's newest `updated_at` read once before
    /// any page is fetched, so writes landing mid-run are picked up next
    /// time. An empty remote yields the clock's current time. The marker
    /// never moves backwards past `last_marker`.
    ///
    /// # Errors
    /// Returns [`SyncError`] when the remote or the local store fails, or
    /// [`SyncError::Cancelled`] when `cancel` fires between requests. Entities
    /// written before the failure stay written; the caller must keep its old
    /// marker.
    pub fn sync_all(
        &self,
        last_marker: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let captured = self
            .remote
            .latest_updated_at()?
            .unwrap_or_else(|| self.clock.now());
        let marker = last_marker.map_or(captured, |previous| previous.max(captured));
        info!(
            "syncing changes after {} up to {marker}",
            last_marker.map_or_else(|| "the beginning".to_owned(), |since| since.to_rfc3339())
        );

        let mut per_type = BTreeMap::new();
        let mut upserted = 0;
        for entity_type in EntityType::ALL {
            let written = self.sync_type(entity_type, last_marker, cancel)?;
            if written > 0 {
                info!("synced {written} {entity_type} entities");
                per_type.insert(entity_type, written);
                upserted += written;
            }
        }

        Ok(SyncReport {
            marker,
            upserted,
            per_type,
        })
    }

    fn sync_type(
        &self,
        entity_type: EntityType,
        since: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<u64, SyncError> {
        let mut page = PageRequest::new(0, i64::from(self.config.page_size()));
        let mut written = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let batch = self.remote.get_batch(entity_type, since, page)?;
            let received = batch.len();
            debug!("{entity_type} page {} held {received} entities", page.page());
            for envelope in batch {
                self.local
                    .upsert(envelope.entity_type, &envelope.id, &envelope.payload)
                    .map_err(SyncError::Local)?;
                written += 1;
            }
            if received < page.page_size() as usize {
                return Ok(written);
            }
            page = page.next();
        }
    }
}
