//! Client side of the watermark sync protocol.
//!
//! A [`RemoteCatalog`] exposes the server's read API: the manifest and
//! paged batches of entities changed after a marker. [`SyncClient`] walks
//! every entity type through it and upserts what it finds into a local
//! [`EntityStore`]. Persisting the returned marker is left to the caller.

mod client;
mod http;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use srd_core::{EntityEnvelope, EntityStore, EntityType, Manifest, PageRequest, StoreError};
use thiserror::Error;

use crate::http::TransportError;

pub use client::{SyncClient, SyncConfig, SyncReport};
pub use http::HttpRemoteCatalog;

/// Failure during a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A request to the server failed.
    #[error(transparent)]
    Remote(#[from] TransportError),
    /// The server answered with a document of the wrong shape.
    #[error("server sent a malformed {document}")]
    Decode {
        /// Which document was being read.
        document: String,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// An in-process remote catalogue failed.
    #[error("remote catalogue failed")]
    Catalog(#[source] StoreError),
    /// The local store rejected a write.
    #[error("local store failed")]
    Local(#[source] StoreError),
    /// The server URL could not be parsed or extended.
    #[error("invalid server URL '{url}'")]
    InvalidUrl {
        /// Offending URL text.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
    /// The cancellation token fired; the marker must not advance.
    #[error("sync was cancelled")]
    Cancelled,
}

/// Read side of a canonical entity store, local or remote.
pub trait RemoteCatalog {
    /// Counts per type and the newest `updated_at`.
    ///
    /// # Errors
    /// Returns [`SyncError`] when the catalogue cannot be reached or read.
    fn manifest(&self) -> Result<Manifest, SyncError>;

    /// Newest `updated_at` in the catalogue.
    ///
    /// # Errors
    /// As for [`RemoteCatalog::manifest`].
    fn latest_updated_at(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        Ok(self.manifest()?.latest_updated_at)
    }

    /// One page of entities changed strictly after `updated_since`.
    ///
    /// # Errors
    /// As for [`RemoteCatalog::manifest`].
    fn get_batch(
        &self,
        entity_type: EntityType,
        updated_since: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> Result<Vec<EntityEnvelope>, SyncError>;
}

impl<T: RemoteCatalog + ?Sized> RemoteCatalog for &T {
    fn manifest(&self) -> Result<Manifest, SyncError> {
        (**self).manifest()
    }

    fn latest_updated_at(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        (**self).latest_updated_at()
    }

    fn get_batch(
        &self,
        entity_type: EntityType,
        updated_since: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> Result<Vec<EntityEnvelope>, SyncError> {
        (**self).get_batch(entity_type, updated_since, page)
    }
}

/// A store in the same process acting as the remote.
#[derive(Debug, Clone)]
pub struct StoreCatalog<S>(pub S);

impl<S: EntityStore> RemoteCatalog for StoreCatalog<S> {
    fn manifest(&self) -> Result<Manifest, SyncError> {
        self.0.manifest().map_err(SyncError::Catalog)
    }

    fn latest_updated_at(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        self.0.latest_updated_at().map_err(SyncError::Catalog)
    }

    fn get_batch(
        &self,
        entity_type: EntityType,
        updated_since: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> Result<Vec<EntityEnvelope>, SyncError> {
        self.0
            .get_batch(entity_type, updated_since, page)
            .map_err(SyncError::Catalog)
    }
}
