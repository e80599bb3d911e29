//! Storage contracts for canonical entities.
//!
//! The [`EntityStore`] trait is shared by the server-side catalogue and the
//! client-side cache. Implementations must keep the `(updated_at, id)`
//! ordering of [`EntityStore::get_batch`] stable so that paging through
//! entities that share one timestamp neither skips nor repeats rows.

use std::collections::BTreeMap;
#[cfg(feature = "store-sqlite")]
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{EntityEnvelope, EntityType};

#[cfg(feature = "store-sqlite")]
mod schema;
#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use schema::{SCHEMA_VERSION, SchemaError, initialise_schema};
#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteStore;

/// Page size used when a caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 200;
/// Largest page a store will return.
pub const MAX_PAGE_SIZE: i64 = 2000;

/// Errors raised by entity and registry stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the SQLite database failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to open SQLite database at {path}")]
    Open {
        /// Location of the database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The schema could not be created or has the wrong version.
    #[cfg(feature = "store-sqlite")]
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A SQLite statement failed.
    #[cfg(feature = "store-sqlite")]
    #[error("SQLite operation '{operation}' failed")]
    Database {
        /// Short description of the statement.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A payload or registry record could not be serialised.
    #[error("failed to encode {kind} '{id}'")]
    Encode {
        /// Entity type or registry table name.
        kind: String,
        /// Key of the record.
        id: String,
        /// JSON encoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// A persisted payload or registry record is not valid JSON.
    #[error("failed to decode stored {kind} '{id}'")]
    Decode {
        /// Entity type or registry table name.
        kind: String,
        /// Key of the record.
        id: String,
        /// JSON decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// A persisted entity type name is not recognised.
    #[error(transparent)]
    UnknownEntityType(#[from] crate::UnknownEntityType),
    /// A persisted timestamp cannot be represented.
    #[error("stored timestamp {micros}us is out of range")]
    InvalidTimestamp {
        /// Microseconds since the Unix epoch.
        micros: i64,
    },
    /// Another thread panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Zero-based page coordinates, already clamped to the store limits.
///
/// # Examples
/// ```
/// use srd_core::{MAX_PAGE_SIZE, PageRequest};
///
/// let page = PageRequest::new(-3, 50_000);
/// assert_eq!(page.page(), 0);
/// assert_eq!(page.page_size(), MAX_PAGE_SIZE as u32);
/// assert_eq!(PageRequest::new(2, 10).offset(), 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Clamp `page` to zero or more and `page_size` to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn new(page: i64, page_size: i64) -> Self {
        let page = u32::try_from(page.max(0)).unwrap_or(u32::MAX);
        let page_size = u32::try_from(page_size.clamp(1, MAX_PAGE_SIZE)).unwrap_or(1);
        Self { page, page_size }
    }

    /// Zero-based page index.
    #[must_use]
    pub const fn page(self) -> u32 {
        self.page
    }

    /// Maximum rows in the page.
    #[must_use]
    pub const fn page_size(self) -> u32 {
        self.page_size
    }

    /// Rows skipped before this page.
    #[must_use]
    pub const fn offset(self) -> u64 {
        self.page as u64 * self.page_size as u64
    }

    /// The following page with the same size.
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            page_size: self.page_size,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// Query parameters of `GET /sync/{entityType}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQuery {
    /// Only return entities updated strictly after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_since_utc: Option<DateTime<Utc>>,
    /// Zero-based page index; defaults to 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    /// Page size; defaults to [`DEFAULT_PAGE_SIZE`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<i64>,
}

impl SyncQuery {
    /// Resolve defaults and clamp to the store limits.
    #[must_use]
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(
            self.page.unwrap_or(0),
            self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }
}

/// Body of `GET /manifest`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Newest `updated_at` in the store, or `None` when it is empty.
    pub latest_updated_at: Option<DateTime<Utc>>,
    /// Number of stored entities per type; every type is listed.
    #[serde(default)]
    pub counts: BTreeMap<EntityType, u64>,
}

/// Keyed storage of canonical entities.
///
/// Upserts are idempotent and replace the whole payload. Implementations
/// must serialise concurrent writes and never hand out an `updated_at`
/// older than one they already issued.
pub trait EntityStore {
    /// Insert or replace the entity and return its new `updated_at`.
    fn upsert(
        &self,
        entity_type: EntityType,
        id: &str,
        payload: &Value,
    ) -> Result<DateTime<Utc>, StoreError>;

    /// Every entity of `entity_type`, ordered by id.
    fn get_all(&self, entity_type: EntityType) -> Result<Vec<EntityEnvelope>, StoreError>;

    /// Newest `updated_at` across all entity types.
    fn latest_updated_at(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// One page of entities updated strictly after `updated_since`,
    /// ordered by `(updated_at, id)`.
    fn get_batch(
        &self,
        entity_type: EntityType,
        updated_since: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> Result<Vec<EntityEnvelope>, StoreError>;

    /// Number of stored entities of `entity_type`.
    fn count(&self, entity_type: EntityType) -> Result<u64, StoreError>;

    /// Summary served as `GET /manifest`.
    fn manifest(&self) -> Result<Manifest, StoreError> {
        let mut counts = BTreeMap::new();
        for entity_type in EntityType::ALL {
            counts.insert(entity_type, self.count(entity_type)?);
        }
        Ok(Manifest {
            latest_updated_at: self.latest_updated_at()?,
            counts,
        })
    }

    /// Answer a `GET /sync/{entityType}` request.
    fn sync_page(
        &self,
        entity_type: EntityType,
        query: &SyncQuery,
    ) -> Result<Vec<EntityEnvelope>, StoreError> {
        self.get_batch(entity_type, query.updated_since_utc, query.page_request())
    }
}

impl<T: EntityStore + ?Sized> EntityStore for &T {
    fn upsert(
        &self,
        entity_type: EntityType,
        id: &str,
        payload: &Value,
    ) -> Result<DateTime<Utc>, StoreError> {
        (**self).upsert(entity_type, id, payload)
    }

    fn get_all(&self, entity_type: EntityType) -> Result<Vec<EntityEnvelope>, StoreError> {
        (**self).get_all(entity_type)
    }

    fn latest_updated_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        (**self).latest_updated_at()
    }

    fn get_batch(
        &self,
        entity_type: EntityType,
        updated_since: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> Result<Vec<EntityEnvelope>, StoreError> {
        (**self).get_batch(entity_type, updated_since, page)
    }

    fn count(&self, entity_type: EntityType) -> Result<u64, StoreError> {
        (**self).count(entity_type)
    }
}
