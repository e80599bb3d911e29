//! In-memory store and fixtures shared by unit and behaviour tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde_json::Value;

use crate::registry::{MappingProfile, RegistryStore, SourceDefinition, SourceEntityFeed};
use crate::store::{EntityStore, PageRequest, StoreError};
use crate::{Clock, EntityEnvelope, EntityType, SystemClock};

/// Instant used as the starting point of deterministic clocks.
#[must_use]
pub fn fixed_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[derive(Debug, Default)]
struct Tables {
    entities: BTreeMap<(EntityType, String), (Value, DateTime<Utc>)>,
    sources: BTreeMap<String, SourceDefinition>,
    profiles: BTreeMap<String, MappingProfile>,
    feeds: BTreeMap<String, SourceEntityFeed>,
    last_issued: Option<DateTime<Utc>>,
}

/// `EntityStore` and `RegistryStore` kept in ordered maps.
///
/// The store performs linear scans and is intended only for small datasets.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl MemoryStore {
    /// Create an empty store stamped by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock,
        }
    }

    /// Insert an envelope verbatim, keeping its timestamp.
    pub fn insert_envelope(&self, envelope: EntityEnvelope) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        tables.last_issued = tables.last_issued.max(Some(envelope.updated_at));
        tables.entities.insert(
            (envelope.entity_type, envelope.id),
            (envelope.payload, envelope.updated_at),
        );
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    fn stamp(&self, tables: &mut Tables) -> DateTime<Utc> {
        let now = self.clock.now().trunc_subsecs(6);
        let stamped = tables.last_issued.map_or(now, |last| last.max(now));
        tables.last_issued = Some(stamped);
        stamped
    }
}

fn envelopes_of(tables: &Tables, entity_type: EntityType) -> Vec<EntityEnvelope> {
    tables
        .entities
        .iter()
        .filter(|((kind, _), _)| *kind == entity_type)
        .map(|((kind, id), (payload, updated_at))| EntityEnvelope {
            entity_type: *kind,
            id: id.clone(),
            payload: payload.clone(),
            updated_at: *updated_at,
        })
        .collect()
}

impl EntityStore for MemoryStore {
    fn upsert(
        &self,
        entity_type: EntityType,
        id: &str,
        payload: &Value,
    ) -> Result<DateTime<Utc>, StoreError> {
        let mut tables = self.lock()?;
        let updated_at = self.stamp(&mut tables);
        tables
            .entities
            .insert((entity_type, id.to_owned()), (payload.clone(), updated_at));
        Ok(updated_at)
    }

    fn get_all(&self, entity_type: EntityType) -> Result<Vec<EntityEnvelope>, StoreError> {
        Ok(envelopes_of(&*self.lock()?, entity_type))
    }

    fn latest_updated_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .lock()?
            .entities
            .values()
            .map(|(_, updated_at)| *updated_at)
            .max())
    }

    fn get_batch(
        &self,
        entity_type: EntityType,
        updated_since: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> Result<Vec<EntityEnvelope>, StoreError> {
        let mut matching: Vec<_> = envelopes_of(&*self.lock()?, entity_type)
            .into_iter()
            .filter(|envelope| updated_since.is_none_or(|since| envelope.updated_at > since))
            .collect();
        matching.sort_by(|a, b| (a.updated_at, &a.id).cmp(&(b.updated_at, &b.id)));
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(page.page_size() as usize)
            .collect())
    }

    fn count(&self, entity_type: EntityType) -> Result<u64, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .entities
            .keys()
            .filter(|(kind, _)| *kind == entity_type)
            .count() as u64)
    }
}

impl RegistryStore for MemoryStore {
    fn upsert_source(&self, source: &SourceDefinition) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        let mut stored = source.clone();
        stored.updated_at = Some(self.stamp(&mut tables));
        tables.sources.insert(stored.id.clone(), stored);
        Ok(())
    }

    fn get_source(&self, id: &str) -> Result<Option<SourceDefinition>, StoreError> {
        Ok(self.lock()?.sources.get(id).cloned())
    }

    fn list_sources(&self, enabled_only: bool) -> Result<Vec<SourceDefinition>, StoreError> {
        Ok(self
            .lock()?
            .sources
            .values()
            .filter(|source| !enabled_only || source.enabled)
            .cloned()
            .collect())
    }

    fn upsert_profile(&self, profile: &MappingProfile) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        let mut stored = profile.clone();
        stored.updated_at = Some(self.stamp(&mut tables));
        tables.profiles.insert(stored.id.clone(), stored);
        Ok(())
    }

    fn get_profile(&self, id: &str) -> Result<Option<MappingProfile>, StoreError> {
        Ok(self.lock()?.profiles.get(id).cloned())
    }

    fn upsert_feed(&self, feed: &SourceEntityFeed) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        let mut stored = feed.clone();
        stored.updated_at = Some(self.stamp(&mut tables));
        tables.feeds.insert(stored.id.clone(), stored);
        Ok(())
    }

    fn get_feed(&self, id: &str) -> Result<Option<SourceEntityFeed>, StoreError> {
        Ok(self.lock()?.feeds.get(id).cloned())
    }

    fn list_feeds(
        &self,
        source_id: &str,
        enabled_only: bool,
    ) -> Result<Vec<SourceEntityFeed>, StoreError> {
        Ok(self
            .lock()?
            .feeds
            .values()
            .filter(|feed| feed.source_id == source_id && (!enabled_only || feed.enabled))
            .cloned()
            .collect())
    }
}
