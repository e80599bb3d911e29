//! SQLite-backed catalogue holding registry rows and canonical entities.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SubsecRound, Utc};
use log::debug;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::schema::initialise_schema;
use super::{EntityStore, PageRequest, StoreError};
use crate::registry::{
    FetchConfig, MappingProfile, RegistryStore, SourceConnection, SourceDefinition,
    SourceEntityFeed,
};
use crate::{Clock, EntityEnvelope, EntityType, SystemClock};

/// Catalogue store backed by a single SQLite connection.
///
/// Every operation takes the connection lock, so writes are serialised and
/// timestamps are issued in order. The store never issues an `updated_at`
/// lower than the newest one already persisted, even if the clock steps
/// backwards.
pub struct SqliteStore {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
}

struct State {
    connection: Connection,
    last_issued: Option<DateTime<Utc>>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create a catalogue database at `path`.
    ///
    /// # Errors
    /// Fails when the file cannot be opened or holds another schema version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("opened catalogue database at {}", path.display());
        Self::from_connection(connection)
    }

    /// Create a private in-memory catalogue.
    ///
    /// # Errors
    /// Fails when SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".into(),
            source,
        })?;
        Self::from_connection(connection)
    }

    /// Replace the clock used to stamp writes.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn from_connection(mut connection: Connection) -> Result<Self, StoreError> {
        initialise_schema(&mut connection)?;
        let newest: Option<i64> = connection
            .query_row(
                "SELECT MAX(updated_at) FROM (
                    SELECT updated_at FROM entities
                    UNION ALL SELECT updated_at FROM sources
                    UNION ALL SELECT updated_at FROM mapping_profiles
                    UNION ALL SELECT updated_at FROM feeds
                )",
                [],
                |row| row.get(0),
            )
            .map_err(database("read newest timestamp"))?;
        let last_issued = newest.map(from_micros).transpose()?;
        Ok(Self {
            state: Mutex::new(State {
                connection,
                last_issued,
            }),
            clock: Arc::new(SystemClock),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }

    fn stamp(&self, state: &mut State) -> DateTime<Utc> {
        let now = self.clock.now().trunc_subsecs(6);
        let stamped = state.last_issued.map_or(now, |last| last.max(now));
        state.last_issued = Some(stamped);
        stamped
    }
}

fn database(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::Database { operation, source }
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros).ok_or(StoreError::InvalidTimestamp { micros })
}

fn encode<T: Serialize + ?Sized>(kind: &str, id: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode {
        kind: kind.to_owned(),
        id: id.to_owned(),
        source,
    })
}

fn decode<T: DeserializeOwned>(kind: &str, id: &str, text: &str) -> Result<T, StoreError> {
    serde_json::from_str(text).map_err(|source| StoreError::Decode {
        kind: kind.to_owned(),
        id: id.to_owned(),
        source,
    })
}

type EntityRow = (String, String, i64);

fn envelope(
    entity_type: EntityType,
    (id, payload, updated_at): EntityRow,
) -> Result<EntityEnvelope, StoreError> {
    let payload: Value = decode(entity_type.as_str(), &id, &payload)?;
    Ok(EntityEnvelope {
        entity_type,
        id,
        payload,
        updated_at: from_micros(updated_at)?,
    })
}

impl EntityStore for SqliteStore {
    fn upsert(
        &self,
        entity_type: EntityType,
        id: &str,
        payload: &Value,
    ) -> Result<DateTime<Utc>, StoreError> {
        let text = encode(entity_type.as_str(), id, payload)?;
        let mut state = self.lock()?;
        let updated_at = self.stamp(&mut state);
        state
            .connection
            .prepare_cached(
                "INSERT INTO entities (entity_type, id, payload, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(entity_type, id) DO UPDATE SET
                    payload = excluded.payload,
                    updated_at = excluded.updated_at",
            )
            .and_then(|mut statement| {
                statement.execute(params![
                    entity_type.as_str(),
                    id,
                    text,
                    updated_at.timestamp_micros()
                ])
            })
            .map_err(database("upsert entity"))?;
        Ok(updated_at)
    }

    fn get_all(&self, entity_type: EntityType) -> Result<Vec<EntityEnvelope>, StoreError> {
        let state = self.lock()?;
        let rows: Vec<EntityRow> = state
            .connection
            .prepare_cached(
                "SELECT id, payload, updated_at FROM entities
                 WHERE entity_type = ?1 ORDER BY id",
            )
            .and_then(|mut statement| {
                statement
                    .query_map([entity_type.as_str()], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })?
                    .collect()
            })
            .map_err(database("list entities"))?;
        rows.into_iter()
            .map(|row| envelope(entity_type, row))
            .collect()
    }

    fn latest_updated_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let state = self.lock()?;
        let newest: Option<i64> = state
            .connection
            .query_row("SELECT MAX(updated_at) FROM entities", [], |row| row.get(0))
            .map_err(database("read latest entity timestamp"))?;
        newest.map(from_micros).transpose()
    }

    fn get_batch(
        &self,
        entity_type: EntityType,
        updated_since: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> Result<Vec<EntityEnvelope>, StoreError> {
        let since = updated_since.map(|instant| instant.timestamp_micros());
        let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
        let state = self.lock()?;
        let rows: Vec<EntityRow> = state
            .connection
            .prepare_cached(
                "SELECT id, payload, updated_at FROM entities
                 WHERE entity_type = ?1 AND (?2 IS NULL OR updated_at > ?2)
                 ORDER BY updated_at ASC, id ASC
                 LIMIT ?3 OFFSET ?4",
            )
            .and_then(|mut statement| {
                statement
                    .query_map(
                        params![entity_type.as_str(), since, page.page_size(), offset],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )?
                    .collect()
            })
            .map_err(database("page entities"))?;
        rows.into_iter()
            .map(|row| envelope(entity_type, row))
            .collect()
    }

    fn count(&self, entity_type: EntityType) -> Result<u64, StoreError> {
        let state = self.lock()?;
        let count: i64 = state
            .connection
            .query_row(
                "SELECT COUNT(*) FROM entities WHERE entity_type = ?1",
                [entity_type.as_str()],
                |row| row.get(0),
            )
            .map_err(database("count entities"))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

type SourceRow = (String, String, String, String, bool, i64);
type ProfileRow = (String, String, String, String, bool, i64);
type FeedRow = (String, String, String, String, String, bool, i64);

fn source_from_row(
    (id, name, kind, connection, enabled, updated_at): SourceRow,
) -> Result<SourceDefinition, StoreError> {
    let kind = serde_json::from_value(Value::String(kind)).map_err(|source| {
        StoreError::Decode {
            kind: "source".to_owned(),
            id: id.clone(),
            source,
        }
    })?;
    let connection: SourceConnection = decode("source", &id, &connection)?;
    Ok(SourceDefinition {
        id,
        name,
        kind,
        connection,
        enabled,
        updated_at: Some(from_micros(updated_at)?),
    })
}

fn profile_from_row(
    (id, name, entity_type, rules, auto_match, updated_at): ProfileRow,
) -> Result<MappingProfile, StoreError> {
    Ok(MappingProfile {
        rules: decode("mapping profile", &id, &rules)?,
        entity_type: entity_type.parse()?,
        id,
        name,
        auto_match,
        updated_at: Some(from_micros(updated_at)?),
    })
}

fn feed_from_row(
    (id, source_id, entity_type, mapping_profile_id, fetch, enabled, updated_at): FeedRow,
) -> Result<SourceEntityFeed, StoreError> {
    let fetch: FetchConfig = decode("feed", &id, &fetch)?;
    Ok(SourceEntityFeed {
        id,
        source_id,
        entity_type: entity_type.parse()?,
        mapping_profile_id,
        fetch,
        enabled,
        updated_at: Some(from_micros(updated_at)?),
    })
}

impl RegistryStore for SqliteStore {
    fn upsert_source(&self, source: &SourceDefinition) -> Result<(), StoreError> {
        let connection = encode("source", &source.id, &source.connection)?;
        let mut state = self.lock()?;
        let updated_at = self.stamp(&mut state);
        state
            .connection
            .execute(
                "INSERT OR REPLACE INTO sources (id, name, kind, connection, enabled, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    source.id,
                    source.name,
                    source.kind.as_str(),
                    connection,
                    source.enabled,
                    updated_at.timestamp_micros()
                ],
            )
            .map_err(database("upsert source"))?;
        Ok(())
    }

    fn get_source(&self, id: &str) -> Result<Option<SourceDefinition>, StoreError> {
        let state = self.lock()?;
        let row: Option<SourceRow> = state
            .connection
            .query_row(
                "SELECT id, name, kind, connection, enabled, updated_at
                 FROM sources WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()
            .map_err(database("read source"))?;
        row.map(source_from_row).transpose()
    }

    fn list_sources(&self, enabled_only: bool) -> Result<Vec<SourceDefinition>, StoreError> {
        let state = self.lock()?;
        let rows: Vec<SourceRow> = state
            .connection
            .prepare_cached(
                "SELECT id, name, kind, connection, enabled, updated_at
                 FROM sources WHERE (?1 = 0 OR enabled = 1) ORDER BY id",
            )
            .and_then(|mut statement| {
                statement
                    .query_map([enabled_only], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    })?
                    .collect()
            })
            .map_err(database("list sources"))?;
        rows.into_iter().map(source_from_row).collect()
    }

    fn upsert_profile(&self, profile: &MappingProfile) -> Result<(), StoreError> {
        let rules = encode("mapping profile", &profile.id, &profile.rules)?;
        let mut state = self.lock()?;
        let updated_at = self.stamp(&mut state);
        state
            .connection
            .execute(
                "INSERT OR REPLACE INTO mapping_profiles
                    (id, name, entity_type, rules, auto_match, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    profile.id,
                    profile.name,
                    profile.entity_type.as_str(),
                    rules,
                    profile.auto_match,
                    updated_at.timestamp_micros()
                ],
            )
            .map_err(database("upsert mapping profile"))?;
        Ok(())
    }

    fn get_profile(&self, id: &str) -> Result<Option<MappingProfile>, StoreError> {
        let state = self.lock()?;
        let row: Option<ProfileRow> = state
            .connection
            .query_row(
                "SELECT id, name, entity_type, rules, auto_match, updated_at
                 FROM mapping_profiles WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()
            .map_err(database("read mapping profile"))?;
        row.map(profile_from_row).transpose()
    }

    fn upsert_feed(&self, feed: &SourceEntityFeed) -> Result<(), StoreError> {
        let fetch = encode("feed", &feed.id, &feed.fetch)?;
        let mut state = self.lock()?;
        let updated_at = self.stamp(&mut state);
        state
            .connection
            .execute(
                "INSERT OR REPLACE INTO feeds
                    (id, source_id, entity_type, mapping_profile_id, fetch, enabled, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    feed.id,
                    feed.source_id,
                    feed.entity_type.as_str(),
                    feed.mapping_profile_id,
                    fetch,
                    feed.enabled,
                    updated_at.timestamp_micros()
                ],
            )
            .map_err(database("upsert feed"))?;
        Ok(())
    }

    fn get_feed(&self, id: &str) -> Result<Option<SourceEntityFeed>, StoreError> {
        let state = self.lock()?;
        let row: Option<FeedRow> = state
            .connection
            .query_row(
                "SELECT id, source_id, entity_type, mapping_profile_id, fetch, enabled, updated_at
                 FROM feeds WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()
            .map_err(database("read feed"))?;
        row.map(feed_from_row).transpose()
    }

    fn list_feeds(
        &self,
        source_id: &str,
        enabled_only: bool,
    ) -> Result<Vec<SourceEntityFeed>, StoreError> {
        let state = self.lock()?;
        let rows: Vec<FeedRow> = state
            .connection
            .prepare_cached(
                "SELECT id, source_id, entity_type, mapping_profile_id, fetch, enabled, updated_at
                 FROM feeds WHERE source_id = ?1 AND (?2 = 0 OR enabled = 1) ORDER BY id",
            )
            .and_then(|mut statement| {
                statement
                    .query_map(params![source_id, enabled_only], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                        ))
                    })?
                    .collect()
            })
            .map_err(database("list feeds"))?;
        rows.into_iter().map(feed_from_row).collect()
    }
}
