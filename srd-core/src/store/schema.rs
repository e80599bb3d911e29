//! Versioned SQLite schema for the registry and canonical entity tables.

use rusqlite::{Connection, Error as SqliteError, OptionalExtension, Transaction};
use thiserror::Error;

/// Version recorded in `srd_schema_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Create the catalogue tables inside an existing SQLite database.
///
/// The whole schema is created in one transaction. Databases created by a
/// different schema version are rejected so migrations can be applied
/// explicitly.
///
/// # Examples
/// ```
/// use rusqlite::Connection;
/// use srd_core::store::initialise_schema;
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_schema(&mut conn).expect("create schema");
/// initialise_schema(&mut conn).expect("schema creation is idempotent");
///
/// let version: i64 = conn
///     .query_row("SELECT version FROM srd_schema_version LIMIT 1", [], |row| row.get(0))
///     .expect("read schema version");
/// assert_eq!(version, 1);
/// ```
pub fn initialise_schema(connection: &mut Connection) -> Result<(), SchemaError> {
    let transaction = connection
        .transaction()
        .map_err(|source| SchemaError::Migration {
            step: "begin schema transaction",
            source,
        })?;

    create_registry_tables(&transaction)?;
    create_entity_table(&transaction)?;
    ensure_schema_version(&transaction)?;

    transaction
        .commit()
        .map_err(|source| SchemaError::Migration {
            step: "commit schema transaction",
            source,
        })
}

fn create_registry_tables(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create sources",
        "CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY CHECK (length(trim(id)) > 0),
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            connection TEXT NOT NULL,
            enabled INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        ) WITHOUT ROWID",
    )?;
    run_migration_step(
        transaction,
        "create mapping_profiles",
        "CREATE TABLE IF NOT EXISTS mapping_profiles (
            id TEXT PRIMARY KEY CHECK (length(trim(id)) > 0),
            name TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            rules TEXT NOT NULL,
            auto_match INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        ) WITHOUT ROWID",
    )?;
    // Feeds may reference profiles that do not exist yet; ingestion reports
    // the dangling reference instead of the database refusing the row.
    run_migration_step(
        transaction,
        "create feeds",
        "CREATE TABLE IF NOT EXISTS feeds (
            id TEXT PRIMARY KEY CHECK (length(trim(id)) > 0),
            source_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            mapping_profile_id TEXT NOT NULL,
            fetch TEXT NOT NULL,
            enabled INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        ) WITHOUT ROWID",
    )?;
    run_migration_step(
        transaction,
        "index feeds",
        "CREATE INDEX IF NOT EXISTS idx_feeds_source ON feeds(source_id, id)",
    )
}

fn create_entity_table(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create entities",
        "CREATE TABLE IF NOT EXISTS entities (
            entity_type TEXT NOT NULL,
            id TEXT NOT NULL,
            payload TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (entity_type, id)
        ) WITHOUT ROWID",
    )?;
    run_migration_step(
        transaction,
        "index entities",
        "CREATE INDEX IF NOT EXISTS idx_entities_sync
            ON entities(entity_type, updated_at, id)",
    )
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS srd_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    let existing_version: Option<i64> = transaction
        .query_row(
            "SELECT version FROM srd_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| SchemaError::Migration {
            step: "read schema version",
            source,
        })?;

    match existing_version {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(SchemaError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        }),
        None => transaction
            .execute(
                "INSERT INTO srd_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| SchemaError::Migration {
                step: "record schema version",
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError::Migration { step, source })
}

/// Errors raised when initialising the catalogue schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A DDL statement failed.
    #[error("failed to execute migration step '{step}'")]
    Migration {
        /// Name of the failing step.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// The database was created by another schema version.
    #[error(
        "expected catalogue schema version {expected} but found {found}; apply migrations before retrying"
    )]
    VersionMismatch {
        /// Version this build understands.
        expected: i64,
        /// Version recorded in the database.
        found: i64,
    },
}
