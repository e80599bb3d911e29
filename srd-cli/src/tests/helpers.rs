//! Test helpers: a temporary workspace, stub adapters and a CLI runner.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde_json::Value;
use srd_core::{
    EntityType, FetchConfig, FieldRule, MappingProfile, RegistryStore, SourceConnection,
    SourceDefinition, SourceEntityFeed, SourceKind, SqliteStore,
};
use srd_data::test_support::StubJsonFetcher;
use srd_data::{HttpSourceReader, RemoteCatalog, SourceReaders, StoreCatalog};
use tempfile::TempDir;

use super::*;
use crate::ingest::{IngestConfig, ReaderFactory};
use crate::sync::RemoteConnector;

/// Temporary directory holding catalogues, feed files and exports.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn database(&self) -> Utf8PathBuf {
        self.path("catalogue.db")
    }

    pub(super) fn write_json(&self, name: &str, body: &Value) {
        srd_fs::write_utf8(&self.path(name), &body.to_string()).expect("write fixture");
    }

    /// Register a file source rooted at the workspace with one monster feed.
    pub(super) fn register_monster_feed(&self) {
        let store = SqliteStore::open(self.database().as_std_path()).expect("open catalogue");
        store
            .upsert_source(&SourceDefinition::new(
                "local",
                "Local files",
                SourceKind::File,
                SourceConnection::file(self.root.as_str()),
            ))
            .expect("store source");
        store
            .upsert_profile(&MappingProfile::new(
                "monsters",
                "Monsters",
                EntityType::Monster,
                vec![
                    FieldRule::new("Id").from_sources(["slug"]).required(),
                    FieldRule::new("Name").from_sources(["name"]),
                    FieldRule::new("HitPoints").from_sources(["hit_points"]),
                ],
            ))
            .expect("store profile");
        store
            .upsert_feed(&SourceEntityFeed::new(
                "local_monsters",
                "local",
                EntityType::Monster,
                "monsters",
                FetchConfig::new("monsters.json"),
            ))
            .expect("store feed");
    }

    /// Make the catalogue refuse to store the monster `id`.
    pub(super) fn reject_monster(&self, id: &str) {
        let connection =
            rusqlite::Connection::open(self.database().as_std_path()).expect("open raw catalogue");
        connection
            .execute_batch(&format!(
                "CREATE TRIGGER reject_{id} BEFORE INSERT ON entities
                 WHEN NEW.entity_type = 'Monster' AND NEW.id = '{id}'
                 BEGIN SELECT RAISE(ABORT, 'catalogue refused {id}'); END;"
            ))
            .expect("install trigger");
    }
}

/// Reads HTTP sources through canned responses.
pub(super) struct StubReaderFactory {
    pub(super) http: Arc<StubJsonFetcher>,
}

impl ReaderFactory for StubReaderFactory {
    fn build(&self, _config: &IngestConfig) -> Result<SourceReaders, CliError> {
        Ok(SourceReaders::new(HttpSourceReader::new(Arc::clone(
            &self.http,
        ))))
    }
}

/// Treats the server argument as the path of a SQLite catalogue.
pub(super) struct StoreConnector;

impl RemoteConnector for StoreConnector {
    fn connect(
        &self,
        server: &str,
        _timeout: Duration,
    ) -> Result<Box<dyn RemoteCatalog>, CliError> {
        Ok(Box::new(StoreCatalog(SqliteStore::open(server)?)))
    }
}

/// Parse `argv` and dispatch it, capturing stdout.
pub(super) fn run_cli(
    argv: &[String],
    readers: &dyn ReaderFactory,
) -> (Result<(), CliError>, String) {
    let services = Services {
        readers,
        remote: &StoreConnector,
    };
    let mut output = Vec::new();
    let result = Cli::try_parse_from(argv)
        .map_err(CliError::ArgumentParsing)
        .and_then(|cli| dispatch(cli.command, &services, &mut output));
    (result, String::from_utf8_lossy(&output).into_owned())
}
