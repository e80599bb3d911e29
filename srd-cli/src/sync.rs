//! `sync` command: copy server changes into a local catalogue.

use std::io::Write;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use srd_data::{
    CancellationToken, HttpConfig, HttpRemoteCatalog, HttpTransport, RemoteCatalog, SyncClient,
    SyncReport,
};
use tracing::info;

use crate::{
    ARG_DATABASE, ARG_MARKER_FILE, ARG_PAGE_SIZE, ARG_SERVER, ARG_SINCE, ARG_TIMEOUT, CliError,
    DEFAULT_TIMEOUT, ENV_SYNC_DATABASE, ENV_SYNC_SERVER, open_store, write_json,
};

/// CLI arguments for the `sync` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "sync",
    long_about = "Ask a catalogue server for every entity changed after a \
                 marker and upsert them into a local catalogue. The marker \
                 comes from --since, else from --marker-file when it exists; \
                 without either the whole catalogue is copied. On success \
                 the new marker is written back to --marker-file.",
    about = "Sync a local catalogue from a server"
)]
#[ortho_config(prefix = "SRD")]
pub(crate) struct SyncArgs {
    /// Path to the local SQLite catalogue.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Base URL of the catalogue server.
    #[arg(long = ARG_SERVER, value_name = "url")]
    #[serde(default)]
    pub(crate) server: Option<String>,
    /// Only copy changes after this RFC 3339 timestamp.
    #[arg(long = ARG_SINCE, value_name = "timestamp")]
    #[serde(default)]
    pub(crate) since: Option<String>,
    /// File holding the marker between runs.
    #[arg(long = ARG_MARKER_FILE, value_name = "path")]
    #[serde(default)]
    pub(crate) marker_file: Option<Utf8PathBuf>,
    /// Entities requested per page.
    #[arg(long = ARG_PAGE_SIZE, value_name = "count")]
    #[serde(default)]
    pub(crate) page_size: Option<i64>,
    /// HTTP request timeout in seconds.
    #[arg(long = ARG_TIMEOUT, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

impl SyncArgs {
    pub(crate) fn into_config(self) -> Result<SyncConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SyncConfig::try_from(merged)
    }
}

/// Resolved `sync` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyncConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) server: String,
    pub(crate) since: Option<DateTime<Utc>>,
    pub(crate) marker_file: Option<Utf8PathBuf>,
    pub(crate) client: srd_data::SyncConfig,
    pub(crate) timeout: Duration,
}

impl TryFrom<SyncArgs> for SyncConfig {
    type Error = CliError;

    fn try_from(args: SyncArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_SYNC_DATABASE,
        })?;
        let server = args.server.ok_or(CliError::MissingArgument {
            field: ARG_SERVER,
            env: ENV_SYNC_SERVER,
        })?;
        let since = args
            .since
            .map(|value| {
                parse_timestamp(&value).map_err(|source| CliError::InvalidTimestamp {
                    field: ARG_SINCE,
                    value,
                    source,
                })
            })
            .transpose()?;
        Ok(Self {
            database,
            server,
            since,
            marker_file: args.marker_file,
            client: args
                .page_size
                .map_or_else(srd_data::SyncConfig::default, srd_data::SyncConfig::with_page_size),
            timeout: args.timeout_secs.map_or(DEFAULT_TIMEOUT, Duration::from_secs),
        })
    }
}

/// Opens the remote catalogue a sync or manifest command talks to.
pub(crate) trait RemoteConnector {
    fn connect(
        &self,
        server: &str,
        timeout: Duration,
    ) -> Result<Box<dyn RemoteCatalog>, CliError>;
}

/// Reaches servers over the HTTP sync protocol.
pub(crate) struct HttpRemoteConnector;

impl RemoteConnector for HttpRemoteConnector {
    fn connect(
        &self,
        server: &str,
        timeout: Duration,
    ) -> Result<Box<dyn RemoteCatalog>, CliError> {
        let transport = HttpTransport::with_config(HttpConfig::default().with_timeout(timeout))?;
        Ok(Box::new(HttpRemoteCatalog::new(transport, server)?))
    }
}

pub(crate) fn run_sync(
    args: SyncArgs,
    remote: &dyn RemoteConnector,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    run_sync_with(&config, remote, writer)
}

pub(crate) fn run_sync_with(
    config: &SyncConfig,
    remote: &dyn RemoteConnector,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let report = execute_sync(config, remote)?;
    write_json(writer, &report)
}

fn execute_sync(config: &SyncConfig, remote: &dyn RemoteConnector) -> Result<SyncReport, CliError> {
    let last_marker = match (config.since, &config.marker_file) {
        (Some(since), _) => Some(since),
        (None, Some(path)) => read_marker(path)?,
        (None, None) => None,
    };
    let store = open_store(&config.database)?;
    let catalog = remote.connect(&config.server, config.timeout)?;
    let client = SyncClient::new(&*catalog, &store).with_config(config.client);
    let report = client.sync_all(last_marker, &CancellationToken::new())?;
    info!(
        upserted = report.upserted,
        marker = %format_timestamp(report.marker),
        "sync finished"
    );
    if let Some(path) = &config.marker_file {
        write_marker(path, report.marker)?;
    }
    Ok(report)
}

/// Read the marker stored at `path`; a missing file means no marker yet.
pub(crate) fn read_marker(path: &Utf8Path) -> Result<Option<DateTime<Utc>>, CliError> {
    let exists = srd_fs::file_exists(path).map_err(|source| CliError::ReadMarker {
        path: path.to_path_buf(),
        source,
    })?;
    if !exists {
        return Ok(None);
    }
    let text = srd_fs::read_utf8(path).map_err(|source| CliError::ReadMarker {
        path: path.to_path_buf(),
        source,
    })?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse_timestamp(trimmed)
        .map(Some)
        .map_err(|source| CliError::InvalidMarker {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) fn write_marker(path: &Utf8Path, marker: DateTime<Utc>) -> Result<(), CliError> {
    srd_fs::write_utf8(path, &format!("{}\n", format_timestamp(marker))).map_err(|source| {
        CliError::WriteMarker {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text.trim()).map(|parsed| parsed.with_timezone(&Utc))
}

fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<SyncConfig, CliError> {
    let merged = SyncArgs::merge_from_layers(layers).map_err(CliError::from)?;
    SyncConfig::try_from(merged)
}
