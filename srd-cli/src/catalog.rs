//! Catalogue maintenance commands: `bootstrap`, `manifest`, `export` and
//! `sources list`.

use std::io::Write;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use srd_core::{
    EntityStore, Manifest, RegistryStore, SourceDefinition, SourceEntityFeed, SqliteStore,
};
use srd_data::{ensure_open5e_registered, export_catalog};

use crate::sync::RemoteConnector;
use crate::{
    ARG_DATABASE, ARG_OUTPUT_DIR, ARG_SERVER, ARG_TIMEOUT, CliError, DEFAULT_TIMEOUT,
    ENV_BOOTSTRAP_DATABASE, ENV_EXPORT_DATABASE, ENV_EXPORT_OUTPUT_DIR, ENV_MANIFEST_DATABASE,
    ENV_SOURCES_LIST_DATABASE, open_store, write_json,
};

/// CLI arguments for the `bootstrap` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "bootstrap",
    about = "Register the default Open5e source, profiles and feeds"
)]
#[ortho_config(prefix = "SRD")]
pub(crate) struct BootstrapArgs {
    /// Path to the SQLite catalogue.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

pub(crate) fn run_bootstrap(args: BootstrapArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let database = merged.database.ok_or(CliError::MissingArgument {
        field: ARG_DATABASE,
        env: ENV_BOOTSTRAP_DATABASE,
    })?;
    let store = open_store(&database)?;
    let report = ensure_open5e_registered(&store)?;
    write_json(writer, &report)
}

/// CLI arguments for the `export` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "export",
    long_about = "Write every entity in the catalogue to <output-dir>, one \
                 pretty-printed JSON array per entity type. Existing files \
                 are replaced.",
    about = "Export the catalogue as JSON files"
)]
#[ortho_config(prefix = "SRD")]
pub(crate) struct ExportArgs {
    /// Path to the SQLite catalogue.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Directory receiving the JSON files.
    #[arg(long = ARG_OUTPUT_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) output_dir: Option<Utf8PathBuf>,
}

/// Resolved `export` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExportConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) output_dir: Utf8PathBuf,
}

impl TryFrom<ExportArgs> for ExportConfig {
    type Error = CliError;

    fn try_from(args: ExportArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_EXPORT_DATABASE,
        })?;
        let output_dir = args.output_dir.ok_or(CliError::MissingArgument {
            field: ARG_OUTPUT_DIR,
            env: ENV_EXPORT_OUTPUT_DIR,
        })?;
        Ok(Self {
            database,
            output_dir,
        })
    }
}

pub(crate) fn run_export(args: ExportArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = ExportConfig::try_from(merged)?;
    let store = open_store(&config.database)?;
    let summary = export_catalog(&store, &config.output_dir)?;
    write_json(writer, &summary)
}

/// CLI arguments for the `manifest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "manifest",
    long_about = "Print the manifest of a local catalogue, a server, or \
                 both. With both, also report whether the local catalogue \
                 has caught up with the server's newest change.",
    about = "Show catalogue manifests"
)]
#[ortho_config(prefix = "SRD")]
pub(crate) struct ManifestArgs {
    /// Path to a local SQLite catalogue.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Base URL of a catalogue server.
    #[arg(long = ARG_SERVER, value_name = "url")]
    #[serde(default)]
    pub(crate) server: Option<String>,
    /// HTTP request timeout in seconds.
    #[arg(long = ARG_TIMEOUT, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

/// Manifests printed by the `manifest` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ManifestView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) local: Option<Manifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) remote: Option<Manifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) up_to_date: Option<bool>,
}

impl ManifestView {
    pub(crate) fn new(local: Option<Manifest>, remote: Option<Manifest>) -> Self {
        let up_to_date = match (&local, &remote) {
            (Some(local), Some(remote)) => {
                Some(remote.latest_updated_at <= local.latest_updated_at)
            }
            _ => None,
        };
        Self {
            local,
            remote,
            up_to_date,
        }
    }
}

pub(crate) fn run_manifest(
    args: ManifestArgs,
    remote: &dyn RemoteConnector,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    if merged.database.is_none() && merged.server.is_none() {
        return Err(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_MANIFEST_DATABASE,
        });
    }
    let local = merged
        .database
        .map(|path| open_store(&path)?.manifest().map_err(CliError::from))
        .transpose()?;
    let timeout = merged
        .timeout_secs
        .map_or(DEFAULT_TIMEOUT, Duration::from_secs);
    let remote = merged
        .server
        .map(|server| Ok::<_, CliError>(remote.connect(&server, timeout)?.manifest()?))
        .transpose()?;
    write_json(writer, &ManifestView::new(local, remote))
}

/// CLI arguments for the `sources list` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(name = "sources-list", about = "List sources and their feeds")]
#[ortho_config(prefix = "SRD")]
pub(crate) struct SourcesListArgs {
    /// Path to the SQLite catalogue.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

/// One registered source with every feed it owns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct SourceListing {
    #[serde(flatten)]
    pub(crate) source: SourceDefinition,
    pub(crate) feeds: Vec<SourceEntityFeed>,
}

pub(crate) fn list_sources(store: &SqliteStore) -> Result<Vec<SourceListing>, CliError> {
    store
        .list_sources(false)?
        .into_iter()
        .map(|source| -> Result<SourceListing, CliError> {
            let feeds = store.list_feeds(&source.id, false)?;
            Ok(SourceListing { source, feeds })
        })
        .collect()
}

pub(crate) fn run_sources_list(
    args: SourcesListArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let database = merged.database.ok_or(CliError::MissingArgument {
        field: ARG_DATABASE,
        env: ENV_SOURCES_LIST_DATABASE,
    })?;
    let store = open_store(&database)?;
    write_json(writer, &list_sources(&store)?)
}
