//! Command-line interface for the SRD content engine.
//!
//! Every subcommand works against a SQLite catalogue. Arguments are layered
//! from CLI flags, configuration files and `SRD_CMDS_*` environment variables
//! with `ortho_config`, then resolved into a validated configuration before
//! any I/O happens. Results are written to stdout as pretty-printed JSON;
//! logs go to stderr.
#![forbid(unsafe_code)]

use std::io::Write;
use std::time::Duration;

use camino::Utf8Path;
use clap::{Parser, Subcommand};
use serde::Serialize;
use srd_core::SqliteStore;

mod catalog;
mod error;
mod ingest;
mod logging;
mod sync;

pub use error::CliError;

use catalog::{BootstrapArgs, ExportArgs, ManifestArgs, SourcesListArgs};
use ingest::{IngestArgs, ReaderFactory, TransportReaderFactory};
use sync::{HttpRemoteConnector, RemoteConnector, SyncArgs};

pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_LABEL: &str = "label";
pub(crate) const ARG_SOURCE: &str = "source";
pub(crate) const ARG_FEED: &str = "feed";
pub(crate) const ARG_ENSURE_OPEN5E: &str = "ensure-open5e";
pub(crate) const ARG_TIMEOUT: &str = "timeout-secs";
pub(crate) const ARG_SERVER: &str = "server";
pub(crate) const ARG_SINCE: &str = "since";
pub(crate) const ARG_MARKER_FILE: &str = "marker-file";
pub(crate) const ARG_PAGE_SIZE: &str = "page-size";
pub(crate) const ARG_OUTPUT_DIR: &str = "output-dir";

pub(crate) const ENV_INGEST_DATABASE: &str = "SRD_CMDS_INGEST_DATABASE";
pub(crate) const ENV_BOOTSTRAP_DATABASE: &str = "SRD_CMDS_BOOTSTRAP_DATABASE";
pub(crate) const ENV_SYNC_DATABASE: &str = "SRD_CMDS_SYNC_DATABASE";
pub(crate) const ENV_SYNC_SERVER: &str = "SRD_CMDS_SYNC_SERVER";
pub(crate) const ENV_MANIFEST_DATABASE: &str = "SRD_CMDS_MANIFEST_DATABASE";
pub(crate) const ENV_EXPORT_DATABASE: &str = "SRD_CMDS_EXPORT_DATABASE";
pub(crate) const ENV_EXPORT_OUTPUT_DIR: &str = "SRD_CMDS_EXPORT_OUTPUT_DIR";
pub(crate) const ENV_SOURCES_LIST_DATABASE: &str = "SRD_CMDS_SOURCES_LIST_DATABASE";

/// Request timeout used when `--timeout-secs` is not given.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Run the SRD CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments are invalid, a command fails, or an
/// ingestion run reports errors.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    logging::init()?;
    let services = Services {
        readers: &TransportReaderFactory,
        remote: &HttpRemoteConnector,
    };
    let mut stdout = std::io::stdout().lock();
    dispatch(cli.command, &services, &mut stdout)
}

/// Adapters a command needs beyond its own configuration.
pub(crate) struct Services<'a> {
    pub(crate) readers: &'a dyn ReaderFactory,
    pub(crate) remote: &'a dyn RemoteConnector,
}

pub(crate) fn dispatch(
    command: Command,
    services: &Services<'_>,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    match command {
        Command::Ingest(args) => ingest::run_ingest(args, services.readers, writer),
        Command::Bootstrap(args) => catalog::run_bootstrap(args, writer),
        Command::Sync(args) => sync::run_sync(args, services.remote, writer),
        Command::Manifest(args) => catalog::run_manifest(args, services.remote, writer),
        Command::Export(args) => catalog::run_export(args, writer),
        Command::Sources {
            command: SourcesCommand::List(args),
        } => catalog::run_sources_list(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "srd",
    about = "Ingest, sync and export SRD rules content",
    version
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Pull records from registered sources into the catalogue.
    Ingest(IngestArgs),
    /// Register the default Open5e source, profiles and feeds.
    Bootstrap(BootstrapArgs),
    /// Copy changes from a catalogue server into a local catalogue.
    Sync(SyncArgs),
    /// Show entity counts and the newest change of a catalogue.
    Manifest(ManifestArgs),
    /// Write the catalogue to one JSON file per entity type.
    Export(ExportArgs),
    /// Inspect registered sources.
    Sources {
        #[command(subcommand)]
        command: SourcesCommand,
    },
}

#[derive(Debug, Subcommand)]
pub(crate) enum SourcesCommand {
    /// List sources and their feeds.
    List(SourcesListArgs),
}

/// Open the catalogue at `path`, creating its directory when missing.
pub(crate) fn open_store(path: &Utf8Path) -> Result<SqliteStore, CliError> {
    srd_fs::ensure_parent_dir(path).map_err(|source| CliError::CreateDatabaseDirectory {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SqliteStore::open(path.as_std_path())?)
}

pub(crate) fn write_json<T: Serialize + ?Sized>(
    writer: &mut dyn Write,
    value: &T,
) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
