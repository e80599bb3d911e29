//! Error types emitted by the SRD CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use srd_core::StoreError;
use srd_data::{ExportError, HttpBuildError, IngestError, SyncError};
use thiserror::Error;

/// Errors emitted by the SRD CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A timestamp option is not RFC 3339.
    #[error("{field} value {value:?} is not an RFC 3339 timestamp: {source}")]
    InvalidTimestamp {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// The global log subscriber could not be installed.
    #[error("failed to initialise logging: {0}")]
    Logging(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The directory for the catalogue database could not be created.
    #[error("failed to create directory for {path:?}: {source}")]
    CreateDatabaseDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The catalogue database failed.
    #[error("catalogue error: {0}")]
    Store(#[from] StoreError),
    /// The HTTP transport could not be built.
    #[error(transparent)]
    BuildTransport(#[from] HttpBuildError),
    /// An ingestion run aborted.
    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),
    /// An ingestion run finished but reported errors.
    #[error("ingestion run '{label}' finished with {errors} errors")]
    IngestionReportedErrors { label: String, errors: usize },
    /// A sync run failed; the marker was not advanced.
    #[error("sync failed: {0}")]
    Sync(#[from] SyncError),
    /// The sync marker file could not be read.
    #[error("failed to read marker file {path:?}: {source}")]
    ReadMarker {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The sync marker file holds something other than a timestamp.
    #[error("marker file {path:?} does not hold an RFC 3339 timestamp: {source}")]
    InvalidMarker {
        path: Utf8PathBuf,
        #[source]
        source: chrono::ParseError,
    },
    /// The sync marker file could not be written.
    #[error("failed to write marker file {path:?}: {source}")]
    WriteMarker {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Exporting the catalogue failed.
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
    /// Serialising command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
