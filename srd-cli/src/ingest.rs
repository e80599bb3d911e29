//! `ingest` command: run registered feeds into the catalogue.

use std::io::Write;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use srd_data::{
    CancellationToken, HttpConfig, IngestionReport, IngestionService, SourceReaders,
    ensure_open5e_registered,
};
use tracing::info;

use crate::{
    ARG_DATABASE, ARG_ENSURE_OPEN5E, ARG_FEED, ARG_LABEL, ARG_SOURCE, ARG_TIMEOUT, CliError,
    DEFAULT_TIMEOUT, ENV_INGEST_DATABASE, open_store, write_json,
};

/// Run label used when `--label` is not given.
pub(crate) const DEFAULT_RUN_LABEL: &str = "cli";

/// CLI arguments for the `ingest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "ingest",
    long_about = "Read every enabled feed of every enabled source, map the \
                 records through their profiles and upsert them into the \
                 catalogue. Narrow the run with --source or --feed. The run \
                 report is printed as JSON and the command fails when it \
                 lists any errors.",
    about = "Ingest registered feeds into the catalogue"
)]
#[ortho_config(prefix = "SRD")]
pub(crate) struct IngestArgs {
    /// Path to the SQLite catalogue.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Label recorded in the run report.
    #[arg(long = ARG_LABEL, value_name = "label")]
    #[serde(default)]
    pub(crate) label: Option<String>,
    /// Only ingest the feeds of this source, even when it is disabled.
    #[arg(long = ARG_SOURCE, value_name = "id", conflicts_with = "feed")]
    #[serde(default)]
    pub(crate) source: Option<String>,
    /// Only ingest this feed, even when it is disabled.
    #[arg(long = ARG_FEED, value_name = "id")]
    #[serde(default)]
    pub(crate) feed: Option<String>,
    /// Register the default Open5e source first if it is missing.
    #[arg(long = ARG_ENSURE_OPEN5E)]
    #[serde(default)]
    pub(crate) ensure_open5e: bool,
    /// HTTP request timeout in seconds.
    #[arg(long = ARG_TIMEOUT, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

impl IngestArgs {
    pub(crate) fn into_config(self) -> Result<IngestConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        IngestConfig::try_from(merged)
    }
}

/// Which part of the registry an ingestion run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IngestScope {
    AllEnabled,
    Source(String),
    Feed(String),
}

/// Resolved `ingest` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IngestConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) label: String,
    pub(crate) scope: IngestScope,
    pub(crate) ensure_open5e: bool,
    pub(crate) timeout: Duration,
}

impl TryFrom<IngestArgs> for IngestConfig {
    type Error = CliError;

    fn try_from(args: IngestArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_INGEST_DATABASE,
        })?;
        let scope = match (args.source, args.feed) {
            (_, Some(feed)) => IngestScope::Feed(feed),
            (Some(source), None) => IngestScope::Source(source),
            (None, None) => IngestScope::AllEnabled,
        };
        Ok(Self {
            database,
            label: args
                .label
                .filter(|label| !label.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_RUN_LABEL.to_owned()),
            scope,
            ensure_open5e: args.ensure_open5e,
            timeout: args.timeout_secs.map_or(DEFAULT_TIMEOUT, Duration::from_secs),
        })
    }
}

/// Builds the source readers for one ingestion run.
pub(crate) trait ReaderFactory {
    fn build(&self, config: &IngestConfig) -> Result<SourceReaders, CliError>;
}

/// Reads HTTP sources through a real transport.
pub(crate) struct TransportReaderFactory;

impl ReaderFactory for TransportReaderFactory {
    fn build(&self, config: &IngestConfig) -> Result<SourceReaders, CliError> {
        Ok(SourceReaders::with_transport(
            HttpConfig::default().with_timeout(config.timeout),
        )?)
    }
}

pub(crate) fn run_ingest(
    args: IngestArgs,
    readers: &dyn ReaderFactory,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    run_ingest_with(&config, readers, writer)
}

pub(crate) fn run_ingest_with(
    config: &IngestConfig,
    readers: &dyn ReaderFactory,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let report = match execute_ingest(config, readers) {
        Ok(report) => report,
        Err(CliError::Ingest(err)) => {
            // Writes made before the failure stay committed; show their counts.
            if let Some(partial) = err.partial() {
                write_json(writer, partial)?;
            }
            return Err(CliError::Ingest(err));
        }
        Err(err) => return Err(err),
    };
    write_json(writer, &report)?;
    if report.has_errors() {
        return Err(CliError::IngestionReportedErrors {
            label: report.run_label,
            errors: report.errors.len(),
        });
    }
    Ok(())
}

fn execute_ingest(
    config: &IngestConfig,
    readers: &dyn ReaderFactory,
) -> Result<IngestionReport, CliError> {
    let store = open_store(&config.database)?;
    if config.ensure_open5e {
        let added = ensure_open5e_registered(&store)?;
        if !added.is_noop() {
            info!(
                sources = added.sources_added,
                profiles = added.profiles_added,
                feeds = added.feeds_added,
                "registered the Open5e defaults"
            );
        }
    }

    let service = IngestionService::new(&store, readers.build(config)?);
    let cancel = CancellationToken::new();
    let report = match &config.scope {
        IngestScope::AllEnabled => service.ingest_all_enabled_sources(&config.label, &cancel),
        IngestScope::Source(source_id) => service.ingest_source(source_id, &config.label, &cancel),
        IngestScope::Feed(feed_id) => service.ingest_feed(feed_id, &config.label, &cancel),
    }?;
    Ok(report)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<IngestConfig, CliError> {
    let merged = IngestArgs::merge_from_layers(layers).map_err(CliError::from)?;
    IngestConfig::try_from(merged)
}
