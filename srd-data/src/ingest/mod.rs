//! Ingestion orchestrator: registry → reader → mapping → store.
//!
//! Sources and feeds run one after another. A feed whose configuration is
//! broken or whose reader fails is reported by name and abandoned while
//! the run moves on. Records that fail mapping are skipped and counted.
//! Only store failures abort the run; everything written before them
//! stays written.

mod report;


use std::error::Error;

use log::{debug, info, warn};
use srd_core::{EntityStore, RegistryStore, SourceDefinition, SourceEntityFeed, StoreError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::mapping::{CompiledProfile, MappingEngine};
use crate::source::{SourceError, SourceReader, SourceReaders};

pub use report::IngestionReport;

/// Failure that stopped an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Sources or feeds could not be listed.
    #[error("failed to read the source registry")]
    Registry(#[source] StoreError),
    /// The store rejected a read or write while a feed was running.
    #[error("store failure while ingesting feed '{feed_id}'")]
    Store {
        /// Feed being ingested.
        feed_id: String,
        /// Report of everything done before the failure.
        partial: Box<IngestionReport>,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    /// Progress made before the failure, when any was.
    #[must_use]
    pub fn partial(&self) -> Option<&IngestionReport> {
        match self {
            Self::Registry(_) => None,
            Self::Store { partial, .. } => Some(partial.as_ref()),
        }
    }
}

/// Runs feeds through the mapping engine into a store.
///
/// The store provides both the registry and the canonical entities.
pub struct IngestionService<'a, S: ?Sized> {
    store: &'a S,
    readers: SourceReaders,
    engine: MappingEngine,
}

impl<S: ?Sized> std::fmt::Debug for IngestionService<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionService")
            .field("readers", &self.readers)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl<'a, S> IngestionService<'a, S>
where
    S: EntityStore + RegistryStore + ?Sized,
{
    /// Ingest from `store`'s registry into `store` using `readers`.
    #[must_use]
    pub fn new(store: &'a S, readers: SourceReaders) -> Self {
        Self {
            store,
            readers,
            engine: MappingEngine::default(),
        }
    }

    /// Map records with `engine` instead of the default one.
    #[must_use]
    pub fn with_engine(mut self, engine: MappingEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Ingest every enabled feed of every enabled source.
    ///
    /// # Errors
    /// Returns [`IngestError`] when the registry cannot be listed or the
    /// store fails; the error carries the partial report.
    pub fn ingest_all_enabled_sources(
        &self,
        run_label: &str,
        cancel: &CancellationToken,
    ) -> Result<IngestionReport, IngestError> {
        let sources = self
            .store
            .list_sources(true)
            .map_err(IngestError::Registry)?;
        info!("ingestion run '{run_label}' covers {} sources", sources.len());

        let mut report = IngestionReport::new(run_label);
        for source in &sources {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            self.run_source(source, cancel, &mut report)?;
        }
        info!("{report}");
        Ok(report)
    }

    /// Ingest every enabled feed of one source, even if it is disabled.
    ///
    /// An unknown source id is reported as an error in the report.
    ///
    /// # Errors
    /// As for [`IngestionService::ingest_all_enabled_sources`].
    pub fn ingest_source(
        &self,
        source_id: &str,
        run_label: &str,
        cancel: &CancellationToken,
    ) -> Result<IngestionReport, IngestError> {
        let mut report = IngestionReport::new(run_label);
        match self
            .store
            .get_source(source_id)
            .map_err(IngestError::Registry)?
        {
            Some(source) => self.run_source(&source, cancel, &mut report)?,
            None => report
                .errors
                .push(format!("source '{source_id}' does not exist")),
        }
        info!("{report}");
        Ok(report)
    }

    /// Ingest one feed, even if it or its source is disabled.
    ///
    /// # Errors
    /// As for [`IngestionService::ingest_all_enabled_sources`].
    pub fn ingest_feed(
        &self,
        feed_id: &str,
        run_label: &str,
        cancel: &CancellationToken,
    ) -> Result<IngestionReport, IngestError> {
        let mut report = IngestionReport::new(run_label);
        let Some(feed) = self.store.get_feed(feed_id).map_err(IngestError::Registry)? else {
            report.errors.push(format!("feed '{feed_id}' does not exist"));
            return Ok(report);
        };
        let Some(source) = self
            .store
            .get_source(&feed.source_id)
            .map_err(IngestError::Registry)?
        else {
            report.errors.push(format!(
                "feed '{feed_id}': source '{}' does not exist",
                feed.source_id
            ));
            return Ok(report);
        };
        self.run_feed_into(&source, &feed, cancel, &mut report)?;
        info!("{report}");
        Ok(report)
    }

    fn run_source(
        &self,
        source: &SourceDefinition,
        cancel: &CancellationToken,
        report: &mut IngestionReport,
    ) -> Result<(), IngestError> {
        let feeds = self
            .store
            .list_feeds(&source.id, true)
            .map_err(IngestError::Registry)?;
        debug!("source '{}' has {} enabled feeds", source.id, feeds.len());
        for feed in &feeds {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            self.run_feed_into(source, feed, cancel, report)?;
        }
        Ok(())
    }

    fn run_feed_into(
        &self,
        source: &SourceDefinition,
        feed: &SourceEntityFeed,
        cancel: &CancellationToken,
        report: &mut IngestionReport,
    ) -> Result<(), IngestError> {
        let mut feed_report = IngestionReport::new(report.run_label.clone());
        let outcome = self.run_feed(source, feed, cancel, &mut feed_report);
        info!(
            "feed '{}': read {}, upserted {}, skipped {}",
            feed.id, feed_report.read, feed_report.upserted, feed_report.skipped
        );
        report.merge(feed_report);
        outcome.map_err(|err| IngestError::Store {
            feed_id: feed.id.clone(),
            partial: Box::new(report.clone()),
            source: err,
        })
    }

    fn run_feed(
        &self,
        source: &SourceDefinition,
        feed: &SourceEntityFeed,
        cancel: &CancellationToken,
        report: &mut IngestionReport,
    ) -> Result<(), StoreError> {
        let Some(profile) = self.compile_profile(feed, report)? else {
            return Ok(());
        };

        let stream = match self.readers.read(source, feed, cancel) {
            Ok(stream) => stream,
            Err(err) => {
                record_source_error(feed, &err, report);
                return Ok(());
            }
        };

        for (index, item) in stream.enumerate() {
            let record = match item {
                Ok(record) => record,
                Err(err) => {
                    record_source_error(feed, &err, report);
                    break;
                }
            };
            report.read += 1;
            let position = index + 1;
            let outcome = self.engine.map(&record, &profile);
            let prefix = format!("feed '{}' record {position}", feed.id);
            report
                .warnings
                .extend(outcome.warnings.iter().map(|msg| format!("{prefix}: {msg}")));

            match outcome.entity {
                Some(payload) if outcome.errors.is_empty() => {
                    let id = payload.id().trim().to_owned();
                    if id.is_empty() {
                        report.skipped += 1;
                        report.errors.push(format!("{prefix}: mapped entity has no id"));
                    } else {
                        let value = payload.to_value().map_err(|err| StoreError::Encode {
                            kind: feed.entity_type.to_string(),
                            id: id.clone(),
                            source: err,
                        })?;
                        self.store.upsert(feed.entity_type, &id, &value)?;
                        report.upserted += 1;
                    }
                }
                _ => {
                    report.skipped += 1;
                    report
                        .errors
                        .extend(outcome.errors.iter().map(|msg| format!("{prefix}: {msg}")));
                }
            }

            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
        }
        Ok(())
    }

    /// Load and compile the feed's profile, reporting configuration errors.
    fn compile_profile(
        &self,
        feed: &SourceEntityFeed,
        report: &mut IngestionReport,
    ) -> Result<Option<CompiledProfile>, StoreError> {
        let Some(profile) = self.store.get_profile(&feed.mapping_profile_id)? else {
            let message = format!(
                "feed '{}': mapping profile '{}' does not exist",
                feed.id, feed.mapping_profile_id
            );
            warn!("{message}");
            report.errors.push(message);
            return Ok(None);
        };
        let compiled = CompiledProfile::compile(&profile).and_then(|compiled| {
            compiled.ensure_feed_type(&feed.id, feed.entity_type)?;
            Ok(compiled)
        });
        match compiled {
            Ok(compiled) => Ok(Some(compiled)),
            Err(err) => {
                let message = format!("feed '{}': {err}", feed.id);
                warn!("{message}");
                report.errors.push(message);
                Ok(None)
            }
        }
    }
}

fn record_source_error(feed: &SourceEntityFeed, err: &SourceError, report: &mut IngestionReport) {
    if matches!(err, SourceError::Cancelled) {
        report.cancelled = true;
        return;
    }
    let message = format!("feed '{}': {}", feed.id, error_chain(err));
    warn!("{message}");
    if err.is_truncation() {
        report.warnings.push(message);
    } else {
        report.errors.push(message);
    }
}

/// `err` followed by each of its sources, separated by colons.
fn error_chain(err: &dyn Error) -> String {
    let mut text = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        cause = inner.source();
    }
    text
}
