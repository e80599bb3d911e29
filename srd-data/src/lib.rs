//! Ingestion, mapping and sync adapters for the SRD content engine.
//!
//! Responsibilities:
//! - Read raw records from JSON files and paginated HTTP APIs.
//! - Map raw records onto canonical payloads with data-driven profiles.
//! - Orchestrate ingestion runs and accumulate their reports.
//! - Pull catalogue changes from a remote server into a local store.
//!
//! Boundaries:
//! - Do not encode payload schemas or storage rules (live in `srd-core`).
//! - Keep blocking I/O off async executors; HTTP calls bridge onto an owned
//!   Tokio runtime.
//!
//! Invariants:
//! - No global mutable state; components receive their configuration at
//!   construction.
//! - Cancellation is observed between HTTP requests and between records.
#![forbid(unsafe_code)]

pub mod bootstrap;
pub mod export;
pub mod http;
pub mod ingest;
pub mod mapping;
pub mod source;
pub mod sync;
pub mod upload;

#[doc(hidden)]
pub mod test_support;

pub use bootstrap::{BootstrapReport, OPEN5E_BASE_URL, OPEN5E_SOURCE_ID, ensure_open5e_registered};
pub use export::{ExportError, ExportSummary, collection_name, export_catalog};
pub use http::{
    DEFAULT_USER_AGENT, HttpBuildError, HttpConfig, HttpTransport, JsonFetcher, TransportError,
};
pub use ingest::{IngestError, IngestionReport, IngestionService};
pub use mapping::{CompiledProfile, MappingEngine, MappingOutcome, ProfileError, SynonymTable};
pub use source::{
    FileSourceReader, HttpSourceReader, RecordStream, SourceError, SourceReader, SourceReaders,
};
pub use sync::{
    HttpRemoteCatalog, RemoteCatalog, StoreCatalog, SyncClient, SyncConfig, SyncError, SyncReport,
};
pub use tokio_util::sync::CancellationToken;
pub use upload::{UploadError, upload_entities};
