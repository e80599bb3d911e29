//! Facade crate for the SRD content engine.
//!
//! This crate re-exports the canonical entity model, registry records and
//! store contracts, and exposes the SQLite store and the ingestion, mapping
//! and sync adapters behind feature flags.

#![forbid(unsafe_code)]

pub use srd_core::{
    AbilityScore, ChallengeRating, Clock, CreatureType, DamageType, DiceExpression, EntityEnvelope,
    EntityStore, EntityType, FetchConfig, FieldRule, LenientEnum, Manifest, MappingProfile,
    PageRequest, Payload, RegistryStore, SizeCategory, SourceConnection, SourceDefinition,
    SourceEntityFeed, SourceKind, StoreError, SyncQuery, SystemClock, Transform, payload, schema,
};

#[cfg(feature = "store-sqlite")]
pub use srd_core::SqliteStore;

/// Mapping engine, source readers, ingestion, sync and export.
#[cfg(feature = "data")]
pub use srd_data as data;

#[cfg(feature = "data")]
pub use srd_data::{
    CancellationToken, IngestionReport, IngestionService, MappingEngine, MappingOutcome,
    SyncClient, SyncReport,
};
