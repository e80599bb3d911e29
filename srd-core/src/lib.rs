//! Core domain types for the SRD content engine.
//!
//! The crate owns the canonical entity model (one typed payload per
//! [`EntityType`]), the registry records that describe where content comes
//! from and how it is mapped, the per-type field schema the mapping engine
//! resolves targets against, and the storage contracts shared by the server
//! and client caches.
//!
//! Adapters that perform I/O beyond the bundled SQLite store live in
//! `srd-data`.
#![forbid(unsafe_code)]

mod clock;
mod dice;
mod entity;
pub mod payload;
mod rating;
pub mod registry;
pub mod rules;
pub mod schema;
pub mod store;

#[doc(hidden)]
pub mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dice::{DiceExpression, DiceParseError};
pub use entity::{EntityEnvelope, EntityType, UnknownEntityType};
pub use payload::Payload;
pub use rating::ChallengeRating;
pub use registry::{
    FetchConfig, FieldRule, MappingProfile, RegistryStore, SourceConnection, SourceDefinition,
    SourceEntityFeed, SourceKind, Transform,
};
pub use rules::{AbilityScore, CreatureType, DamageType, LenientEnum, SizeCategory};
pub use store::{
    DEFAULT_PAGE_SIZE, EntityStore, MAX_PAGE_SIZE, Manifest, PageRequest, StoreError, SyncQuery,
};

#[cfg(feature = "store-sqlite")]
pub use store::SqliteStore;
