//! Default registry rows for the public Open5e API.

use log::info;
use serde::Serialize;
use srd_core::{
    EntityType, FetchConfig, FieldRule, MappingProfile, RegistryStore, SourceConnection,
    SourceDefinition, SourceEntityFeed, SourceKind, StoreError,
};

use crate::export::collection_name;

/// Registry id of the Open5e source.
pub const OPEN5E_SOURCE_ID: &str = "open5e";
/// Root of the Open5e API.
pub const OPEN5E_BASE_URL: &str = "https://api.open5e.com/";

/// Entity types Open5e serves, with the API version of each endpoint.
const OPEN5E_FEEDS: &[(EntityType, &str)] = &[
    (EntityType::Monster, "v1"),
    (EntityType::Spell, "v2"),
    (EntityType::Class, "v1"),
    (EntityType::Race, "v1"),
    (EntityType::Background, "v2"),
    (EntityType::Feat, "v2"),
    (EntityType::MagicItem, "v1"),
    (EntityType::Weapon, "v2"),
    (EntityType::Armor, "v2"),
];

/// Rows inserted by [`ensure_open5e_registered`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    /// Sources added.
    pub sources_added: usize,
    /// Mapping profiles added.
    pub profiles_added: usize,
    /// Feeds added.
    pub feeds_added: usize,
}

impl BootstrapReport {
    /// Whether every row already existed.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.sources_added == 0 && self.profiles_added == 0 && self.feeds_added == 0
    }
}

/// Register the Open5e source with one auto-matching profile and one feed
/// per supported entity type.
///
/// Rows that already exist are left untouched, so edits made by an
/// administrator survive repeated bootstraps.
///
/// # Errors
/// Propagates [`StoreError`] from the registry.
pub fn ensure_open5e_registered<S: RegistryStore + ?Sized>(
    store: &S,
) -> Result<BootstrapReport, StoreError> {
    let mut report = BootstrapReport::default();

    if store.get_source(OPEN5E_SOURCE_ID)?.is_none() {
        store.upsert_source(&SourceDefinition::new(
            OPEN5E_SOURCE_ID,
            "Open5e",
            SourceKind::Http,
            SourceConnection::http(OPEN5E_BASE_URL),
        ))?;
        report.sources_added += 1;
    }

    for &(entity_type, version) in OPEN5E_FEEDS {
        let collection = collection_name(entity_type);
        let profile_id = format!("{OPEN5E_SOURCE_ID}_{collection}_default");
        if store.get_profile(&profile_id)?.is_none() {
            store.upsert_profile(&default_profile(&profile_id, entity_type))?;
            report.profiles_added += 1;
        }

        let feed_id = format!("{OPEN5E_SOURCE_ID}_{collection}");
        if store.get_feed(&feed_id)?.is_none() {
            store.upsert_feed(&SourceEntityFeed::new(
                feed_id,
                OPEN5E_SOURCE_ID,
                entity_type,
                profile_id,
                FetchConfig::new(format!("{version}/{collection}/?format=json")),
            ))?;
            report.feeds_added += 1;
        }
    }

    if !report.is_noop() {
        info!(
            "registered Open5e: {} sources, {} profiles, {} feeds added",
            report.sources_added, report.profiles_added, report.feeds_added
        );
    }
    Ok(report)
}

fn default_profile(id: &str, entity_type: EntityType) -> MappingProfile {
    MappingProfile::new(
        id,
        format!("Open5e {entity_type} (default)"),
        entity_type,
        vec![FieldRule::new("Id").from_sources(["slug", "key"]).required()],
    )
    .with_auto_match()
}
