//! JSON export of a catalogue, one file per entity type.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use serde::Serialize;
use serde_json::Value;
use srd_core::{EntityStore, EntityType, StoreError};
use thiserror::Error;

/// Failure while exporting a catalogue.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Entities could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The output directory could not be created.
    #[error("failed to create export directory {path}")]
    Directory {
        /// Directory being created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// An export file could not be written.
    #[error("failed to write {path}")]
    Write {
        /// File being written.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Payloads could not be rendered as JSON.
    #[error("failed to encode {entity_type} entities")]
    Encode {
        /// Entity type being exported.
        entity_type: EntityType,
        /// Encoding failure.
        #[source]
        source: serde_json::Error,
    },
}

/// What [`export_catalog`] wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Directory holding the files.
    pub directory: Utf8PathBuf,
    /// Entities written per type; every type is listed.
    pub counts: BTreeMap<EntityType, usize>,
}

/// Lower-case plural name used for files and feeds of `entity_type`.
#[must_use]
pub const fn collection_name(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Class => "classes",
        EntityType::Race => "races",
        EntityType::Background => "backgrounds",
        EntityType::Feat => "feats",
        EntityType::Skill => "skills",
        EntityType::Language => "languages",
        EntityType::Spell => "spells",
        EntityType::Monster => "monsters",
        EntityType::MagicItem => "magicitems",
        EntityType::Equipment => "equipment",
        EntityType::Weapon => "weapons",
        EntityType::Armor => "armor",
        EntityType::Effect => "effects",
    }
}

/// Write every entity of `store` into `directory` as `<collection>.json`.
///
/// Each file holds a pretty-printed array of payloads ordered by id. Types
/// with no entities still get a file holding `[]`. Existing files are
/// replaced.
///
/// # Errors
/// Returns [`ExportError`] when reading the store or writing a file fails.
pub fn export_catalog<S: EntityStore + ?Sized>(
    store: &S,
    directory: &Utf8Path,
) -> Result<ExportSummary, ExportError> {
    srd_fs::ensure_dir(directory).map_err(|err| ExportError::Directory {
        path: directory.to_path_buf(),
        source: err,
    })?;

    let mut counts = BTreeMap::new();
    for entity_type in EntityType::ALL {
        let payloads: Vec<Value> = store
            .get_all(entity_type)?
            .into_iter()
            .map(|entity| entity.payload)
            .collect();
        let text = serde_json::to_string_pretty(&payloads).map_err(|err| ExportError::Encode {
            entity_type,
            source: err,
        })?;
        let path = directory.join(format!("{}.json", collection_name(entity_type)));
        srd_fs::write_utf8(&path, &text).map_err(|err| ExportError::Write {
            path: path.clone(),
            source: err,
        })?;
        counts.insert(entity_type, payloads.len());
    }

    let total: usize = counts.values().sum();
    info!("exported {total} entities to {directory}");
    Ok(ExportSummary {
        directory: directory.to_path_buf(),
        counts,
    })
}
