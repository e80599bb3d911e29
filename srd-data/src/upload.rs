//! Bulk replace-or-insert of typed payloads.

use log::info;
use srd_core::{EntityStore, EntityType, Payload, StoreError};
use thiserror::Error;

/// Reasons an upload batch is rejected.
#[derive(Debug, Error)]
pub enum UploadError {
    /// A payload belongs to a different entity type than the batch.
    #[error("payload {index} is a {found}, expected {expected}")]
    WrongType {
        /// Position in the batch.
        index: usize,
        /// Entity type of the batch.
        expected: EntityType,
        /// Entity type of the payload.
        found: EntityType,
    },
    /// A payload has an empty id.
    #[error("payload {index} has no id")]
    MissingId {
        /// Position in the batch.
        index: usize,
    },
    /// A payload could not be rendered as JSON.
    #[error("failed to encode payload {index}")]
    Encode {
        /// Position in the batch.
        index: usize,
        /// Encoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// The store rejected a write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Replace or insert every payload in `payloads` as `entity_type`.
///
/// The batch is validated and encoded before the first write, so a malformed
/// payload leaves the store untouched. A store failure part-way through
/// leaves the earlier payloads written.
///
/// # Errors
/// Returns [`UploadError`] for the first invalid payload or failed write.
pub fn upload_entities<S: EntityStore + ?Sized>(
    store: &S,
    entity_type: EntityType,
    payloads: &[Payload],
) -> Result<usize, UploadError> {
    let mut encoded = Vec::with_capacity(payloads.len());
    for (index, payload) in payloads.iter().enumerate() {
        let found = payload.entity_type();
        if found != entity_type {
            return Err(UploadError::WrongType {
                index,
                expected: entity_type,
                found,
            });
        }
        let id = payload.id().trim();
        if id.is_empty() {
            return Err(UploadError::MissingId { index });
        }
        let value = payload
            .to_value()
            .map_err(|source| UploadError::Encode { index, source })?;
        encoded.push((id.to_owned(), value));
    }

    for (id, value) in &encoded {
        store.upsert(entity_type, id, value)?;
    }
    info!("uploaded {} {entity_type} entities", encoded.len());
    Ok(encoded.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use srd_core::test_support::MemoryStore;

    fn monster(id: &str, hit_points: i64) -> Payload {
        Payload::from_value(
            EntityType::Monster,
            json!({"id": id, "name": id, "hit_points": hit_points}),
        )
        .expect("valid monster")
    }

    #[rstest]
    fn uploads_replace_existing_entities() {
        let store = MemoryStore::default();
        upload_entities(&store, EntityType::Monster, &[monster("goblin", 7)]).expect("first");

        let written = upload_entities(
            &store,
            EntityType::Monster,
            &[monster("goblin", 12), monster("orc", 15)],
        )
        .expect("second");

        assert_eq!(written, 2);
        let all = store.get_all(EntityType::Monster).expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "goblin");
        assert_eq!(all[0].payload["hit_points"], 12);
    }

    #[rstest]
    fn mixed_batches_write_nothing() {
        let store = MemoryStore::default();
        let spell = Payload::from_value(EntityType::Spell, json!({"id": "light"}))
            .expect("valid spell");

        let err = upload_entities(&store, EntityType::Monster, &[monster("goblin", 7), spell])
            .expect_err("a spell is not a monster");

        assert!(matches!(
            err,
            UploadError::WrongType {
                index: 1,
                expected: EntityType::Monster,
                found: EntityType::Spell,
            }
        ));
        assert_eq!(store.count(EntityType::Monster).expect("count"), 0);
    }

    #[rstest]
    fn blank_ids_are_rejected() {
        let store = MemoryStore::default();
        let err = upload_entities(&store, EntityType::Monster, &[monster("  ", 7)])
            .expect_err("blank id");
        assert_eq!(err.to_string(), "payload 0 has no id");
    }
}
