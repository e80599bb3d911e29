//! Canonical entity kinds and the generic envelope used for storage and sync.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::Payload;

/// Kinds of canonical content the engine understands.
///
/// # Examples
/// ```
/// use srd_core::EntityType;
///
/// assert_eq!(EntityType::MagicItem.as_str(), "MagicItem");
/// assert_eq!("magic-item".parse::<EntityType>(), Ok(EntityType::MagicItem));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum EntityType {
    /// Character classes.
    Class,
    /// Playable races.
    Race,
    /// Character backgrounds.
    Background,
    /// Feats.
    Feat,
    /// Skills.
    Skill,
    /// Languages.
    Language,
    /// Spells.
    Spell,
    /// Monster stat blocks.
    Monster,
    /// Magic items.
    MagicItem,
    /// Mundane equipment.
    Equipment,
    /// Weapons.
    Weapon,
    /// Armour.
    Armor,
    /// Reusable rules effects.
    Effect,
}

/// Error returned when a string does not name an [`EntityType`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown entity type '{0}'")]
pub struct UnknownEntityType(pub String);

impl EntityType {
    /// Every entity type, in the order sync and export walk them.
    pub const ALL: [Self; 13] = [
        Self::Class,
        Self::Race,
        Self::Background,
        Self::Feat,
        Self::Skill,
        Self::Language,
        Self::Spell,
        Self::Monster,
        Self::MagicItem,
        Self::Equipment,
        Self::Weapon,
        Self::Armor,
        Self::Effect,
    ];

    /// Return the canonical name used on the wire and in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Class => "Class",
            Self::Race => "Race",
            Self::Background => "Background",
            Self::Feat => "Feat",
            Self::Skill => "Skill",
            Self::Language => "Language",
            Self::Spell => "Spell",
            Self::Monster => "Monster",
            Self::MagicItem => "MagicItem",
            Self::Equipment => "Equipment",
            Self::Weapon => "Weapon",
            Self::Armor => "Armor",
            Self::Effect => "Effect",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = crate::rules::normalise_token(s);
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| UnknownEntityType(s.to_owned()))
    }
}

impl TryFrom<String> for EntityType {
    type Error = UnknownEntityType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A stored canonical entity together with its key and write timestamp.
///
/// The payload stays as raw JSON so stores and the sync protocol never need
/// to understand the per-type schema; [`EntityEnvelope::decode`] recovers the
/// typed form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityEnvelope {
    /// Partition the entity belongs to.
    pub entity_type: EntityType,
    /// Stable natural key from the source.
    pub id: String,
    /// Schema-specific payload.
    pub payload: Value,
    /// Server-assigned time of the last write.
    pub updated_at: DateTime<Utc>,
}

impl EntityEnvelope {
    /// Decode the payload into its typed representation.
    ///
    /// # Errors
    /// Returns the `serde_json` error when the payload does not match the
    /// schema for [`EntityEnvelope::entity_type`].
    pub fn decode(&self) -> Result<Payload, serde_json::Error> {
        Payload::from_value(self.entity_type, self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Monster", EntityType::Monster)]
    #[case("monster", EntityType::Monster)]
    #[case("MAGICITEM", EntityType::MagicItem)]
    #[case("magic_item", EntityType::MagicItem)]
    #[case("Magic Item", EntityType::MagicItem)]
    fn parses_entity_type_leniently(#[case] input: &str, #[case] expected: EntityType) {
        assert_eq!(input.parse::<EntityType>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_entity_type() {
        let err = "dragonhoard".parse::<EntityType>().expect_err("unknown type");
        assert_eq!(err.to_string(), "unknown entity type 'dragonhoard'");
    }

    #[rstest]
    fn display_round_trips_through_parse() {
        for kind in EntityType::ALL {
            assert_eq!(kind.to_string().parse::<EntityType>(), Ok(kind));
        }
    }

    #[rstest]
    fn envelope_uses_camel_case_wire_names() {
        let envelope = EntityEnvelope {
            entity_type: EntityType::Spell,
            id: "fireball".into(),
            payload: serde_json::json!({"id": "fireball"}),
            updated_at: DateTime::from_timestamp(0, 0).expect("epoch"),
        };
        let json = serde_json::to_value(&envelope).expect("serialise envelope");
        assert_eq!(json["entityType"], "Spell");
        assert_eq!(json["updatedAt"], "1970-01-01T00:00:00Z");
    }
}
