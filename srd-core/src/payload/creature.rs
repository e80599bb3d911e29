//! Monster stat blocks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ChallengeRating, CreatureType, SizeCategory};

/// Movement speeds in feet per round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Speed {
    pub walk: i64,
    pub fly: i64,
    pub swim: i64,
    pub climb: i64,
    pub burrow: i64,
}

/// A monster stat block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monster {
    /// Stable natural key, usually the source slug.
    pub id: String,
    pub name: String,
    pub size: SizeCategory,
    #[serde(rename = "type")]
    pub creature_type: CreatureType,
    pub alignment: String,
    pub armor_class: i64,
    pub armor_notes: String,
    #[serde(alias = "hit_points_average")]
    pub hit_points: i64,
    /// Normalised dice expression, for example `2d6+2`.
    pub hit_dice: String,
    pub speed: Speed,
    pub strength: i64,
    pub dexterity: i64,
    pub constitution: i64,
    pub intelligence: i64,
    pub wisdom: i64,
    pub charisma: i64,
    /// Saving throw bonuses keyed by ability name.
    pub saving_throws: BTreeMap<String, i64>,
    /// Skill bonuses keyed by skill name.
    pub skills: BTreeMap<String, i64>,
    pub senses: String,
    pub passive_perception: i64,
    pub languages: String,
    pub challenge_rating: ChallengeRating,
    pub damage_vulnerabilities: Vec<String>,
    pub damage_resistances: Vec<String>,
    pub damage_immunities: Vec<String>,
    pub condition_immunities: Vec<String>,
    /// Markdown blocks copied from the source.
    pub traits: String,
    pub actions: String,
    pub reactions: String,
    pub legendary_actions: String,
    pub tags: Vec<String>,
}
