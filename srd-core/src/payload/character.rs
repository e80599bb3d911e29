//! Character-building content: classes, races, backgrounds, feats, skills
//! and languages.

use serde::{Deserialize, Serialize};

use crate::{AbilityScore, SizeCategory};

/// A character class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Class {
    pub id: String,
    pub name: String,
    /// Faces on the class hit die.
    pub hit_die: i64,
    pub primary_abilities: Vec<AbilityScore>,
    pub saving_throws: Vec<AbilityScore>,
    pub armor_proficiencies: Vec<String>,
    pub weapon_proficiencies: Vec<String>,
    pub tool_proficiencies: Vec<String>,
    pub tags: Vec<String>,
}

/// A playable race.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Race {
    pub id: String,
    pub name: String,
    pub size: SizeCategory,
    pub speed_feet: i64,
    pub description: String,
}

/// A character background.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Background {
    pub id: String,
    pub name: String,
    pub description: String,
    pub skill_proficiencies: Vec<String>,
    pub starting_equipment: Vec<String>,
    pub feature_effect_ids: Vec<String>,
    pub tags: Vec<String>,
}

/// A feat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feat {
    pub id: String,
    pub name: String,
    pub prerequisites: String,
    pub description: String,
    pub effect_ids: Vec<String>,
    pub tags: Vec<String>,
}

/// A skill and the ability it keys off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub ability: AbilityScore,
    pub description: String,
}

impl Default for Skill {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            ability: AbilityScore::Wisdom,
            description: String::new(),
        }
    }
}

/// A language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Language {
    pub id: String,
    pub name: String,
    pub standard: bool,
    pub script: String,
    pub typical_speakers: String,
    pub description: String,
}
