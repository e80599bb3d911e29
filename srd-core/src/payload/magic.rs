//! Spells, magic items and reusable rules effects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AbilityScore, DamageType};

/// One damage roll produced by a spell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpellDamage {
    pub dice: String,
    pub damage_type: DamageType,
}

impl Default for SpellDamage {
    fn default() -> Self {
        Self {
            dice: "1d6".to_owned(),
            damage_type: DamageType::Force,
        }
    }
}

/// A spell definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spell {
    pub id: String,
    pub name: String,
    /// Spell level; cantrips are level zero.
    pub level: i64,
    pub school: String,
    pub action_type: String,
    pub range_type: String,
    pub range_feet: i64,
    pub target_shape: String,
    pub area_radius_feet: i64,
    pub area_length_feet: i64,
    pub area_width_feet: i64,
    pub components: Vec<String>,
    pub ritual: bool,
    pub concentration: bool,
    pub duration: String,
    pub casting_time: String,
    pub save_ability: Option<AbilityScore>,
    pub half_on_save: bool,
    pub damage: Vec<SpellDamage>,
    pub rules_text: String,
    /// Identifiers of the classes that can learn the spell.
    pub classes: Vec<String>,
    pub tags: Vec<String>,
}

/// A magic item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagicItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub rarity: String,
    pub requires_attunement: bool,
    pub attunement_requirement: String,
    pub effect_ids: Vec<String>,
    pub rules_text: String,
    pub tags: Vec<String>,
}

/// A reusable rules effect.
///
/// Components are kept as raw JSON because effects embed heterogeneous
/// structures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Effect {
    pub id: String,
    pub name: String,
    pub source: String,
    pub trigger: String,
    pub target_scope: String,
    pub description: String,
    pub components: Vec<Value>,
}
