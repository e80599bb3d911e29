//! Mundane equipment, weapons and armour.

use serde::{Deserialize, Serialize};

use crate::DamageType;

/// Fields shared by every piece of equipment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Equipment {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Price expressed in copper pieces.
    pub cost_copper: i64,
    pub weight_pounds: f64,
    pub description: String,
    pub tags: Vec<String>,
}

/// A weapon; shares the equipment fields at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weapon {
    #[serde(flatten)]
    pub item: Equipment,
    pub weapon_category: String,
    pub damage_dice: String,
    pub damage_type: DamageType,
    pub range_normal_feet: i64,
    pub range_max_feet: i64,
    pub properties: Vec<String>,
}

impl Default for Weapon {
    fn default() -> Self {
        Self {
            item: Equipment::default(),
            weapon_category: String::new(),
            damage_dice: "1d6".to_owned(),
            damage_type: DamageType::Slashing,
            range_normal_feet: 0,
            range_max_feet: 0,
            properties: Vec::new(),
        }
    }
}

/// Armour; shares the equipment fields at the top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Armor {
    #[serde(flatten)]
    pub item: Equipment,
    pub armor_category: String,
    pub armor_class_base: i64,
    pub adds_dexterity_modifier: bool,
    pub max_dexterity_bonus: Option<i64>,
    pub strength_requirement: i64,
    pub stealth_disadvantage: bool,
}
