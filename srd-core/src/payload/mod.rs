//! Typed payloads for every [`EntityType`].
//!
//! Every struct defaults each field, so a partially mapped record still
//! deserialises with zero values for whatever the feed did not provide.

mod character;
mod creature;
mod item;
mod magic;

use serde::Serialize;
use serde_json::Value;

use crate::EntityType;

pub use character::{Background, Class, Feat, Language, Race, Skill};
pub use creature::{Monster, Speed};
pub use item::{Armor, Equipment, Weapon};
pub use magic::{Effect, MagicItem, Spell, SpellDamage};

macro_rules! payloads {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        /// A canonical entity payload tagged with its kind.
        ///
        /// # Examples
        /// ```
        /// use serde_json::json;
        /// use srd_core::{EntityType, Payload};
        ///
        /// let payload = Payload::from_value(
        ///     EntityType::Monster,
        ///     json!({"id": "goblin", "hit_points": 7, "challenge_rating": "1/4"}),
        /// )?;
        /// assert_eq!(payload.id(), "goblin");
        /// assert_eq!(payload.entity_type(), EntityType::Monster);
        /// # Ok::<(), serde_json::Error>(())
        /// ```
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(untagged)]
        pub enum Payload {
            $(
                #[doc = concat!("A [`", stringify!($ty), "`] payload.")]
                $variant($ty),
            )+
        }

        impl Payload {
            /// Deserialise `value` using the schema for `entity_type`.
            ///
            /// # Errors
            /// Returns the `serde_json` error when `value` does not fit the
            /// payload type.
            pub fn from_value(entity_type: EntityType, value: Value) -> Result<Self, serde_json::Error> {
                match entity_type {
                    $(EntityType::$variant => serde_json::from_value(value).map(Self::$variant),)+
                }
            }

            /// Kind of entity carried by the payload.
            #[must_use]
            pub const fn entity_type(&self) -> EntityType {
                match self {
                    $(Self::$variant(_) => EntityType::$variant,)+
                }
            }

            /// A zero-valued payload for `entity_type`.
            #[must_use]
            pub fn empty(entity_type: EntityType) -> Self {
                match entity_type {
                    $(EntityType::$variant => Self::$variant(<$ty>::default()),)+
                }
            }
        }

        $(
            impl From<$ty> for Payload {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };
}

payloads! {
    Class => Class,
    Race => Race,
    Background => Background,
    Feat => Feat,
    Skill => Skill,
    Language => Language,
    Spell => Spell,
    Monster => Monster,
    MagicItem => MagicItem,
    Equipment => Equipment,
    Weapon => Weapon,
    Armor => Armor,
    Effect => Effect,
}

impl Payload {
    /// Natural key of the entity.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Class(value) => &value.id,
            Self::Race(value) => &value.id,
            Self::Background(value) => &value.id,
            Self::Feat(value) => &value.id,
            Self::Skill(value) => &value.id,
            Self::Language(value) => &value.id,
            Self::Spell(value) => &value.id,
            Self::Monster(value) => &value.id,
            Self::MagicItem(value) => &value.id,
            Self::Equipment(value) => &value.id,
            Self::Weapon(value) => &value.item.id,
            Self::Armor(value) => &value.item.id,
            Self::Effect(value) => &value.id,
        }
    }

    /// Serialise the payload to raw JSON for storage.
    ///
    /// # Errors
    /// Propagates `serde_json` failures, which only occur for non-string map
    /// keys and therefore never for the built-in payload types.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
