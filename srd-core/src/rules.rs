//! Rules vocabulary with lenient parsing.
//!
//! External feeds spell the same concept in many ways ("str", "Strength",
//! "STRENGTH", "plant-like"). Each enum here carries an explicit alias table
//! which is consulted first; afterwards the input is compared against the
//! variant names case-insensitively, then once more after stripping spaces,
//! hyphens and underscores.
//!
//! # Examples
//! ```
//! use srd_core::{AbilityScore, LenientEnum, SizeCategory};
//!
//! assert_eq!(AbilityScore::parse_lenient("dex"), Some(AbilityScore::Dexterity));
//! assert_eq!(SizeCategory::parse_lenient("L"), Some(SizeCategory::Large));
//! assert_eq!(SizeCategory::parse_lenient("colossal"), None);
//! ```

use serde::{Deserialize, Serialize};

/// Lower-case `input` and drop spaces, hyphens and underscores.
///
/// ```
/// assert_eq!(srd_core::rules::normalise_token(" Hit_Points "), "hitpoints");
/// ```
#[must_use]
pub fn normalise_token(input: &str) -> String {
    input
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '-' | '_') && !ch.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Shared behaviour of enums that accept loosely formatted input.
pub trait LenientEnum: Sized + Copy + 'static {
    /// Every variant in declaration order.
    const VARIANTS: &'static [Self];
    /// Short codes and alternative spellings, keyed by lower-case text.
    const ALIASES: &'static [(&'static str, Self)];
    /// Value substituted by domain transforms when nothing matches.
    const FALLBACK: Option<Self>;

    /// Canonical variant name.
    fn name(self) -> &'static str;

    /// Resolve `input` using the alias table and then the variant names.
    fn parse_lenient(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        let lowered = trimmed.to_lowercase();
        if let Some((_, value)) = Self::ALIASES.iter().find(|(alias, _)| *alias == lowered) {
            return Some(*value);
        }
        if let Some(value) = Self::VARIANTS
            .iter()
            .find(|variant| variant.name().eq_ignore_ascii_case(trimmed))
        {
            return Some(*value);
        }
        let stripped = normalise_token(trimmed);
        Self::VARIANTS
            .iter()
            .find(|variant| variant.name().eq_ignore_ascii_case(&stripped))
            .copied()
    }
}

macro_rules! lenient_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$variant_meta:meta])* $variant:ident,)+
        }
        aliases: [$(($alias:literal, $target:ident)),* $(,)?],
        fallback: $fallback:expr,
        default: $default:ident $(,)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String")]
        pub enum $name {
            $($(#[$variant_meta])* $variant,)+
        }

        impl LenientEnum for $name {
            const VARIANTS: &'static [Self] = &[$(Self::$variant,)+];
            const ALIASES: &'static [(&'static str, Self)] = &[$(($alias, Self::$target),)*];
            const FALLBACK: Option<Self> = $fallback;

            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse_lenient(s)
                    .ok_or_else(|| format!(concat!("unknown ", stringify!($name), " '{}'"), s))
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

lenient_enum! {
    /// The six ability scores.
    AbilityScore {
        /// Strength.
        Strength,
        /// Dexterity.
        Dexterity,
        /// Constitution.
        Constitution,
        /// Intelligence.
        Intelligence,
        /// Wisdom.
        Wisdom,
        /// Charisma.
        Charisma,
    }
    aliases: [
        ("str", Strength),
        ("dex", Dexterity),
        ("con", Constitution),
        ("int", Intelligence),
        ("wis", Wisdom),
        ("cha", Charisma),
    ],
    fallback: None,
    default: Strength,
}

lenient_enum! {
    /// Creature size categories.
    SizeCategory {
        /// Tiny.
        Tiny,
        /// Small.
        Small,
        /// Medium.
        Medium,
        /// Large.
        Large,
        /// Huge.
        Huge,
        /// Gargantuan.
        Gargantuan,
    }
    aliases: [
        ("t", Tiny),
        ("s", Small),
        ("m", Medium),
        ("l", Large),
        ("h", Huge),
        ("g", Gargantuan),
    ],
    fallback: Some(SizeCategory::Medium),
    default: Medium,
}

lenient_enum! {
    /// Broad creature categories.
    CreatureType {
        /// Humanoid.
        Humanoid,
        /// Beast.
        Beast,
        /// Fiend.
        Fiend,
        /// Undead.
        Undead,
        /// Dragon.
        Dragon,
        /// Aberration.
        Aberration,
        /// Construct.
        Construct,
        /// Elemental.
        Elemental,
        /// Fey.
        Fey,
        /// Giant.
        Giant,
        /// Monstrosity.
        Monstrosity,
        /// Ooze.
        Ooze,
        /// Plant.
        Plant,
        /// Celestial.
        Celestial,
        /// Anything the feed names that is not listed above.
        Other,
    }
    aliases: [],
    fallback: Some(CreatureType::Other),
    default: Humanoid,
}

lenient_enum! {
    /// Damage categories.
    DamageType {
        /// Slashing.
        Slashing,
        /// Piercing.
        Piercing,
        /// Bludgeoning.
        Bludgeoning,
        /// Fire.
        Fire,
        /// Cold.
        Cold,
        /// Lightning.
        Lightning,
        /// Force.
        Force,
        /// Poison.
        Poison,
        /// Acid.
        Acid,
        /// Psychic.
        Psychic,
        /// Radiant.
        Radiant,
        /// Necrotic.
        Necrotic,
        /// Thunder.
        Thunder,
    }
    aliases: [],
    fallback: Some(DamageType::Force),
    default: Force,
}
