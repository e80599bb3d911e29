//! Settable fields of every canonical payload.
//!
//! The mapping engine never reflects over payload structs. Instead each
//! [`EntityType`] publishes a static table of [`FieldSpec`] entries naming the
//! JSON key the payload deserialises from, alternative spellings accepted in
//! mapping rules, and the value kind the engine must coerce into. Nested
//! payload objects appear as [`FieldKind::Object`] so dot-path targets such as
//! `speed.walk` resolve segment by segment.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::payload::SpellDamage;
use crate::rules::{LenientEnum, normalise_token};
use crate::{AbilityScore, CreatureType, DamageType, EntityType, SizeCategory};

/// Enumerations a field may be constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind {
    /// [`AbilityScore`].
    Ability,
    /// [`SizeCategory`].
    Size,
    /// [`CreatureType`].
    Creature,
    /// [`DamageType`].
    Damage,
}

impl EnumKind {
    /// Resolve `input` to the canonical variant name.
    #[must_use]
    pub fn parse(self, input: &str) -> Option<&'static str> {
        match self {
            Self::Ability => AbilityScore::parse_lenient(input).map(LenientEnum::name),
            Self::Size => SizeCategory::parse_lenient(input).map(LenientEnum::name),
            Self::Creature => CreatureType::parse_lenient(input).map(LenientEnum::name),
            Self::Damage => DamageType::parse_lenient(input).map(LenientEnum::name),
        }
    }

    /// Variant substituted by domain transforms when parsing fails.
    #[must_use]
    pub fn fallback(self) -> Option<&'static str> {
        match self {
            Self::Ability => AbilityScore::FALLBACK.map(LenientEnum::name),
            Self::Size => SizeCategory::FALLBACK.map(LenientEnum::name),
            Self::Creature => CreatureType::FALLBACK.map(LenientEnum::name),
            Self::Damage => DamageType::FALLBACK.map(LenientEnum::name),
        }
    }

    /// Human-readable name used in diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ability => "ability score",
            Self::Size => "size category",
            Self::Creature => "creature type",
            Self::Damage => "damage type",
        }
    }
}

/// Validator for composite fields deserialised wholesale from a JSON subtree.
pub type CompositeValidator = fn(Value) -> Result<Value, serde_json::Error>;

/// Shape of the value stored in a field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Signed integer; absent optional integers stay `null`.
    Integer,
    /// Floating-point number.
    Number,
    /// Boolean flag.
    Bool,
    /// One variant of a lenient enum.
    Enum(EnumKind),
    /// A [`crate::ChallengeRating`].
    Rating,
    /// List of strings.
    TextList,
    /// List of lenient enum variants.
    EnumList(EnumKind),
    /// String-keyed map of integers.
    IntMap,
    /// Arbitrary structure checked by deserialising into the payload type.
    Composite(CompositeValidator),
    /// Nested object with its own settable fields.
    Object(&'static [FieldSpec]),
}

impl FieldKind {
    /// Short name used in diagnostics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Bool => "boolean",
            Self::Enum(kind) => kind.label(),
            Self::Rating => "rating",
            Self::TextList => "text list",
            Self::EnumList(_) => "enum list",
            Self::IntMap => "integer map",
            Self::Composite(_) => "composite",
            Self::Object(_) => "object",
        }
    }
}

/// One settable field of a payload.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// JSON key the payload deserialises from.
    pub name: &'static str,
    /// Alternative spellings accepted when resolving rule targets.
    pub aliases: &'static [&'static str],
    /// Value kind the mapping engine coerces into.
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            aliases: &[],
            kind,
        }
    }

    const fn aliased(self, aliases: &'static [&'static str]) -> Self {
        Self { aliases, ..self }
    }

    /// Whether `segment` names this field, ignoring case and separators.
    #[must_use]
    pub fn matches(&self, segment: &str) -> bool {
        let wanted = normalise_token(segment);
        normalise_token(self.name) == wanted
            || self
                .aliases
                .iter()
                .any(|alias| normalise_token(alias) == wanted)
    }
}

/// A rule target resolved against a payload schema.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    /// Canonical JSON keys from the payload root to the field.
    pub path: Vec<&'static str>,
    /// Specification of the final segment.
    pub spec: &'static FieldSpec,
}

impl ResolvedTarget {
    /// Canonical dot-path of the target.
    #[must_use]
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

/// Settable fields of `entity_type`, in declaration order.
#[must_use]
pub const fn fields_for(entity_type: EntityType) -> &'static [FieldSpec] {
    match entity_type {
        EntityType::Class => CLASS,
        EntityType::Race => RACE,
        EntityType::Background => BACKGROUND,
        EntityType::Feat => FEAT,
        EntityType::Skill => SKILL,
        EntityType::Language => LANGUAGE,
        EntityType::Spell => SPELL,
        EntityType::Monster => MONSTER,
        EntityType::MagicItem => MAGIC_ITEM,
        EntityType::Equipment => EQUIPMENT,
        EntityType::Weapon => WEAPON,
        EntityType::Armor => ARMOR,
        EntityType::Effect => EFFECT,
    }
}

/// Resolve a dot-separated rule target such as `Speed.Walk`.
///
/// # Examples
/// ```
/// use srd_core::EntityType;
/// use srd_core::schema::resolve_target;
///
/// let target = resolve_target(EntityType::Monster, "Speed.Walk").expect("known target");
/// assert_eq!(target.dotted(), "speed.walk");
/// assert!(resolve_target(EntityType::Monster, "speed.teleport").is_none());
/// ```
#[must_use]
pub fn resolve_target(entity_type: EntityType, target: &str) -> Option<ResolvedTarget> {
    let mut fields = fields_for(entity_type);
    let mut path = Vec::new();
    let mut segments = target.split('.').map(str::trim).peekable();
    while let Some(segment) = segments.next() {
        let spec = fields.iter().find(|spec| spec.matches(segment))?;
        path.push(spec.name);
        if segments.peek().is_none() {
            return Some(ResolvedTarget { path, spec });
        }
        let FieldKind::Object(children) = spec.kind else {
            return None;
        };
        fields = children;
    }
    None
}

fn validate<T: DeserializeOwned + Serialize>(value: Value) -> Result<Value, serde_json::Error> {
    serde_json::from_value::<T>(value).and_then(serde_json::to_value)
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::Text)
}

const fn int(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::Integer)
}

const fn flag(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::Bool)
}

const fn list(name: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::TextList)
}

const ID: FieldSpec = text("id").aliased(&["slug", "key", "identifier"]);
const NAME: FieldSpec = text("name");
const TAGS: FieldSpec = list("tags");
const DESCRIPTION: FieldSpec = text("description").aliased(&["desc"]);

const SPEED: &[FieldSpec] = &[
    int("walk"),
    int("fly"),
    int("swim"),
    int("climb"),
    int("burrow"),
];

const MONSTER: &[FieldSpec] = &[
    ID,
    NAME,
    FieldSpec::new("size", FieldKind::Enum(EnumKind::Size)),
    FieldSpec::new("type", FieldKind::Enum(EnumKind::Creature)).aliased(&["creature_type"]),
    text("alignment"),
    int("armor_class").aliased(&["ac"]),
    text("armor_notes").aliased(&["armor_desc"]),
    int("hit_points").aliased(&["hp", "hit_points_average"]),
    text("hit_dice"),
    FieldSpec::new("speed", FieldKind::Object(SPEED)),
    int("strength").aliased(&["str"]),
    int("dexterity").aliased(&["dex"]),
    int("constitution").aliased(&["con"]),
    int("intelligence").aliased(&["int"]),
    int("wisdom").aliased(&["wis"]),
    int("charisma").aliased(&["cha"]),
    FieldSpec::new("saving_throws", FieldKind::IntMap),
    FieldSpec::new("skills", FieldKind::IntMap),
    text("senses"),
    int("passive_perception"),
    text("languages"),
    FieldSpec::new("challenge_rating", FieldKind::Rating).aliased(&["rating", "cr"]),
    list("damage_vulnerabilities"),
    list("damage_resistances"),
    list("damage_immunities"),
    list("condition_immunities"),
    text("traits").aliased(&["traits_markdown"]),
    text("actions").aliased(&["actions_markdown"]),
    text("reactions").aliased(&["reactions_markdown"]),
    text("legendary_actions").aliased(&["legendary_actions_markdown"]),
    TAGS,
];

const SPELL: &[FieldSpec] = &[
    ID,
    NAME,
    int("level").aliased(&["level_int", "spell_level"]),
    text("school"),
    text("action_type"),
    text("range_type"),
    int("range_feet"),
    text("target_shape"),
    int("area_radius_feet"),
    int("area_length_feet"),
    int("area_width_feet"),
    list("components"),
    flag("ritual").aliased(&["is_ritual", "can_be_cast_as_ritual"]),
    flag("concentration").aliased(&["requires_concentration"]),
    text("duration"),
    text("casting_time").aliased(&["casting_time_description"]),
    FieldSpec::new("save_ability", FieldKind::Enum(EnumKind::Ability)),
    flag("half_on_save"),
    FieldSpec::new("damage", FieldKind::Composite(validate::<Vec<SpellDamage>>)),
    text("rules_text").aliased(&["desc", "description"]),
    list("classes").aliased(&["class_list_ids", "dnd_class"]),
    TAGS,
];

const CLASS: &[FieldSpec] = &[
    ID,
    NAME,
    int("hit_die").aliased(&["hit_dice"]),
    FieldSpec::new("primary_abilities", FieldKind::EnumList(EnumKind::Ability)),
    FieldSpec::new("saving_throws", FieldKind::EnumList(EnumKind::Ability))
        .aliased(&["saving_throw_proficiencies", "prof_saving_throws"]),
    list("armor_proficiencies").aliased(&["prof_armor"]),
    list("weapon_proficiencies").aliased(&["prof_weapons"]),
    list("tool_proficiencies").aliased(&["prof_tools"]),
    TAGS,
];

const RACE: &[FieldSpec] = &[
    ID,
    NAME,
    FieldSpec::new("size", FieldKind::Enum(EnumKind::Size)).aliased(&["size_raw"]),
    int("speed_feet").aliased(&["base_speed_feet"]),
    DESCRIPTION,
];

const BACKGROUND: &[FieldSpec] = &[
    ID,
    NAME,
    DESCRIPTION,
    list("skill_proficiencies"),
    list("starting_equipment").aliased(&["starting_equipment_ids"]),
    list("feature_effect_ids"),
    TAGS,
];

const FEAT: &[FieldSpec] = &[
    ID,
    NAME,
    text("prerequisites").aliased(&["prerequisite"]),
    DESCRIPTION,
    list("effect_ids"),
    TAGS,
];

const SKILL: &[FieldSpec] = &[
    ID,
    NAME,
    FieldSpec::new("ability", FieldKind::Enum(EnumKind::Ability)),
    DESCRIPTION,
];

const LANGUAGE: &[FieldSpec] = &[
    ID,
    NAME,
    flag("standard").aliased(&["is_standard"]),
    text("script"),
    text("typical_speakers"),
    DESCRIPTION,
];

const MAGIC_ITEM: &[FieldSpec] = &[
    ID,
    NAME,
    text("type").aliased(&["item_type"]),
    text("rarity"),
    flag("requires_attunement"),
    text("attunement_requirement"),
    list("effect_ids"),
    text("rules_text").aliased(&["desc"]),
    TAGS,
];

macro_rules! equipment_schema {
    ($($extra:expr),* $(,)?) => {
        &[
            ID,
            NAME,
            text("category"),
            int("cost_copper"),
            FieldSpec::new("weight_pounds", FieldKind::Number).aliased(&["weight"]),
            DESCRIPTION,
            TAGS,
            $($extra,)*
        ]
    };
}

const EQUIPMENT: &[FieldSpec] = equipment_schema!();

const WEAPON: &[FieldSpec] = equipment_schema!(
    text("weapon_category"),
    text("damage_dice"),
    FieldSpec::new("damage_type", FieldKind::Enum(EnumKind::Damage)),
    int("range_normal_feet").aliased(&["range"]),
    int("range_max_feet").aliased(&["long_range"]),
    list("properties"),
);

const ARMOR: &[FieldSpec] = equipment_schema!(
    text("armor_category"),
    int("armor_class_base").aliased(&["ac_base"]),
    flag("adds_dexterity_modifier").aliased(&["ac_add_dexmod"]),
    int("max_dexterity_bonus").aliased(&["ac_cap_dexmod"]),
    int("strength_requirement").aliased(&["strength_score_required"]),
    flag("stealth_disadvantage").aliased(&["grants_stealth_disadvantage"]),
);

const EFFECT: &[FieldSpec] = &[
    ID,
    NAME,
    text("source"),
    text("trigger"),
    text("target_scope"),
    DESCRIPTION,
    FieldSpec::new("components", FieldKind::Composite(validate::<Vec<Value>>)),
];
