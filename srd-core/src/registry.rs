//! Registry records describing where content comes from and how it maps.
//!
//! A [`SourceDefinition`] names an upstream (a directory of JSON files or an
//! HTTP API). Each [`SourceEntityFeed`] pulls one entity type from a source
//! and points at the [`MappingProfile`] whose [`FieldRule`]s translate raw
//! records into canonical payloads.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{EntityType, StoreError};

/// Transport used to reach a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Local JSON documents.
    #[serde(alias = "FileBased", alias = "FileJson", alias = "file_based")]
    File,
    /// Paginated JSON over HTTP.
    #[serde(alias = "HttpBased", alias = "HttpJson", alias = "http_based")]
    Http,
}

impl SourceKind {
    /// Stable storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match crate::rules::normalise_token(s).as_str() {
            "file" | "filebased" | "filejson" => Ok(Self::File),
            "http" | "httpbased" | "httpjson" => Ok(Self::Http),
            _ => Err(format!("unknown source kind '{s}'")),
        }
    }
}

/// Kind-specific connection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConnection {
    /// Directory that relative file feed paths resolve against.
    pub base_path: Option<String>,
    /// URL that relative HTTP feed paths are joined onto.
    pub base_url: Option<String>,
    /// Headers attached to every HTTP request.
    pub headers: BTreeMap<String, String>,
}

impl SourceConnection {
    /// Connection for file sources rooted at `base_path`.
    #[must_use]
    pub fn file(base_path: impl Into<String>) -> Self {
        Self {
            base_path: Some(base_path.into()),
            ..Self::default()
        }
    }

    /// Connection for HTTP sources rooted at `base_url`.
    #[must_use]
    pub fn http(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    /// Add a header sent with every request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// An upstream content source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDefinition {
    /// Stable unique key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Transport used to read the source.
    pub kind: SourceKind,
    /// Kind-specific connection settings.
    #[serde(default)]
    pub connection: SourceConnection,
    /// Disabled sources are skipped by ingestion but keep their history.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Time of the last registry write, assigned by the store.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SourceDefinition {
    /// Build an enabled source definition.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: SourceKind,
        connection: SourceConnection,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            connection,
            enabled: true,
            updated_at: None,
        }
    }

    /// Mark the source as disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Where a feed's records live inside a fetched document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Absolute URL, or a path relative to the source's base path or URL.
    #[serde(alias = "path", alias = "url")]
    pub path_or_url: String,
    /// Dot-path of the items array; empty or `$` selects the document root.
    #[serde(alias = "items_property", alias = "root")]
    pub items_field: String,
    /// Field holding the next page URL; `None` disables pagination.
    #[serde(alias = "next_page_property")]
    pub next_page_field: Option<String>,
}

/// Default name of the items array in paginated responses.
pub const DEFAULT_ITEMS_FIELD: &str = "results";
/// Default name of the next-page link in paginated responses.
pub const DEFAULT_NEXT_PAGE_FIELD: &str = "next";

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            path_or_url: String::new(),
            items_field: DEFAULT_ITEMS_FIELD.to_owned(),
            next_page_field: Some(DEFAULT_NEXT_PAGE_FIELD.to_owned()),
        }
    }
}

impl FetchConfig {
    /// Fetch `path_or_url` using the default field names.
    #[must_use]
    pub fn new(path_or_url: impl Into<String>) -> Self {
        Self {
            path_or_url: path_or_url.into(),
            ..Self::default()
        }
    }

    /// Override the items array path.
    #[must_use]
    pub fn with_items_field(mut self, items_field: impl Into<String>) -> Self {
        self.items_field = items_field.into();
        self
    }

    /// Override or disable the next-page field.
    #[must_use]
    pub fn with_next_page_field(mut self, field: Option<&str>) -> Self {
        self.next_page_field = field.map(str::to_owned);
        self
    }

    /// Segments of the items path; empty when the root holds the items.
    ///
    /// ```
    /// use srd_core::FetchConfig;
    ///
    /// let config = FetchConfig::new("monsters.json").with_items_field("$.data.items");
    /// assert_eq!(config.items_path(), vec!["data", "items"]);
    /// assert!(FetchConfig::new("x").with_items_field("$").items_path().is_empty());
    /// ```
    #[must_use]
    pub fn items_path(&self) -> Vec<&str> {
        let trimmed = self.items_field.trim();
        let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
        trimmed
            .split('.')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect()
    }
}

/// One fetchable stream of records of a single entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntityFeed {
    /// Stable unique key.
    pub id: String,
    /// Owning [`SourceDefinition`].
    pub source_id: String,
    /// Entity type produced by the feed; must match the profile's.
    pub entity_type: EntityType,
    /// [`MappingProfile`] applied to each record.
    pub mapping_profile_id: String,
    /// Location of the records.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Disabled feeds are skipped by ingestion.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Time of the last registry write, assigned by the store.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SourceEntityFeed {
    /// Build an enabled feed.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        entity_type: EntityType,
        mapping_profile_id: impl Into<String>,
        fetch: FetchConfig,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            entity_type,
            mapping_profile_id: mapping_profile_id.into(),
            fetch,
            enabled: true,
            updated_at: None,
        }
    }

    /// Mark the feed as disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Named value transformation applied by a [`FieldRule`].
///
/// String transforms run before type coercion. Domain transforms parse the
/// raw value directly into the final typed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    /// Trim surrounding whitespace.
    Trim,
    /// Lower-case the text.
    Lower,
    /// Upper-case the text.
    Upper,
    /// Parse a rating such as `1/4` or `0.5`.
    ParseFraction,
    /// Expand an ability abbreviation such as `str`.
    ParseAbility,
    /// Parse a size category, falling back to medium.
    ParseSize,
    /// Parse a creature type, falling back to other.
    ParseCreatureType,
    /// Parse a damage type, falling back to force.
    ParseDamageType,
    /// Normalise a dice expression such as `2d6 + 3`.
    ParseDice,
}

impl Transform {
    /// Every transform.
    pub const ALL: [Self; 9] = [
        Self::Trim,
        Self::Lower,
        Self::Upper,
        Self::ParseFraction,
        Self::ParseAbility,
        Self::ParseSize,
        Self::ParseCreatureType,
        Self::ParseDamageType,
        Self::ParseDice,
    ];

    /// Canonical kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trim => "trim",
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::ParseFraction => "parse-fraction",
            Self::ParseAbility => "parse-ability",
            Self::ParseSize => "parse-size",
            Self::ParseCreatureType => "parse-creature-type",
            Self::ParseDamageType => "parse-damage-type",
            Self::ParseDice => "parse-dice",
        }
    }

    /// Whether the transform only reshapes text before coercion.
    #[must_use]
    pub const fn is_textual(self) -> bool {
        matches!(self, Self::Trim | Self::Lower | Self::Upper)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = crate::rules::normalise_token(s);
        let found = match wanted.as_str() {
            "lowercase" => Some(Self::Lower),
            "uppercase" => Some(Self::Upper),
            "parsecr" | "parserating" | "parsechallengerating" => Some(Self::ParseFraction),
            "parseenumalias" | "parseabilityscore" => Some(Self::ParseAbility),
            _ => Self::ALL
                .into_iter()
                .find(|transform| crate::rules::normalise_token(transform.as_str()) == wanted),
        };
        found.ok_or_else(|| format!("unknown transform '{s}'"))
    }
}

impl Serialize for Transform {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Transform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// One declarative field assignment.
///
/// # Examples
/// ```
/// use srd_core::{FieldRule, Transform};
///
/// let rule = FieldRule::new("Rating")
///     .from_sources(["challenge_rating", "cr"])
///     .with_transform(Transform::ParseFraction)
///     .required();
/// assert_eq!(rule.source, vec!["challenge_rating", "cr"]);
/// assert!(rule.required);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Dot-path into the canonical payload.
    pub target: String,
    /// Candidate dot-paths into the raw record; the first present wins.
    #[serde(default, alias = "sources", deserialize_with = "one_or_many")]
    pub source: Vec<String>,
    /// Literal value used instead of any source lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<Value>,
    /// Optional named transformation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    /// Whether a missing value fails the record instead of warning.
    #[serde(default)]
    pub required: bool,
}

impl FieldRule {
    /// A rule for `target` with no sources, which auto-matches the record.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            source: Vec::new(),
            constant: None,
            transform: None,
            required: false,
        }
    }

    /// Set the candidate source paths.
    #[must_use]
    pub fn from_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Use a literal value instead of reading the record.
    #[must_use]
    pub fn with_constant(mut self, constant: Value) -> Self {
        self.constant = Some(constant);
        self
    }

    /// Apply `transform` to the resolved value.
    #[must_use]
    pub const fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Fail the record when no value resolves.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Nothing(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(path) if path.trim().is_empty() => Vec::new(),
        OneOrMany::One(path) => vec![path],
        OneOrMany::Many(paths) => paths,
        OneOrMany::Nothing(()) => Vec::new(),
    })
}

/// A named, data-driven set of field rules for one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingProfile {
    /// Stable unique key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Entity type the rules populate.
    pub entity_type: EntityType,
    /// Rules applied in order.
    #[serde(default)]
    pub rules: Vec<FieldRule>,
    /// Auto-match every top-level field no rule targets.
    #[serde(default)]
    pub auto_match: bool,
    /// Time of the last registry write, assigned by the store.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MappingProfile {
    /// Build a profile from an ordered rule list.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        entity_type: EntityType,
        rules: Vec<FieldRule>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            entity_type,
            rules,
            auto_match: false,
            updated_at: None,
        }
    }

    /// Enable auto-matching for untargeted fields.
    #[must_use]
    pub const fn with_auto_match(mut self) -> Self {
        self.auto_match = true;
        self
    }
}

const fn enabled_by_default() -> bool {
    true
}

/// Persistence for registry records.
///
/// Writes replace the whole record and stamp `updated_at` with the store's
/// clock.
pub trait RegistryStore {
    /// Insert or replace a source definition.
    fn upsert_source(&self, source: &SourceDefinition) -> Result<(), StoreError>;
    /// Fetch a source by id.
    fn get_source(&self, id: &str) -> Result<Option<SourceDefinition>, StoreError>;
    /// List sources ordered by id.
    fn list_sources(&self, enabled_only: bool) -> Result<Vec<SourceDefinition>, StoreError>;
    /// Insert or replace a mapping profile.
    fn upsert_profile(&self, profile: &MappingProfile) -> Result<(), StoreError>;
    /// Fetch a mapping profile by id.
    fn get_profile(&self, id: &str) -> Result<Option<MappingProfile>, StoreError>;
    /// Insert or replace a feed.
    fn upsert_feed(&self, feed: &SourceEntityFeed) -> Result<(), StoreError>;
    /// Fetch a feed by id.
    fn get_feed(&self, id: &str) -> Result<Option<SourceEntityFeed>, StoreError>;
    /// List the feeds of a source ordered by id.
    fn list_feeds(
        &self,
        source_id: &str,
        enabled_only: bool,
    ) -> Result<Vec<SourceEntityFeed>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("parse-fraction", Transform::ParseFraction)]
    #[case("parse_fraction", Transform::ParseFraction)]
    #[case("parse_cr", Transform::ParseFraction)]
    #[case("parse-enum-alias", Transform::ParseAbility)]
    #[case("UPPER", Transform::Upper)]
    #[case("parse_creature_type", Transform::ParseCreatureType)]
    fn transform_names_parse_leniently(#[case] name: &str, #[case] expected: Transform) {
        assert_eq!(name.parse::<Transform>(), Ok(expected));
    }

    #[rstest]
    fn transform_names_round_trip() {
        for transform in Transform::ALL {
            assert_eq!(transform.as_str().parse::<Transform>(), Ok(transform));
        }
    }

    #[rstest]
    fn rules_accept_single_source_strings() {
        let rule: FieldRule = serde_json::from_value(json!({
            "target": "Id",
            "source": "slug",
            "required": true
        }))
        .expect("decode rule");
        assert_eq!(rule.source, vec!["slug"]);
        assert!(rule.required);
        assert!(rule.constant.is_none());
    }

    #[rstest]
    fn rules_treat_null_and_empty_sources_as_auto_match() {
        let rule: FieldRule =
            serde_json::from_value(json!({"target": "name", "source": null})).expect("decode");
        assert!(rule.source.is_empty());
        let rule: FieldRule =
            serde_json::from_value(json!({"target": "name", "source": ""})).expect("decode");
        assert!(rule.source.is_empty());
    }

    #[rstest]
    fn fetch_config_defaults_to_paginated_results() {
        let config: FetchConfig =
            serde_json::from_value(json!({"path": "v1/monsters/"})).expect("decode fetch");
        assert_eq!(config.path_or_url, "v1/monsters/");
        assert_eq!(config.items_path(), vec!["results"]);
        assert_eq!(config.next_page_field.as_deref(), Some("next"));
    }

    #[rstest]
    #[case("HttpJson", SourceKind::Http)]
    #[case("file", SourceKind::File)]
    #[case("FileBased", SourceKind::File)]
    fn source_kinds_accept_legacy_names(#[case] name: &str, #[case] expected: SourceKind) {
        assert_eq!(name.parse::<SourceKind>(), Ok(expected));
        let decoded: SourceKind = serde_json::from_value(json!(name)).expect("decode kind");
        assert_eq!(decoded, expected);
    }
}
