//! Field-name synonyms consulted when a rule auto-matches its target.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use srd_core::rules::normalise_token;

/// Alternative record keys for canonical field names.
///
/// Keys are canonical payload field names (`hit_points`); values are the
/// spellings feeds commonly use instead (`hp`). The default table covers the
/// six ability scores and the usual stat-block abbreviations.
///
/// # Examples
/// ```
/// use srd_data::SynonymTable;
///
/// let table = SynonymTable::default().with_synonym("hit_points", "vitality");
/// assert!(table.synonyms_of("hit_points").iter().any(|name| name == "hp"));
/// assert!(table.synonyms_of("hit_points").iter().any(|name| name == "vitality"));
/// assert!(table.synonyms_of("alignment").is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymTable {
    entries: BTreeMap<String, Vec<String>>,
}

const DEFAULT_SYNONYMS: &[(&str, &[&str])] = &[
    ("strength", &["str"]),
    ("dexterity", &["dex"]),
    ("constitution", &["con"]),
    ("intelligence", &["int"]),
    ("wisdom", &["wis"]),
    ("charisma", &["cha"]),
    ("hit_points", &["hp", "hitpoints", "hit_points_average"]),
    ("hit_dice", &["hd"]),
    ("armor_class", &["ac", "armour_class"]),
    ("challenge_rating", &["cr", "challenge"]),
];

impl Default for SynonymTable {
    fn default() -> Self {
        DEFAULT_SYNONYMS
            .iter()
            .flat_map(|(field, names)| names.iter().map(move |name| (*field, *name)))
            .fold(Self::empty(), |table, (field, name)| {
                table.with_synonym(field, name)
            })
    }
}

impl SynonymTable {
    /// A table with no synonyms; only exact and normalised names match.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register `synonym` as another spelling of `field`.
    #[must_use]
    pub fn with_synonym(mut self, field: &str, synonym: &str) -> Self {
        let names = self.entries.entry(field.to_ascii_lowercase()).or_default();
        let synonym = synonym.to_ascii_lowercase();
        if !names.contains(&synonym) {
            names.push(synonym);
        }
        self
    }

    /// Registered synonyms of `field`.
    #[must_use]
    pub fn synonyms_of(&self, field: &str) -> &[String] {
        self.entries
            .get(&field.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Find the value `object` holds for `field`.
    ///
    /// Candidates are tried as: the field name ignoring case, then any
    /// synonym or schema alias ignoring case, then every name again after
    /// stripping separators so `HitPoints` meets `hit_points`. Null values
    /// never match.
    pub(crate) fn find<'a>(
        &self,
        object: &'a Map<String, Value>,
        field: &str,
        aliases: &[&str],
    ) -> Option<&'a Value> {
        let present = |key: &String, value: &Value| !value.is_null() && !key.is_empty();
        if let Some((_, value)) = object
            .iter()
            .find(|&(key, value)| present(key, value) && key.eq_ignore_ascii_case(field))
        {
            return Some(value);
        }

        let others: Vec<&str> = self
            .synonyms_of(field)
            .iter()
            .map(String::as_str)
            .chain(aliases.iter().copied())
            .collect();
        for name in &others {
            if let Some((_, value)) = object
                .iter()
                .find(|&(key, value)| present(key, value) && key.eq_ignore_ascii_case(name))
            {
                return Some(value);
            }
        }

        let wanted: Vec<String> = std::iter::once(field)
            .chain(others.iter().copied())
            .map(normalise_token)
            .collect();
        object
            .iter()
            .find(|&(key, value)| present(key, value) && wanted.contains(&normalise_token(key)))
            .map(|(_, value)| value)
    }
}
