//! Rule-driven mapping of raw records onto canonical payloads.
//!
//! A [`MappingProfile`] is compiled into a [`CompiledProfile`] once per feed.
//! [`MappingEngine::map`] then applies its rules to each record in order:
//!
//! 1. A rule's constant wins over any lookup.
//! 2. Otherwise the first source path holding a non-null value wins. A rule
//!    with no source paths auto-matches its target by name, synonym or
//!    normalised spelling.
//! 3. A transform, when named, runs next. Text transforms feed generic
//!    coercion; domain transforms produce the stored value themselves.
//! 4. Otherwise the value is coerced into the field's declared kind.
//! 5. The result is written at the target path, creating nested objects.
//!
//! Failures on required rules are errors and reject the record. Failures on
//! optional rules are warnings and leave the field at its zero value.
//! Mapping performs no I/O and is deterministic for a given record, profile
//! and synonym table.

mod coerce;
mod path;
mod profile;
mod synonyms;
mod transform;

#[cfg(test)]
mod tests;

use serde_json::{Map, Value};
use srd_core::schema::ResolvedTarget;
use srd_core::{MappingProfile, Payload};

pub use profile::{CompiledProfile, ProfileError};
pub use synonyms::SynonymTable;

use profile::CompiledRule;

/// Result of mapping one record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappingOutcome {
    /// The mapped payload; `None` whenever `errors` is non-empty.
    pub entity: Option<Payload>,
    /// Non-fatal problems, such as optional fields that did not resolve.
    pub warnings: Vec<String>,
    /// Problems that rejected the record.
    pub errors: Vec<String>,
}

impl MappingOutcome {
    /// Whether the record mapped without errors.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.entity.is_some()
    }
}

/// Applies compiled profiles to raw records.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use srd_core::{EntityType, FieldRule, MappingProfile, Transform};
/// use srd_data::MappingEngine;
///
/// let profile = MappingProfile::new(
///     "monsters",
///     "Monsters",
///     EntityType::Monster,
///     vec![
///         FieldRule::new("Id").from_sources(["slug"]).required(),
///         FieldRule::new("HitPoints").from_sources(["hit_points"]),
///         FieldRule::new("Rating")
///             .from_sources(["challenge_rating"])
///             .with_transform(Transform::ParseFraction),
///     ],
/// );
/// let engine = MappingEngine::default();
/// let outcome = engine.map_with_profile(
///     &json!({"slug": "goblin", "hit_points": 7, "challenge_rating": "1/4"}),
///     &profile,
/// )?;
/// let payload = outcome.entity.expect("goblin maps");
/// assert_eq!(payload.id(), "goblin");
/// assert_eq!(payload.to_value()?["challenge_rating"], "1/4");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MappingEngine {
    synonyms: SynonymTable,
}

impl MappingEngine {
    /// Create an engine that auto-matches with `synonyms`.
    #[must_use]
    pub const fn new(synonyms: SynonymTable) -> Self {
        Self { synonyms }
    }

    /// Synonyms consulted by auto-matching.
    #[must_use]
    pub const fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    /// Compile `profile` and map `record` with it.
    ///
    /// # Errors
    /// Returns [`ProfileError`] when the profile does not fit its schema.
    pub fn map_with_profile(
        &self,
        record: &Value,
        profile: &MappingProfile,
    ) -> Result<MappingOutcome, ProfileError> {
        CompiledProfile::compile(profile).map(|compiled| self.map(record, &compiled))
    }

    /// Map one raw record.
    #[must_use]
    pub fn map(&self, record: &Value, profile: &CompiledProfile) -> MappingOutcome {
        let mut outcome = MappingOutcome::default();
        let mut root = Map::new();

        for compiled in &profile.rules {
            self.apply_rule(record, compiled, &mut root, &mut outcome);
        }

        for spec in &profile.auto_fields {
            let Some(raw) = record
                .as_object()
                .and_then(|object| self.synonyms.find(object, spec.name, spec.aliases))
            else {
                continue;
            };
            match coerce::coerce(&spec.kind, raw) {
                Ok(value) => {
                    root.insert(spec.name.to_owned(), value);
                }
                Err(err) => outcome.warnings.push(format!("field '{}': {err}", spec.name)),
            }
        }

        if outcome.errors.is_empty() {
            match Payload::from_value(profile.entity_type(), Value::Object(root)) {
                Ok(payload) => outcome.entity = Some(payload),
                Err(err) => outcome.errors.push(format!(
                    "mapped record does not fit the {} schema: {err}",
                    profile.entity_type()
                )),
            }
        }
        outcome
    }

    fn apply_rule(
        &self,
        record: &Value,
        compiled: &CompiledRule,
        root: &mut Map<String, Value>,
        outcome: &mut MappingOutcome,
    ) {
        let CompiledRule { rule, target } = compiled;
        let dotted = target.dotted();
        let mut report = |message: String| {
            let message = format!("field '{dotted}': {message}");
            if rule.required {
                outcome.errors.push(message);
            } else {
                outcome.warnings.push(message);
            }
        };

        let Some(raw) = self.resolve(record, compiled) else {
            report(if rule.source.is_empty() {
                "no matching field in the record".to_owned()
            } else {
                format!("none of [{}] is present", rule.source.join(", "))
            });
            return;
        };

        let resolved = match rule.transform {
            Some(name) if name.is_textual() => {
                coerce::coerce(&target.spec.kind, &transform::reshape(name, &raw))
            }
            Some(name) => transform::interpret(name, &target.spec.kind, &raw).map(|done| {
                if let Some(warning) = done.warning {
                    report(warning);
                }
                done.value
            }),
            None => coerce::coerce(&target.spec.kind, &raw),
        };

        match resolved {
            Ok(value) => path::assign(root, &target.path, value),
            Err(err) => report(err),
        }
    }

    fn resolve(&self, record: &Value, compiled: &CompiledRule) -> Option<Value> {
        let rule = &compiled.rule;
        if let Some(constant) = &rule.constant {
            return Some(constant.clone());
        }
        if rule.source.is_empty() {
            return self.auto_match(record, &compiled.target).cloned();
        }
        rule.source
            .iter()
            .find_map(|candidate| path::lookup(record, candidate))
            .cloned()
    }

    /// Walk `record` along `target`, matching each segment by name.
    fn auto_match<'a>(&self, record: &'a Value, target: &ResolvedTarget) -> Option<&'a Value> {
        let last = target.path.len().checked_sub(1)?;
        let mut current = record;
        for (depth, segment) in target.path.iter().enumerate() {
            let aliases = if depth == last { target.spec.aliases } else { &[] };
            current = self.synonyms.find(current.as_object()?, segment, aliases)?;
        }
        Some(current)
    }
}
