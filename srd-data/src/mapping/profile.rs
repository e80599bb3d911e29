//! Validation of mapping profiles against the payload schema.

use srd_core::schema::{FieldSpec, ResolvedTarget, fields_for, resolve_target};
use srd_core::{EntityType, FieldRule, MappingProfile, Transform};
use thiserror::Error;

use super::transform;

/// A profile that cannot be applied to its entity type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    /// A rule names a field the payload does not have.
    #[error("profile '{profile_id}' targets unknown {entity_type} field '{target}'")]
    UnknownTarget {
        /// Offending profile.
        profile_id: String,
        /// Entity type the profile populates.
        entity_type: EntityType,
        /// Target as written in the rule.
        target: String,
    },
    /// A rule's transform cannot produce the target field's kind.
    #[error("profile '{profile_id}' applies {transform} to {kind} field '{target}'")]
    IncompatibleTransform {
        /// Offending profile.
        profile_id: String,
        /// Canonical target path.
        target: String,
        /// Transform named by the rule.
        transform: Transform,
        /// Kind of the target field.
        kind: &'static str,
    },
    /// A feed references a profile written for another entity type.
    #[error("feed '{feed_id}' carries {feed_type} but profile '{profile_id}' maps {profile_type}")]
    EntityTypeMismatch {
        /// Feed being ingested.
        feed_id: String,
        /// Entity type declared by the feed.
        feed_type: EntityType,
        /// Referenced profile.
        profile_id: String,
        /// Entity type the profile populates.
        profile_type: EntityType,
    },
}

/// A rule whose target has been resolved against the schema.
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pub(crate) rule: FieldRule,
    pub(crate) target: ResolvedTarget,
}

/// A [`MappingProfile`] checked against its payload schema.
///
/// Compile once per feed and reuse for every record.
#[derive(Debug, Clone)]
pub struct CompiledProfile {
    id: String,
    entity_type: EntityType,
    pub(crate) rules: Vec<CompiledRule>,
    pub(crate) auto_fields: Vec<&'static FieldSpec>,
}

impl CompiledProfile {
    /// Resolve every rule target and check transform compatibility.
    ///
    /// When the profile enables auto-matching, every top-level field no rule
    /// reaches is remembered for matching against each record.
    ///
    /// # Errors
    /// Returns [`ProfileError`] for the first rule that cannot be applied.
    pub fn compile(profile: &MappingProfile) -> Result<Self, ProfileError> {
        let rules = profile
            .rules
            .iter()
            .map(|rule| compile_rule(profile, rule))
            .collect::<Result<Vec<_>, _>>()?;

        let auto_fields = if profile.auto_match {
            fields_for(profile.entity_type)
                .iter()
                .filter(|spec| !rules.iter().any(|rule| rule.target.path.first() == Some(&spec.name)))
                .collect()
        } else {
            Vec::new()
        };

        Ok(Self {
            id: profile.id.clone(),
            entity_type: profile.entity_type,
            rules,
            auto_fields,
        })
    }

    /// Identifier of the source profile.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Entity type the profile populates.
    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Fail unless the profile maps the entity type `feed_type`.
    ///
    /// # Errors
    /// Returns [`ProfileError::EntityTypeMismatch`] naming both sides.
    pub fn ensure_feed_type(&self, feed_id: &str, feed_type: EntityType) -> Result<(), ProfileError> {
        if self.entity_type == feed_type {
            return Ok(());
        }
        Err(ProfileError::EntityTypeMismatch {
            feed_id: feed_id.to_owned(),
            feed_type,
            profile_id: self.id.clone(),
            profile_type: self.entity_type,
        })
    }
}

fn compile_rule(profile: &MappingProfile, rule: &FieldRule) -> Result<CompiledRule, ProfileError> {
    let target = resolve_target(profile.entity_type, &rule.target).ok_or_else(|| {
        ProfileError::UnknownTarget {
            profile_id: profile.id.clone(),
            entity_type: profile.entity_type,
            target: rule.target.clone(),
        }
    })?;
    if let Some(name) = rule.transform
        && !transform::accepts(name, &target.spec.kind)
    {
        return Err(ProfileError::IncompatibleTransform {
            profile_id: profile.id.clone(),
            target: target.dotted(),
            transform: name,
            kind: target.spec.kind.label(),
        });
    }
    Ok(CompiledRule {
        rule: rule.clone(),
        target,
    })
}
