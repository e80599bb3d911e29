//! Named transforms applied to resolved values.
//!
//! Text transforms reshape strings and hand the result on to generic
//! coercion. Domain transforms interpret the raw value themselves and
//! produce the stored form directly.

use serde_json::Value;
use srd_core::schema::{EnumKind, FieldKind};
use srd_core::{ChallengeRating, DiceExpression, Transform};

use super::coerce::{not_a, text_items, text_of};

/// Result of a domain transform.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Transformed {
    pub(crate) value: Value,
    pub(crate) warning: Option<String>,
}

impl Transformed {
    const fn clean(value: Value) -> Self {
        Self {
            value,
            warning: None,
        }
    }
}

/// Whether `transform` can produce a value for a field of `kind`.
pub(crate) const fn accepts(transform: Transform, kind: &FieldKind) -> bool {
    match transform {
        Transform::Trim | Transform::Lower | Transform::Upper => !matches!(
            kind,
            FieldKind::Object(_) | FieldKind::Composite(_) | FieldKind::IntMap
        ),
        Transform::ParseFraction => matches!(kind, FieldKind::Rating | FieldKind::Text),
        Transform::ParseAbility => matches!(
            kind,
            FieldKind::Enum(EnumKind::Ability)
                | FieldKind::EnumList(EnumKind::Ability)
                | FieldKind::Text
        ),
        Transform::ParseSize => matches!(kind, FieldKind::Enum(EnumKind::Size) | FieldKind::Text),
        Transform::ParseCreatureType => {
            matches!(kind, FieldKind::Enum(EnumKind::Creature) | FieldKind::Text)
        }
        Transform::ParseDamageType => {
            matches!(kind, FieldKind::Enum(EnumKind::Damage) | FieldKind::Text)
        }
        Transform::ParseDice => matches!(kind, FieldKind::Text),
    }
}

/// Apply a text transform to every string in `raw`.
///
/// Non-string scalars are stringified first; objects pass through untouched.
pub(crate) fn reshape(transform: Transform, raw: &Value) -> Value {
    let apply = |text: &str| match transform {
        Transform::Trim => text.trim().to_owned(),
        Transform::Lower => text.to_lowercase(),
        Transform::Upper => text.to_uppercase(),
        _ => text.to_owned(),
    };
    match raw {
        Value::Array(items) => Value::Array(items.iter().map(|item| reshape(transform, item)).collect()),
        Value::Object(_) | Value::Null => raw.clone(),
        other => Value::String(apply(&text_of(other))),
    }
}

/// Run a domain transform against `raw` for a field of `kind`.
///
/// Returns `Err` when the value cannot be interpreted and the transform has
/// no fallback.
pub(crate) fn interpret(
    transform: Transform,
    kind: &FieldKind,
    raw: &Value,
) -> Result<Transformed, String> {
    match transform {
        Transform::ParseFraction => {
            let rating = ChallengeRating::from_json(raw);
            let value = match kind {
                FieldKind::Text => Value::String(rating.to_string()),
                _ => serde_json::to_value(&rating).map_err(|err| err.to_string())?,
            };
            Ok(Transformed::clean(value))
        }
        Transform::ParseAbility => match kind {
            FieldKind::EnumList(_) => text_items(raw)
                .iter()
                .map(|item| strict_variant(EnumKind::Ability, item))
                .collect::<Result<Vec<_>, _>>()
                .map(|items| Transformed::clean(Value::Array(items))),
            _ => strict_variant(EnumKind::Ability, &text_of(raw)).map(Transformed::clean),
        },
        Transform::ParseSize => with_fallback(EnumKind::Size, raw),
        Transform::ParseCreatureType => with_fallback(EnumKind::Creature, raw),
        Transform::ParseDamageType => with_fallback(EnumKind::Damage, raw),
        Transform::ParseDice => Ok(dice(raw)),
        Transform::Trim | Transform::Lower | Transform::Upper => {
            Ok(Transformed::clean(reshape(transform, raw)))
        }
    }
}

fn strict_variant(kind: EnumKind, text: &str) -> Result<Value, String> {
    kind.parse(text).map(Value::from).ok_or_else(|| not_a(kind, text))
}

fn with_fallback(kind: EnumKind, raw: &Value) -> Result<Transformed, String> {
    let text = text_of(raw);
    if let Some(name) = kind.parse(&text) {
        return Ok(Transformed::clean(Value::from(name)));
    }
    let fallback = kind.fallback().ok_or_else(|| not_a(kind, &text))?;
    Ok(Transformed {
        value: Value::from(fallback),
        warning: Some(format!("{}; using {fallback}", not_a(kind, &text))),
    })
}

fn dice(raw: &Value) -> Transformed {
    let text = text_of(raw);
    match text.parse::<DiceExpression>() {
        Ok(expression) => Transformed::clean(Value::String(expression.to_string())),
        Err(err) => Transformed {
            value: Value::String(text.trim().to_owned()),
            warning: Some(format!("{err}; kept the text as given")),
        },
    }
}
