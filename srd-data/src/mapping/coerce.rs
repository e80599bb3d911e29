//! Generic coercion of raw JSON into a field's declared kind.

use serde_json::{Map, Number, Value};
use srd_core::ChallengeRating;
use srd_core::schema::{EnumKind, FieldKind, FieldSpec};

/// Convert `raw` into the shape `kind` stores.
///
/// Errors carry a short description of why the value was rejected; callers
/// prefix the target name.
pub(crate) fn coerce(kind: &FieldKind, raw: &Value) -> Result<Value, String> {
    match kind {
        FieldKind::Text => Ok(Value::String(text_of(raw))),
        FieldKind::Integer => integer(raw).map(Value::from),
        FieldKind::Number => number(raw).map(Value::Number),
        FieldKind::Bool => boolean(raw).map(Value::Bool),
        FieldKind::Enum(enum_kind) => enum_variant(*enum_kind, raw).map(Value::from),
        FieldKind::Rating => serde_json::to_value(ChallengeRating::from_json(raw))
            .map_err(|err| err.to_string()),
        FieldKind::TextList => Ok(Value::Array(
            text_items(raw).into_iter().map(Value::String).collect(),
        )),
        FieldKind::EnumList(enum_kind) => text_items(raw)
            .iter()
            .map(|item| enum_kind.parse(item).map(Value::from).ok_or_else(|| not_a(*enum_kind, item)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        FieldKind::IntMap => int_map(raw),
        FieldKind::Composite(validate) => validate(raw.clone()).map_err(|err| err.to_string()),
        FieldKind::Object(children) => object(children, raw),
    }
}

/// Text form of a scalar; strings are returned without JSON quoting.
pub(crate) fn text_of(raw: &Value) -> String {
    match raw {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Strings from an array, or the comma-separated parts of a string.
pub(crate) fn text_items(raw: &Value) -> Vec<String> {
    match raw {
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(text_of)
            .collect(),
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_owned)
            .collect(),
        Value::Null => Vec::new(),
        other => vec![text_of(other)],
    }
}

pub(crate) fn not_a(kind: EnumKind, input: &str) -> String {
    format!("'{input}' is not a valid {}", kind.label())
}

fn integer(raw: &Value) -> Result<i64, String> {
    match raw {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(|float| float.to_string().parse().ok()))
            .ok_or_else(|| format!("{number} is not a whole number")),
        Value::String(text) => leading_number(text)
            .and_then(|token| token.parse().ok())
            .ok_or_else(|| format!("'{text}' is not a whole number")),
        other => Err(format!("{other} is not a whole number")),
    }
}

fn number(raw: &Value) -> Result<Number, String> {
    let parsed = match raw {
        Value::Number(number) => return Ok(number.clone()),
        Value::String(text) => leading_number(text).and_then(|token| token.parse::<f64>().ok()),
        _ => None,
    };
    parsed
        .and_then(Number::from_f64)
        .ok_or_else(|| format!("{} is not a number", text_of(raw)))
}

fn boolean(raw: &Value) -> Result<bool, String> {
    match raw {
        Value::Bool(flag) => Ok(*flag),
        Value::String(text) if text.trim().eq_ignore_ascii_case("true") => Ok(true),
        Value::String(text) if text.trim().eq_ignore_ascii_case("false") => Ok(false),
        other => Err(format!("{} is not a boolean", text_of(other))),
    }
}

fn enum_variant(kind: EnumKind, raw: &Value) -> Result<&'static str, String> {
    let text = text_of(raw);
    kind.parse(&text).ok_or_else(|| not_a(kind, &text))
}

fn int_map(raw: &Value) -> Result<Value, String> {
    let Value::Object(entries) = raw else {
        return Err(format!("{} is not an object of whole numbers", text_of(raw)));
    };
    let mut coerced = Map::new();
    for (key, value) in entries.iter().filter(|(_, value)| !value.is_null()) {
        let number = integer(value).map_err(|err| format!("{key}: {err}"))?;
        coerced.insert(key.clone(), Value::from(number));
    }
    Ok(Value::Object(coerced))
}

fn object(children: &[FieldSpec], raw: &Value) -> Result<Value, String> {
    let Value::Object(entries) = raw else {
        return Err(format!("{} is not an object", text_of(raw)));
    };
    let mut coerced = Map::new();
    for (key, value) in entries.iter().filter(|(_, value)| !value.is_null()) {
        let Some(spec) = children.iter().find(|spec| spec.matches(key)) else {
            continue;
        };
        let child = coerce(&spec.kind, value).map_err(|err| format!("{key}: {err}"))?;
        coerced.insert(spec.name.to_owned(), child);
    }
    Ok(Value::Object(coerced))
}

/// The leading signed decimal token of `text`, so `30 ft.` yields `30`.
fn leading_number(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let end = trimmed
        .char_indices()
        .find(|&(index, ch)| {
            !(ch.is_ascii_digit() || ch == '.' || (index == 0 && matches!(ch, '+' | '-')))
        })
        .map_or(trimmed.len(), |(index, _)| index);
    trimmed.get(..end).filter(|token| !token.is_empty())
}
