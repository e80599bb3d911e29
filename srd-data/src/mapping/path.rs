//! Dot-path lookup and assignment on JSON trees.

use serde_json::{Map, Value};

/// Resolve `path` inside `record`, descending into objects by key and into
/// arrays by numeric index.
///
/// Returns `None` when any segment is missing or the final value is `null`.
pub(crate) fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for segment in path.split('.').map(str::trim) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!current.is_null()).then_some(current)
}

/// Store `value` at `path`, creating intermediate objects as needed.
///
/// A non-object value sitting where an intermediate object is required is
/// replaced.
pub(crate) fn assign(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = root;
    for segment in parents {
        let slot = current
            .entry((*segment).to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert((*last).to_owned(), value);
}
