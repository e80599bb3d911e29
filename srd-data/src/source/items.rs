//! Extraction of record arrays and next-page links from response bodies.

use serde_json::Value;
use srd_core::FetchConfig;

use super::SourceError;

/// Records held by `document` according to `fetch`.
///
/// The items path is followed first. An array there yields its elements and
/// an object yields itself as one record. When the path is missing, a root
/// array is used as-is and a root object counts as one record.
pub(crate) fn extract_items(
    document: Value,
    fetch: &FetchConfig,
    location: &str,
) -> Result<Vec<Value>, SourceError> {
    let path = fetch.items_path();
    let found = if path.is_empty() {
        Some(&document)
    } else {
        path.iter()
            .try_fold(&document, |current, segment| current.get(*segment))
            .filter(|value| !value.is_null())
    };

    match found {
        Some(Value::Array(items)) => return Ok(items.clone()),
        Some(value) if value.is_object() => return Ok(vec![value.clone()]),
        Some(_) => return Err(not_an_array(location, fetch)),
        None => {}
    }

    match document {
        Value::Array(items) => Ok(items),
        Value::Object(_) if document_is_page(&document, fetch) => Ok(Vec::new()),
        Value::Object(_) => Ok(vec![document]),
        _ => Err(not_an_array(location, fetch)),
    }
}

fn not_an_array(location: &str, fetch: &FetchConfig) -> SourceError {
    SourceError::ItemsNotArray {
        location: location.to_owned(),
        field: fetch.items_field.clone(),
    }
}

/// The next-page link in `document`, if any.
pub(crate) fn next_page(document: &Value, fetch: &FetchConfig) -> Option<String> {
    let field = fetch.next_page_field.as_deref()?;
    document
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|link| !link.is_empty())
        .map(str::to_owned)
}

/// Keys a page envelope may carry besides the items and next-page fields.
const ENVELOPE_KEYS: &[&str] = &["count", "previous"];

/// Whether an object without usable items is an empty page envelope, such
/// as `{"count": 0, "next": null}`, rather than a lone record that happens to
/// carry a next-page key.
fn document_is_page(document: &Value, fetch: &FetchConfig) -> bool {
    let Some(next_field) = fetch.next_page_field.as_deref() else {
        return false;
    };
    let Some(object) = document.as_object() else {
        return false;
    };
    let items_key = fetch.items_path().first().copied();
    object.contains_key(next_field)
        && object.keys().all(|key| {
            key == next_field
                || Some(key.as_str()) == items_key
                || ENVELOPE_KEYS.contains(&key.as_str())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn fetch(items: &str) -> FetchConfig {
        FetchConfig::new("monsters.json").with_items_field(items)
    }

    #[rstest]
    #[case(json!({"results": [{"slug": "a"}, {"slug": "b"}]}), "results", 2)]
    #[case(json!({"data": {"monsters": [{"slug": "a"}]}}), "data.monsters", 1)]
    #[case(json!([{"slug": "a"}, {"slug": "b"}, {"slug": "c"}]), "results", 3)]
    #[case(json!([{"slug": "a"}]), "$", 1)]
    #[case(json!({"slug": "lonely"}), "results", 1)]
    #[case(json!({"results": {"slug": "single"}}), "results", 1)]
    #[case(json!({"count": 0, "next": null, "results": null}), "results", 0)]
    #[case(json!({"count": 0, "next": null, "previous": null}), "results", 0)]
    #[case(json!({"slug": "misty-step", "name": "Misty Step", "next": null}), "results", 1)]
    fn extracts_records_from_common_shapes(
        #[case] document: Value,
        #[case] items: &str,
        #[case] expected: usize,
    ) {
        let records = extract_items(document, &fetch(items), "test").expect("records");
        assert_eq!(records.len(), expected);
    }

    #[rstest]
    #[case(json!({"results": "nope"}))]
    #[case(json!("just text"))]
    fn rejects_scalar_item_fields(#[case] document: Value) {
        let err = extract_items(document, &fetch("results"), "test").expect_err("scalar");
        assert!(matches!(err, SourceError::ItemsNotArray { .. }));
    }

    #[rstest]
    #[case(json!({"next": "https://example.test/?page=2"}), Some("https://example.test/?page=2"))]
    #[case(json!({"next": null}), None)]
    #[case(json!({"next": ""}), None)]
    #[case(json!({}), None)]
    fn reads_next_page_links(#[case] document: Value, #[case] expected: Option<&str>) {
        assert_eq!(next_page(&document, &fetch("results")).as_deref(), expected);
    }

    #[rstest]
    fn pagination_can_be_disabled() {
        let config = fetch("results").with_next_page_field(None);
        assert_eq!(next_page(&json!({"next": "/page/2"}), &config), None);
    }
}
