//! Tolerant decoding of list responses.
//!
//! The backend does not commit to a single envelope for list endpoints: the
//! same deployment returns `[...]`, `{data: [...]}`, `{data: {data: [...],
//! total}}`, a doubly nested variant, and occasionally `{rows: [...],
//! total}` depending on the resource. Every list screen must still render,
//! so decoding never fails: the worst malformed payload degrades to an
//! empty, well-formed page.

use serde_json::Value;

use crate::query::ListPage;

/// Sibling keys that may carry the matching-record count, in precedence
/// order.
const TOTAL_KEYS: &[&str] = &["total", "count", "totalRecords", "total_records"];

/// Keys that make a bare object look like a single entity rather than an
/// envelope.
const NAME_KEYS: &[&str] = &["name", "first_name", "full_name", "title", "product_name"];

/// How many `data` levels to unwrap before giving up. The deepest shape
/// seen in production is `data.data.data`.
const MAX_DATA_DEPTH: usize = 3;

/// Decodes an arbitrary list-endpoint payload into a [`ListPage`].
///
/// Shape precedence, first match wins:
/// 1. the value itself, `.data`, `.data.data` or `.data.data.data` is an
///    array; its enclosing object's `total`/`count`/`totalRecords` sibling
///    supplies the total, else the row count;
/// 2. one of those containers exposes a `rows` array, with the same total
///    resolution against the container itself;
/// 3. a bare object carrying an `id` and a name-like field is a one-row
///    result;
/// 4. anything else is an empty page.
///
/// Numeric fields that arrive as strings are coerced, defaulting to zero.
/// Rows beyond the page limit are dropped, so `rows.len()` never exceeds
/// `limit`. This function never panics and never returns a malformed page.
pub fn normalize(raw: &Value, expected_limit: u32) -> ListPage<Value> {
    let limit = expected_limit.max(1);

    let mut containers: Vec<&Value> = vec![raw];
    let mut current = raw;
    for _ in 0..MAX_DATA_DEPTH {
        match current.get("data") {
            Some(inner) => {
                containers.push(inner);
                current = inner;
            }
            None => break,
        }
    }

    for (depth, candidate) in containers.iter().enumerate() {
        if let Value::Array(rows) = candidate {
            // The total lives beside the array, one level up.
            let parent = depth.checked_sub(1).map(|i| containers[i]);
            return page_from(rows, parent, limit);
        }
    }

    for candidate in &containers {
        if let Some(Value::Array(rows)) = candidate.get("rows") {
            return page_from(rows, Some(candidate), limit);
        }
    }

    if let Value::Object(map) = raw {
        let looks_like_entity =
            map.contains_key("id") && NAME_KEYS.iter().any(|key| map.contains_key(*key));
        if looks_like_entity {
            return ListPage {
                rows: vec![raw.clone()],
                total: 1,
                page: 1,
                limit,
            };
        }
    }

    if !raw.is_null() {
        tracing::debug!("unrecognised list envelope, returning empty page");
    }
    ListPage::empty(limit)
}

fn page_from(rows: &[Value], container: Option<&Value>, limit: u32) -> ListPage<Value> {
    let total = container
        .and_then(total_field)
        .unwrap_or(rows.len() as u64);
    let page = container
        .and_then(|c| c.get("page"))
        .map(|v| coerce_u64(v).max(1) as u32)
        .unwrap_or(1);
    let limit = container
        .and_then(|c| c.get("limit"))
        .map(|v| coerce_u64(v) as u32)
        .filter(|l| *l > 0)
        .unwrap_or(limit);

    // An over-full response is clamped so a page never carries more rows
    // than its limit.
    let mut rows = rows.to_vec();
    rows.truncate(limit as usize);

    ListPage {
        rows,
        total,
        page,
        limit,
    }
}

fn total_field(container: &Value) -> Option<u64> {
    TOTAL_KEYS
        .iter()
        .find_map(|key| container.get(*key))
        .map(coerce_u64)
}

/// Coerces a JSON value to a count, defaulting to zero for anything that is
/// not a non-negative number or a parsable numeric string.
pub fn coerce_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn three_rows() -> Value {
        json!([{"id": 1}, {"id": 2}, {"id": 3}])
    }

    #[test]
    fn decodes_bare_array() {
        let page = normalize(&three_rows(), 10);
        assert_eq!(page.rows.len(), 3);
        assert_eq!(page.total, 3);
    }

    #[test]
    fn decodes_data_array_with_sibling_total() {
        let raw = json!({"data": three_rows(), "total": 37});
        let page = normalize(&raw, 10);
        assert_eq!(page.rows.len(), 3);
        assert_eq!(page.total, 37);
    }

    #[test]
    fn decodes_nested_data_envelope() {
        let raw = json!({"data": {"data": three_rows(), "total": 37}});
        let page = normalize(&raw, 10);
        assert_eq!(page.rows.len(), 3);
        assert_eq!(page.total, 37);
    }

    #[test]
    fn decodes_doubly_nested_data_envelope() {
        let raw = json!({"data": {"data": {"data": three_rows(), "total": 37}}});
        let page = normalize(&raw, 10);
        assert_eq!(page.rows.len(), 3);
        assert_eq!(page.total, 37);
    }

    #[test]
    fn decodes_rows_envelope() {
        let raw = json!({"rows": three_rows(), "total": 37});
        let page = normalize(&raw, 10);
        assert_eq!(page.rows.len(), 3);
        assert_eq!(page.total, 37);
    }

    #[test]
    fn coerces_stringified_total() {
        let raw = json!({"data": three_rows(), "total": "37"});
        assert_eq!(normalize(&raw, 10).total, 37);

        let raw = json!({"data": three_rows(), "total": "not a number"});
        assert_eq!(normalize(&raw, 10).total, 0);
    }

    #[test]
    fn falls_back_to_count_and_total_records() {
        let raw = json!({"data": three_rows(), "count": 12});
        assert_eq!(normalize(&raw, 10).total, 12);

        let raw = json!({"data": three_rows(), "totalRecords": 9});
        assert_eq!(normalize(&raw, 10).total, 9);
    }

    #[test]
    fn bare_entity_becomes_single_row() {
        let raw = json!({"id": 7, "name": "Room 1"});
        let page = normalize(&raw, 10);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.total, 1);
        assert_eq!(page.rows[0]["name"], "Room 1");
    }

    #[test]
    fn never_fails_on_malformed_input() {
        for raw in [
            Value::Null,
            json!({}),
            json!({"data": {"data": {}}}),
            json!({"id": 3}),
            json!("just a string"),
            json!(42),
            json!({"data": {"message": "server is unwell"}}),
        ] {
            let page = normalize(&raw, 10);
            assert!(page.rows.is_empty());
            assert_eq!(page.total, 0);
            assert_eq!(page.limit, 10);
        }
    }

    #[test]
    fn over_full_response_is_clamped_to_the_limit() {
        let rows: Vec<Value> = (1..=20).map(|i| json!({"id": i})).collect();
        let raw = json!({"data": rows, "total": 20});

        let page = normalize(&raw, 10);
        assert_eq!(page.rows.len(), 10);
        assert_eq!(page.total, 20);
        assert_eq!(page.summary(), "Showing 1-10 of 20");
    }

    #[test]
    fn picks_up_page_and_limit_from_container() {
        let raw = json!({"data": {"data": three_rows(), "total": 37, "page": "2", "limit": 3}});
        let page = normalize(&raw, 10);
        assert_eq!(page.page, 2);
        assert_eq!(page.limit, 3);
    }
}
