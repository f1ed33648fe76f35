// ABOUTME: Restricted JSONPath evaluation over parsed response bodies

use crate::error::ScriptError;
use crate::value::Value;

/// Supported path steps: root `$`, `.field`, `[N]`, and the predicate
/// filter `[?(@.field OP value)]` with `==`, `!=`, `>`, `<`. A field step
/// after a filter projects over the filtered set.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(usize),
    Filter {
        field: String,
        op: FilterOp,
        value: serde_json::Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
}

/// Evaluate a jsonpath-lite query against a parsed JSON document. A filter
/// yielding exactly one result unwraps to the scalar; multiple results
/// yield an array; no match yields null.
pub fn query(root: &serde_json::Value, path: &str) -> Result<Value, ScriptError> {
    let segments = parse_path(path)?;

    // The cursor is a single node until a filter widens it to a match set.
    let mut single: Option<&serde_json::Value> = Some(root);
    let mut multi: Option<Vec<&serde_json::Value>> = None;

    for segment in &segments {
        match segment {
            Segment::Field(name) => {
                if let Some(set) = multi.take() {
                    multi = Some(set.iter().filter_map(|v| v.get(name)).collect());
                } else {
                    single = single.and_then(|v| v.get(name));
                }
            }
            Segment::Index(idx) => {
                if let Some(set) = multi.take() {
                    multi = Some(set.iter().filter_map(|v| v.get(idx)).collect());
                } else {
                    single = single.and_then(|v| v.get(idx));
                }
            }
            Segment::Filter { field, op, value } => {
                let candidates: Vec<&serde_json::Value> = if let Some(set) = multi.take() {
                    set
                } else {
                    match single.take() {
                        Some(serde_json::Value::Array(items)) => items.iter().collect(),
                        _ => Vec::new(),
                    }
                };
                multi = Some(
                    candidates
                        .into_iter()
                        .filter(|item| {
                            item.get(field)
                                .map(|actual| filter_matches(actual, *op, value))
                                .unwrap_or(false)
                        })
                        .collect(),
                );
            }
        }

        if single.is_none() && multi.is_none() {
            break;
        }
    }

    if let Some(set) = multi {
        return Ok(match set.len() {
            0 => Value::Null,
            1 => Value::from_json(set[0]),
            _ => Value::Array(set.iter().map(|v| Value::from_json(v)).collect()),
        });
    }
    Ok(single.map(Value::from_json).unwrap_or(Value::Null))
}

/// Numeric comparison when both sides are numbers, string otherwise.
fn filter_matches(actual: &serde_json::Value, op: FilterOp, expected: &serde_json::Value) -> bool {
    if let (Some(a), Some(e)) = (actual.as_f64(), expected.as_f64()) {
        return match op {
            FilterOp::Eq => a == e,
            FilterOp::Ne => a != e,
            FilterOp::Gt => a > e,
            FilterOp::Lt => a < e,
        };
    }

    let a = json_as_string(actual);
    let e = json_as_string(expected);
    match op {
        FilterOp::Eq => a == e,
        FilterOp::Ne => a != e,
        FilterOp::Gt => a > e,
        FilterOp::Lt => a < e,
    }
}

fn json_as_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_path(path: &str) -> Result<Vec<Segment>, ScriptError> {
    let bad = |msg: &str| ScriptError::semantic(format!("jsonpath '{}': {}", path, msg));

    let mut rest = path
        .strip_prefix('$')
        .ok_or_else(|| bad("must start with '$'"))?;

    let mut segments = Vec::new();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after
                .find(|c: char| c == '.' || c == '[')
                .unwrap_or(after.len());
            if end == 0 {
                return Err(bad("empty field name"));
            }
            segments.push(Segment::Field(after[..end].to_string()));
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix("[?(") {
            let close = after.find(")]").ok_or_else(|| bad("unterminated filter"))?;
            segments.push(parse_filter(&after[..close]).map_err(|m| bad(&m))?);
            rest = &after[close + 2..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or_else(|| bad("unterminated index"))?;
            let idx = after[..close]
                .trim()
                .parse::<usize>()
                .map_err(|_| bad("index must be a non-negative integer"))?;
            segments.push(Segment::Index(idx));
            rest = &after[close + 1..];
        } else {
            return Err(bad("expected '.' or '['"));
        }
    }

    Ok(segments)
}

/// The inside of `[?(` ... `)]`: `@.field OP value`.
fn parse_filter(body: &str) -> Result<Segment, String> {
    let body = body.trim();
    let after_at = body
        .strip_prefix("@.")
        .ok_or_else(|| "filter must start with '@.'".to_string())?;

    for (text, op) in [
        ("==", FilterOp::Eq),
        ("!=", FilterOp::Ne),
        (">", FilterOp::Gt),
        ("<", FilterOp::Lt),
    ] {
        if let Some(pos) = after_at.find(text) {
            let field = after_at[..pos].trim().to_string();
            if field.is_empty() {
                return Err("empty filter field".to_string());
            }
            let raw = after_at[pos + text.len()..].trim();
            return Ok(Segment::Filter {
                field,
                op,
                value: parse_filter_value(raw),
            });
        }
    }

    Err("filter needs one of ==, !=, >, <".to_string())
}

fn parse_filter_value(raw: &str) -> serde_json::Value {
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
    if let Some(s) = unquoted {
        return serde_json::Value::String(s.to_string());
    }
    if let Ok(n) = raw.parse::<f64>() {
        if let Some(num) = serde_json::Number::from_f64(n) {
            return serde_json::Value::Number(num);
        }
    }
    serde_json::Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> serde_json::Value {
        serde_json::from_str(
            r#"{
                "user": {"id": 42, "name": "ada"},
                "items": [
                    {"sku": "a1", "price": 10, "tag": "new"},
                    {"sku": "b2", "price": 25, "tag": "sale"},
                    {"sku": "c3", "price": 7, "tag": "sale"}
                ],
                "tags": ["x", "y"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_field_chain() {
        assert_eq!(query(&doc(), "$.user.id").unwrap(), Value::Number(42.0));
        assert_eq!(
            query(&doc(), "$.user.name").unwrap(),
            Value::Str("ada".into())
        );
    }

    #[test]
    fn test_array_index() {
        assert_eq!(
            query(&doc(), "$.items[1].sku").unwrap(),
            Value::Str("b2".into())
        );
        assert_eq!(query(&doc(), "$.tags[0]").unwrap(), Value::Str("x".into()));
    }

    #[test]
    fn test_missing_path_is_null() {
        assert_eq!(query(&doc(), "$.nope.deep").unwrap(), Value::Null);
        assert_eq!(query(&doc(), "$.items[99]").unwrap(), Value::Null);
    }

    #[test]
    fn test_filter_single_result_unwraps() {
        assert_eq!(
            query(&doc(), "$.items[?(@.sku == \"b2\")].price").unwrap(),
            Value::Number(25.0)
        );
    }

    #[test]
    fn test_filter_multiple_results_yield_array() {
        let result = query(&doc(), "$.items[?(@.tag == \"sale\")].sku").unwrap();
        assert_eq!(
            result,
            Value::Array(vec![Value::Str("b2".into()), Value::Str("c3".into())])
        );
    }

    #[test]
    fn test_filter_numeric_comparison() {
        assert_eq!(
            query(&doc(), "$.items[?(@.price > 20)].sku").unwrap(),
            Value::Str("b2".into())
        );
        let cheap = query(&doc(), "$.items[?(@.price < 11)].sku").unwrap();
        assert_eq!(
            cheap,
            Value::Array(vec![Value::Str("a1".into()), Value::Str("c3".into())])
        );
    }

    #[test]
    fn test_filter_no_match_is_null() {
        assert_eq!(
            query(&doc(), "$.items[?(@.price > 999)]").unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_root_returns_whole_document() {
        match query(&doc(), "$").unwrap() {
            Value::Map(map) => assert!(map.contains_key("user")),
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_paths_error() {
        assert!(query(&doc(), "user.id").is_err());
        assert!(query(&doc(), "$.items[x]").is_err());
        assert!(query(&doc(), "$.items[?(price > 1)]").is_err());
    }
}
