use super::{ObjectSchema, ScalarKind, SchemaError, SchemaNode};
use serde_json::{Map, Number, Value};
use tracing::debug;

/// Check a generated value against a schema and return its conforming form.
///
/// Required fields must be present. Nulls are dropped from optional fields.
/// Unknown fields are pruned from objects that declare fields; objects
/// without declared fields accept anything. Scalars are coerced where the
/// intent is unambiguous (`"3"` for an integer, `3.0` for an integer, any
/// scalar for a string).
pub fn conform(schema: &ObjectSchema, value: &Value) -> Result<Value, SchemaError> {
    conform_object(schema, value, "")
}

fn conform_object(schema: &ObjectSchema, value: &Value, path: &str) -> Result<Value, SchemaError> {
    let map = match value {
        Value::Object(map) => map,
        Value::Null => {
            return match schema.required_fields().find(|f| !f.accepts_absent()) {
                Some(field) => Err(SchemaError::MissingField(join(path, &field.name))),
                None => Ok(Value::Object(Map::new())),
            }
        }
        other => return Err(mismatch(path, "object", other)),
    };

    if schema.is_empty() {
        return Ok(value.clone());
    }

    let mut conformed = Map::new();
    for field in &schema.fields {
        let field_path = join(path, &field.name);
        match map.get(&field.name) {
            None | Some(Value::Null) => {
                if !field.accepts_absent() {
                    return Err(SchemaError::MissingField(field_path));
                }
            }
            Some(present) => {
                conformed.insert(field.name.clone(), conform_node(&field.node, present, &field_path)?);
            }
        }
    }

    for key in map.keys().filter(|k| schema.field(k).is_none()) {
        debug!(field = %join(path, key), "Pruning undeclared field");
    }

    Ok(Value::Object(conformed))
}

fn conform_node(node: &SchemaNode, value: &Value, path: &str) -> Result<Value, SchemaError> {
    match node {
        SchemaNode::Optional(_) if value.is_null() => Ok(Value::Null),
        SchemaNode::Optional(inner) => conform_node(inner, value, path),
        SchemaNode::Scalar(kind) => {
            coerce(*kind, value).ok_or_else(|| mismatch(path, kind.as_str(), value))
        }
        SchemaNode::Union(kinds) => kinds
            .iter()
            .find_map(|kind| exact(*kind, value))
            .or_else(|| kinds.iter().find_map(|kind| coerce(*kind, value)))
            .ok_or_else(|| {
                let expected: Vec<&str> = kinds.iter().map(ScalarKind::as_str).collect();
                mismatch(path, &expected.join(" | "), value)
            }),
        SchemaNode::Object(object) => conform_object(object, value, path),
        SchemaNode::Array(items) => {
            let Value::Array(elements) = value else {
                return Err(mismatch(path, "array", value));
            };
            match items {
                None => Ok(value.clone()),
                Some(item) => elements
                    .iter()
                    .enumerate()
                    .map(|(i, element)| conform_node(item, element, &format!("{}[{}]", path, i)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
            }
        }
    }
}

fn exact(kind: ScalarKind, value: &Value) -> Option<Value> {
    let matches = match (kind, value) {
        (ScalarKind::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
        (ScalarKind::Number, Value::Number(_)) => true,
        (ScalarKind::Boolean, Value::Bool(_)) => true,
        (ScalarKind::String, Value::String(_)) => true,
        (ScalarKind::Null, Value::Null) => true,
        _ => false,
    };
    matches.then(|| value.clone())
}

fn coerce(kind: ScalarKind, value: &Value) -> Option<Value> {
    if let Some(exact) = exact(kind, value) {
        return Some(exact);
    }

    match (kind, value) {
        (ScalarKind::Integer, Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| Value::Number(Number::from(f as i64))),
        (ScalarKind::Integer, Value::String(s)) => {
            s.trim().parse::<i64>().ok().map(|i| Value::Number(Number::from(i)))
        }
        (ScalarKind::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        (ScalarKind::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (ScalarKind::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ScalarKind::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn mismatch(path: &str, expected: &str, found: &Value) -> SchemaError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    SchemaError::TypeMismatch {
        path: if path.is_empty() { "<root>".to_string() } else { path.to_string() },
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::normalize;
    use serde_json::json;

    fn ab_c() -> ObjectSchema {
        normalize(
            &json!([
                {"name": "a", "schema": {"type": "string"}},
                {"name": "b", "schema": {"type": "integer"}},
                {"name": "c", "required": false, "schema": {"type": "boolean"}}
            ]),
            "M",
        )
        .unwrap()
    }

    #[test]
    fn test_required_fields_enforced() {
        let schema = ab_c();
        assert!(conform(&schema, &json!({"a": "x", "b": 1})).is_ok());
        assert!(conform(&schema, &json!({"a": "x", "b": 1, "c": true})).is_ok());

        assert_eq!(
            conform(&schema, &json!({"a": "x"})).unwrap_err(),
            SchemaError::MissingField("b".into())
        );
        assert_eq!(
            conform(&schema, &json!({"b": 2, "c": false})).unwrap_err(),
            SchemaError::MissingField("a".into())
        );
        assert!(conform(&schema, &json!({"a": null, "b": 1})).is_err());
    }

    #[test]
    fn test_unknown_fields_pruned_and_nulls_dropped() {
        let out = conform(&ab_c(), &json!({"a": "x", "b": 1, "c": null, "zzz": 9})).unwrap();
        assert_eq!(out, json!({"a": "x", "b": 1}));
    }

    #[test]
    fn test_scalar_coercion() {
        let out = conform(&ab_c(), &json!({"a": 42, "b": "7", "c": "TRUE"})).unwrap();
        assert_eq!(out, json!({"a": "42", "b": 7, "c": true}));

        let out = conform(&ab_c(), &json!({"a": "x", "b": 3.0})).unwrap();
        assert_eq!(out["b"], json!(3));

        assert!(matches!(
            conform(&ab_c(), &json!({"a": "x", "b": "seven"})).unwrap_err(),
            SchemaError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_integer_accepted_for_number() {
        let schema = normalize(&json!([{"name": "price", "schema": "number"}]), "M").unwrap();
        assert_eq!(conform(&schema, &json!({"price": 5})).unwrap(), json!({"price": 5}));
    }

    #[test]
    fn test_open_object_accepts_anything() {
        let schema = normalize(&json!([{"name": "meta", "schema": "object"}]), "M").unwrap();
        let value = json!({"meta": {"anything": [1, 2], "goes": true}});
        assert_eq!(conform(&schema, &value).unwrap(), value);
    }

    #[test]
    fn test_union_and_nested_paths() {
        let schema = normalize(
            &json!([
                {"name": "id", "schema": {"anyOf": [{"type": "integer"}, {"type": "string"}, {"type": "null"}]}},
                {"name": "items", "schema": {"type": "array", "items": {"type": "object", "properties": [
                    {"name": "qty", "schema": "integer"}
                ]}}}
            ]),
            "M",
        )
        .unwrap();

        let out = conform(&schema, &json!({"id": "abc", "items": [{"qty": 1}, {"qty": "2"}]})).unwrap();
        assert_eq!(out, json!({"id": "abc", "items": [{"qty": 1}, {"qty": 2}]}));

        match conform(&schema, &json!({"items": [{"qty": 1}, {}]})).unwrap_err() {
            SchemaError::MissingField(path) => assert_eq!(path, "items[1].qty"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_non_object_root_rejected() {
        assert!(matches!(
            conform(&ab_c(), &json!([1, 2])).unwrap_err(),
            SchemaError::TypeMismatch { .. }
        ));
        assert_eq!(
            conform(&ObjectSchema::new("Empty"), &Value::Null).unwrap(),
            json!({})
        );
    }
}
