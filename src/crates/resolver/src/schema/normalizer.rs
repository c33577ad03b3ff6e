use super::{Field, ObjectSchema, ScalarKind, SchemaError, SchemaNode};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Deepest nesting accepted before a specification is rejected.
pub const MAX_DEPTH: usize = 16;

/// Normalize a raw specification into a named object schema.
///
/// Accepts a descriptor list, a JSON Schema object, or null (no fields).
/// Definitions for `$ref` lookups are read from `definitions`, `$defs` or
/// `components.schemas` on an object input.
pub fn normalize(raw: &Value, model_name: &str) -> Result<ObjectSchema, SchemaError> {
    Normalizer::new()
        .with_definitions(collect_definitions(raw))
        .normalize(raw, model_name)
}

/// Stateful normalizer. Nested objects are memoized by scoped path and named
/// references by `ref:<name>`, so one instance must not be shared between
/// unrelated specifications.
#[derive(Debug, Default)]
pub struct Normalizer {
    definitions: Map<String, Value>,
    memo: HashMap<String, SchemaNode>,
    in_progress: HashSet<String>,
    recursion_note: Option<String>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_definitions(mut self, definitions: Map<String, Value>) -> Self {
        self.definitions = definitions;
        self
    }

    pub fn normalize(&mut self, raw: &Value, model_name: &str) -> Result<ObjectSchema, SchemaError> {
        let fields = match raw {
            Value::Array(items) => self.descriptor_list(items, model_name, 0)?,
            Value::Object(map) if reference_name(map).is_some() => {
                match self.object_node(map, model_name, 0)? {
                    SchemaNode::Object(object) => object.fields,
                    _ => Vec::new(),
                }
            }
            Value::Object(map) => match children_of(map) {
                Some(children) => self.children(children, map.get("required"), model_name, 0)?,
                None => Vec::new(),
            },
            _ => Vec::new(),
        };

        Ok(ObjectSchema {
            name: model_name.to_string(),
            fields,
        })
    }

    fn descriptor_list(
        &mut self,
        items: &[Value],
        path: &str,
        depth: usize,
    ) -> Result<Vec<Field>, SchemaError> {
        let mut fields = Vec::with_capacity(items.len());

        for item in items {
            let Some(name) = descriptor_name(item) else {
                debug!(path, "Skipping descriptor without name");
                continue;
            };

            let schema = match item.get("schema") {
                Some(schema) if !is_blank(schema) => schema,
                _ => item,
            };
            let description = text_field(item, "description").or_else(|| text_field(schema, "description"));
            let required = item.get("required").and_then(Value::as_bool).unwrap_or(true);

            fields.push(self.field(name, schema, description, required, path, depth)?);
        }

        Ok(fields)
    }

    fn children(
        &mut self,
        children: &Value,
        required: Option<&Value>,
        path: &str,
        depth: usize,
    ) -> Result<Vec<Field>, SchemaError> {
        match children {
            Value::Array(items) => self.descriptor_list(items, path, depth),
            Value::Object(properties) => {
                let required_list: Option<Vec<&str>> = required
                    .and_then(Value::as_array)
                    .map(|names| names.iter().filter_map(Value::as_str).collect());

                let mut fields = Vec::with_capacity(properties.len());
                for (name, schema) in properties {
                    let required = match &required_list {
                        Some(names) => names.contains(&name.as_str()),
                        None => schema.get("required").and_then(Value::as_bool).unwrap_or(true),
                    };
                    let description = text_field(schema, "description");
                    fields.push(self.field(name, schema, description, required, path, depth)?);
                }
                Ok(fields)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn field(
        &mut self,
        name: &str,
        schema: &Value,
        description: Option<&str>,
        required: bool,
        parent: &str,
        depth: usize,
    ) -> Result<Field, SchemaError> {
        let path = format!("{}_{}", parent, name);
        let node = self.node(schema, &path, depth + 1)?;

        let description = match (description, self.recursion_note.take()) {
            (Some(text), Some(note)) => Some(format!("{} {}", text, note)),
            (None, Some(note)) => Some(note),
            (text, None) => text.map(str::to_string),
        };

        Ok(Field {
            name: name.to_string(),
            description,
            required,
            node,
        })
    }

    fn node(&mut self, schema: &Value, path: &str, depth: usize) -> Result<SchemaNode, SchemaError> {
        if depth > MAX_DEPTH {
            return Err(SchemaError::TooDeep {
                path: path.to_string(),
                max: MAX_DEPTH,
            });
        }

        match schema {
            Value::String(type_name) => Ok(match type_name.as_str() {
                "object" => SchemaNode::Object(ObjectSchema::new(path)),
                "array" => SchemaNode::Array(None),
                other => SchemaNode::Scalar(ScalarKind::from_type_name(other).unwrap_or(ScalarKind::String)),
            }),
            Value::Object(map) if !map.is_empty() => self.object_node(map, path, depth),
            _ => Ok(SchemaNode::Scalar(ScalarKind::String)),
        }
    }

    fn object_node(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
        depth: usize,
    ) -> Result<SchemaNode, SchemaError> {
        if let Some(name) = reference_name(map) {
            return self.reference(name, depth);
        }

        if let Some(Value::Array(members)) = map.get("anyOf").or_else(|| map.get("oneOf")) {
            return self.union(members, path, depth);
        }

        match map.get("type") {
            Some(Value::Array(types)) => {
                let members: Vec<Value> = types
                    .iter()
                    .map(|type_name| {
                        let mut member = map.clone();
                        member.insert("type".to_string(), type_name.clone());
                        Value::Object(member)
                    })
                    .collect();
                self.union(&members, path, depth)
            }
            Some(Value::String(t)) if t == "object" => self.object(map, path, depth),
            Some(Value::String(t)) if t == "array" => self.array(map, path, depth),
            Some(Value::String(t)) => Ok(SchemaNode::Scalar(
                ScalarKind::from_type_name(t).unwrap_or(ScalarKind::String),
            )),
            _ if children_of(map).is_some() => self.object(map, path, depth),
            _ => Ok(SchemaNode::Scalar(ScalarKind::String)),
        }
    }

    fn object(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
        depth: usize,
    ) -> Result<SchemaNode, SchemaError> {
        if let Some(node) = self.memo.get(path) {
            return Ok(node.clone());
        }

        let fields = match children_of(map) {
            Some(children) => self.children(children, map.get("required"), path, depth)?,
            None => Vec::new(),
        };
        let name = map
            .get("title")
            .and_then(Value::as_str)
            .filter(|title| !title.is_empty())
            .unwrap_or(path)
            .to_string();

        let node = SchemaNode::Object(ObjectSchema { name, fields });
        self.memo.insert(path.to_string(), node.clone());
        Ok(node)
    }

    fn array(
        &mut self,
        map: &Map<String, Value>,
        path: &str,
        depth: usize,
    ) -> Result<SchemaNode, SchemaError> {
        match map.get("items") {
            Some(items) if !is_blank(items) => {
                let item_path = format!("{}_item", path);
                let item = self.node(items, &item_path, depth + 1)?;
                Ok(SchemaNode::Array(Some(Box::new(item))))
            }
            _ => Ok(SchemaNode::Array(None)),
        }
    }

    fn union(&mut self, members: &[Value], path: &str, depth: usize) -> Result<SchemaNode, SchemaError> {
        let non_null: Vec<&Value> = members.iter().filter(|m| !is_null_type(m)).collect();

        match non_null.as_slice() {
            [] => Ok(SchemaNode::Scalar(ScalarKind::Null)),
            [only] => Ok(SchemaNode::optional(self.node(only, path, depth)?)),
            many => {
                let mut nodes = Vec::with_capacity(many.len());
                for member in many {
                    nodes.push(self.node(member, path, depth)?);
                }

                let kinds: Option<Vec<ScalarKind>> = nodes
                    .iter()
                    .map(|node| match node {
                        SchemaNode::Scalar(kind) => Some(*kind),
                        _ => None,
                    })
                    .collect();

                match kinds {
                    Some(kinds) => {
                        let mut distinct: Vec<ScalarKind> = Vec::with_capacity(kinds.len());
                        for kind in kinds {
                            if !distinct.contains(&kind) {
                                distinct.push(kind);
                            }
                        }
                        Ok(match distinct.as_slice() {
                            [single] => SchemaNode::optional(SchemaNode::Scalar(*single)),
                            _ => SchemaNode::optional(SchemaNode::Union(distinct)),
                        })
                    }
                    None => {
                        debug!(path, "Union with composite members keeps the first composite");
                        let composite = nodes
                            .into_iter()
                            .find(|node| !matches!(node, SchemaNode::Scalar(_)))
                            .unwrap_or(SchemaNode::Scalar(ScalarKind::String));
                        Ok(SchemaNode::optional(composite))
                    }
                }
            }
        }
    }

    fn reference(&mut self, name: &str, depth: usize) -> Result<SchemaNode, SchemaError> {
        let key = format!("ref:{}", name);
        if let Some(node) = self.memo.get(&key) {
            return Ok(node.clone());
        }

        if self.in_progress.contains(name) {
            debug!(reference = name, "Flattening recursive reference");
            self.recursion_note = Some(format!(
                "(Recursive reference to {}; provide the nested value as a JSON string.)",
                name
            ));
            return Ok(SchemaNode::optional(SchemaNode::Scalar(ScalarKind::String)));
        }

        let definition = self
            .definitions
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownReference(name.to_string()))?;

        self.in_progress.insert(name.to_string());
        let resolved = self.node(&definition, name, depth + 1);
        self.in_progress.remove(name);

        let mut node = resolved?;
        if let SchemaNode::Object(object) = &mut node {
            object.name = name.to_string();
        }
        self.memo.insert(key, node.clone());
        Ok(node)
    }
}

fn collect_definitions(raw: &Value) -> Map<String, Value> {
    let mut definitions = Map::new();
    let sources = [
        raw.get("definitions"),
        raw.get("$defs"),
        raw.get("components").and_then(|c| c.get("schemas")),
    ];
    for table in sources.into_iter().flatten() {
        if let Some(table) = table.as_object() {
            definitions.extend(table.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    definitions
}

fn children_of(map: &Map<String, Value>) -> Option<&Value> {
    match map.get("properties") {
        Some(properties) if !is_blank(properties) => Some(properties),
        _ => map.get("fields").filter(|fields| !is_blank(fields)),
    }
}

fn reference_name(map: &Map<String, Value>) -> Option<&str> {
    map.get("$ref")
        .or_else(|| map.get("ref"))
        .and_then(Value::as_str)
        .and_then(|reference| reference.rsplit('/').next())
        .filter(|name| !name.is_empty())
}

fn descriptor_name(item: &Value) -> Option<&str> {
    item.get("name")
        .or_else(|| item.get("key"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
}

fn text_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn is_null_type(member: &Value) -> bool {
    match member {
        Value::String(t) => t == "null",
        other => other.get("type").and_then(Value::as_str) == Some("null"),
    }
}
