use super::{ObjectSchema, SchemaNode};
use serde_json::{json, Map, Value};

/// Appended to every property description shown to the model.
pub const FIELD_INSTRUCTION: &str =
    "Generate a value for this particular parameter using the user query.";

/// Render as a JSON Schema object for prompts and tool parameters.
pub fn to_json_schema(schema: &ObjectSchema) -> Value {
    let required: Vec<&str> = schema.required_fields().map(|f| f.name.as_str()).collect();

    let mut rendered = json!({
        "title": schema.name,
        "type": "object",
        "properties": properties_schema(schema),
        "required": required,
    });
    if schema.is_empty() {
        rendered["additionalProperties"] = Value::Bool(true);
    }
    rendered
}

/// Just the `properties` map of [`to_json_schema`].
pub fn properties_schema(schema: &ObjectSchema) -> Value {
    let mut properties = Map::new();
    for field in &schema.fields {
        let mut property = node_schema(&field.node);
        let description = match field.description.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => format!("{} {}", text, FIELD_INSTRUCTION),
            _ => FIELD_INSTRUCTION.to_string(),
        };
        property["description"] = Value::String(description);
        properties.insert(field.name.clone(), property);
    }
    Value::Object(properties)
}

fn node_schema(node: &SchemaNode) -> Value {
    match node {
        SchemaNode::Scalar(kind) => json!({ "type": kind.as_str() }),
        SchemaNode::Object(object) => to_json_schema(object),
        SchemaNode::Array(None) => json!({ "type": "array" }),
        SchemaNode::Array(Some(items)) => json!({ "type": "array", "items": node_schema(items) }),
        SchemaNode::Optional(inner) => json!({ "anyOf": [node_schema(inner), { "type": "null" }] }),
        SchemaNode::Union(kinds) => json!({
            "anyOf": kinds.iter().map(|k| json!({ "type": k.as_str() })).collect::<Vec<_>>()
        }),
    }
}

/// Export back to the descriptor-list format accepted by
/// [`normalize`](super::normalize). Normalizing the export yields an equal
/// tree.
pub fn to_descriptors(schema: &ObjectSchema) -> Value {
    Value::Array(
        schema
            .fields
            .iter()
            .map(|field| {
                let mut descriptor = json!({
                    "name": field.name,
                    "required": field.required,
                    "schema": export_node(&field.node),
                });
                if let Some(description) = &field.description {
                    descriptor["description"] = Value::String(description.clone());
                }
                descriptor
            })
            .collect(),
    )
}

fn export_node(node: &SchemaNode) -> Value {
    match node {
        SchemaNode::Scalar(kind) => json!({ "type": kind.as_str() }),
        SchemaNode::Object(object) => json!({
            "type": "object",
            "title": object.name,
            "properties": to_descriptors(object),
        }),
        SchemaNode::Array(None) => json!({ "type": "array" }),
        SchemaNode::Array(Some(items)) => json!({ "type": "array", "items": export_node(items) }),
        SchemaNode::Optional(inner) => json!({ "anyOf": [export_node(inner), { "type": "null" }] }),
        SchemaNode::Union(kinds) => json!({
            "anyOf": kinds.iter().map(|k| json!({ "type": k.as_str() })).collect::<Vec<_>>()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::normalize;

    #[test]
    fn test_json_schema_carries_instruction_suffix() {
        let schema = normalize(
            &json!([
                {"name": "query", "description": "Search text", "schema": "string"},
                {"name": "limit", "required": false, "schema": "integer"}
            ]),
            "RequestParametersModel",
        )
        .unwrap();

        let rendered = to_json_schema(&schema);
        assert_eq!(rendered["title"], "RequestParametersModel");
        assert_eq!(rendered["required"], json!(["query"]));
        assert_eq!(
            rendered["properties"]["query"]["description"],
            format!("Search text {}", FIELD_INSTRUCTION)
        );
        assert_eq!(rendered["properties"]["limit"]["description"], FIELD_INSTRUCTION);
        assert_eq!(rendered["properties"]["limit"]["type"], "integer");
    }

    #[test]
    fn test_optional_renders_any_of_null() {
        let schema = normalize(
            &json!([{"name": "x", "schema": {"anyOf": [{"type": "number"}, {"type": "null"}]}}]),
            "M",
        )
        .unwrap();
        let property = &properties_schema(&schema)["x"];
        assert_eq!(property["anyOf"][0]["type"], "number");
        assert_eq!(property["anyOf"][1]["type"], "null");
    }

    #[test]
    fn test_open_object_allows_additional_properties() {
        let rendered = to_json_schema(&ObjectSchema::new("Open"));
        assert_eq!(rendered["additionalProperties"], true);
    }

    #[test]
    fn test_export_then_normalize_is_identity() {
        let schema = normalize(
            &json!([
                {"name": "a", "description": "first", "schema": "string"},
                {"name": "b", "required": false, "schema": {"type": "object", "properties": [
                    {"name": "c", "schema": {"anyOf": [{"type": "integer"}, {"type": "boolean"}, {"type": "null"}]}}
                ]}},
                {"name": "d", "schema": {"type": "array", "items": {"type": "number"}}}
            ]),
            "M",
        )
        .unwrap();

        let again = normalize(&to_descriptors(&schema), "M").unwrap();
        assert_eq!(again, schema);
    }
}
