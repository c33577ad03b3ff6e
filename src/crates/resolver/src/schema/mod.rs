//! Canonical schema trees
//!
//! Parameter and body specifications arrive loosely typed and possibly
//! nested. [`normalize`] turns them into an [`ObjectSchema`], which renders
//! to JSON Schema for prompts ([`to_json_schema`]), exports back to the
//! descriptor format ([`to_descriptors`]) and validates generated values
//! ([`conform`]).

mod conform;
mod normalizer;
mod render;

pub use conform::conform;
pub use normalizer::{normalize, Normalizer, MAX_DEPTH};
pub use render::{properties_schema, to_descriptors, to_json_schema, FIELD_INSTRUCTION};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from normalizing a specification or validating a value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Schema nesting exceeds {max} levels at '{path}'")]
    TooDeep { path: String, max: usize },

    #[error("Unknown schema reference '{0}'")]
    UnknownReference(String),

    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Field '{path}' expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },
}

/// Primitive value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Integer,
    Number,
    Boolean,
    String,
    Null,
}

impl ScalarKind {
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "integer" => Some(ScalarKind::Integer),
            "number" => Some(ScalarKind::Number),
            "boolean" => Some(ScalarKind::Boolean),
            "string" => Some(ScalarKind::String),
            "null" => Some(ScalarKind::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Integer => "integer",
            ScalarKind::Number => "number",
            ScalarKind::Boolean => "boolean",
            ScalarKind::String => "string",
            ScalarKind::Null => "null",
        }
    }
}

/// A node of the canonical tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Scalar(ScalarKind),
    Object(ObjectSchema),
    /// List of items; `None` when the item shape is unknown
    Array(Option<Box<SchemaNode>>),
    /// Value may be null
    Optional(Box<SchemaNode>),
    /// Any of several scalar kinds
    Union(Vec<ScalarKind>),
}

impl SchemaNode {
    pub fn optional(inner: SchemaNode) -> Self {
        match inner {
            already @ SchemaNode::Optional(_) => already,
            other => SchemaNode::Optional(Box::new(other)),
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, SchemaNode::Optional(_) | SchemaNode::Scalar(ScalarKind::Null))
    }
}

/// Named object with ordered fields. No fields means an open object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    pub name: String,
    pub fields: Vec<Field>,
}

impl ObjectSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.required)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
    pub node: SchemaNode,
}

impl Field {
    /// Whether an absent or null value is acceptable.
    pub fn accepts_absent(&self) -> bool {
        !self.required || self.node.is_optional()
    }
}
