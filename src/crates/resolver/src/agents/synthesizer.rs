use super::AgentSettings;
use crate::schema::{conform, normalize, properties_schema, ObjectSchema};
use crate::ResolverError;
use llm::{ChatModel, StructuredAgent, ToolSet};
use serde_json::{Map, Value};
use tracing::debug;

const INSTRUCTIONS: &str = "Fill in an HTTP request from the user's query. Follow the schema: \
populate every required field, populate optional fields only when the query mentions them, and \
never add fields the schema does not declare.";

const QUERY_DESCRIPTION: &str = "The input query from which the request parameters and request \
body will be extracted. Ensure that all relevant details for both are captured accurately.";

/// Which part of the request is being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisKind {
    Parameters,
    Body,
}

impl SynthesisKind {
    pub fn model_name(&self) -> &'static str {
        match self {
            SynthesisKind::Parameters => "RequestParametersModel",
            SynthesisKind::Body => "RequestBodyModel",
        }
    }

    fn schema_field(&self) -> &'static str {
        match self {
            SynthesisKind::Parameters => "request_parameters_schema",
            SynthesisKind::Body => "request_body_schema",
        }
    }

    fn output_field(&self) -> &'static str {
        match self {
            SynthesisKind::Parameters => "request_parameters",
            SynthesisKind::Body => "request_body",
        }
    }

    fn schema_description(&self) -> &'static str {
        match self {
            SynthesisKind::Parameters => "Define the parameters required for the request as a query. \
Use this schema specifically to extract and structure the request parameters content in the final output.",
            SynthesisKind::Body => "Provide the schema for the request body. This will be used to \
extract and structure only the request body content in the final output.",
        }
    }

    fn output_description(&self) -> &'static str {
        match self {
            SynthesisKind::Parameters => "A JSON object containing the request parameters with values \
derived from the query. If a request parameters schema is provided, ensure this output is never empty. \
Include only values explicitly mentioned in the query, do not add anything extra. If there is a \
parameter named 'query', use very specific keywords only as the value for that parameter, never use \
the entire user query.",
            SynthesisKind::Body => "A JSON object containing the request body with values derived \
from the query. If a request body schema is provided, this output must never be empty. Include only \
values explicitly mentioned in the query, do not add anything extra.",
        }
    }
}

struct SynthesisInput<'a> {
    kind: SynthesisKind,
    schema: Value,
    query: &'a str,
}

impl SynthesisInput<'_> {
    /// Keyed by the kind-specific schema field name.
    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(self.kind.schema_field().to_string(), self.schema.clone());
        map.insert("query".to_string(), Value::String(self.query.to_string()));
        Value::Object(map)
    }
}

/// Generates request parameters or a request body that fit a schema.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    kind: SynthesisKind,
    agent: StructuredAgent,
    max_tool_rounds: usize,
}

impl Synthesizer {
    pub fn new(kind: SynthesisKind, settings: &AgentSettings) -> Self {
        let name = match kind {
            SynthesisKind::Parameters => "parameter_synthesizer",
            SynthesisKind::Body => "body_synthesizer",
        };
        let agent = StructuredAgent::new(name, INSTRUCTIONS)
            .input(kind.schema_field(), kind.schema_description())
            .input("query", QUERY_DESCRIPTION)
            .output(kind.output_field(), kind.output_description());

        Self {
            kind,
            agent: settings.configure(agent),
            max_tool_rounds: settings.max_tool_rounds,
        }
    }

    pub fn kind(&self) -> SynthesisKind {
        self.kind
    }

    /// Generate a value for the raw specification `spec`.
    ///
    /// An empty specification yields `{}` without a model call.
    pub async fn synthesize(
        &self,
        model: &dyn ChatModel,
        query: &str,
        spec: &Value,
        tools: &ToolSet,
    ) -> crate::Result<Value> {
        let schema = normalize(spec, self.kind.model_name())?;
        if schema.is_empty() {
            debug!(kind = ?self.kind, "Empty schema, skipping synthesis");
            return Ok(Value::Object(Map::new()));
        }
        self.synthesize_schema(model, query, &schema, tools).await
    }

    pub async fn synthesize_schema(
        &self,
        model: &dyn ChatModel,
        query: &str,
        schema: &ObjectSchema,
        tools: &ToolSet,
    ) -> crate::Result<Value> {
        let input = SynthesisInput {
            kind: self.kind,
            schema: properties_schema(schema),
            query,
        };

        let mut output: Map<String, Value> = self
            .agent
            .invoke_with_tools(model, &input.to_value(), tools, self.max_tool_rounds)
            .await?;

        let generated = output
            .remove(self.kind.output_field())
            .unwrap_or(Value::Null);

        conform(schema, &generated).map_err(|e| {
            ResolverError::Synthesis(format!("{} did not fit the schema: {}", self.kind.output_field(), e))
        })
    }
}
