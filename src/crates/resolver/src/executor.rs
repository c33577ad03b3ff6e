//! Outbound HTTP calls against target APIs
//!
//! One call per [`ActionRequest`]. Nothing here retries: network errors,
//! non-2xx statuses and timeouts go straight back to the caller.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Default deadline for a target API call.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid header '{0}'")]
    InvalidHeader(String),

    #[error("Request failed: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Target API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Path parameter '{name}' cannot be '{value}'")]
    InvalidPathValue { name: String, value: String },

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Methods the executor knows how to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }

    /// Whether the synthesized body goes on the wire.
    pub fn sends_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }

    fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            _ => Err(ExecutionError::UnsupportedMethod(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Object of query parameters; null for none
    pub params: Value,
    /// Ignored unless the method sends a body
    pub body: Value,
    pub headers: BTreeMap<String, String>,
}

impl ActionRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: Value::Null,
            body: Value::Null,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ActionResponse {
    pub status: u16,
    pub payload: Value,
    pub latency: Duration,
}

#[derive(Debug, Clone)]
pub struct ActionExecutor {
    client: Client,
    timeout: Duration,
}

impl ActionExecutor {
    pub fn new(timeout: Duration) -> Result<Self, ExecutionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutionError::Client(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn execute(&self, request: &ActionRequest) -> Result<ActionResponse, ExecutionError> {
        let headers = header_map(&request.headers)?;
        let query = flatten_params(&request.params);

        let mut builder = self
            .client
            .request(request.method.as_reqwest(), &request.url)
            .headers(headers);
        if !query.is_empty() {
            builder = builder.query(&query);
        }

        if request.method.sends_body() {
            let body = match &request.body {
                Value::Null => Value::Object(Default::default()),
                other => other.clone(),
            };
            builder = builder.json(&body);
        }

        debug!(method = %request.method, url = %request.url, params = query.len(), "Calling target API");
        let started = Instant::now();

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(e))?;
        let latency = started.elapsed();

        if !status.is_success() {
            warn!(method = %request.method, url = %request.url, status = status.as_u16(), "Target API call failed");
            return Err(ExecutionError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let payload = if request.method == HttpMethod::Head {
            Value::Null
        } else {
            decode_payload(&text)
        };

        debug!(status = status.as_u16(), elapsed_ms = latency.as_millis() as u64, "Target API responded");
        Ok(ActionResponse {
            status: status.as_u16(),
            payload,
            latency,
        })
    }

    fn classify(&self, error: reqwest::Error) -> ExecutionError {
        if error.is_timeout() {
            ExecutionError::Timeout(self.timeout)
        } else {
            ExecutionError::Network(error.to_string())
        }
    }
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ExecutionError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ExecutionError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| ExecutionError::InvalidHeader(name.clone()))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Query string pairs from a synthesized parameter object.
///
/// Scalars use their string form, null is omitted, and arrays and objects
/// are sent as compact JSON.
pub fn flatten_params(params: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = params else {
        return Vec::new();
    };

    map.iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                compound => compound.to_string(),
            };
            Some((key.clone(), rendered))
        })
        .collect()
}

/// Substitute `{name}` path placeholders from the parameter object.
///
/// Each value is percent-encoded as a single path segment, so it cannot
/// reach another route. Empty and dot-segment values are rejected.
/// Substituted keys are removed from the returned parameters; placeholders
/// with no matching value are left as they are.
pub fn expand_path(url: &str, params: &Value) -> Result<(String, Value), ExecutionError> {
    let Value::Object(map) = params else {
        return Ok((url.to_string(), params.clone()));
    };

    let mut remaining = map.clone();
    let mut expanded = url.to_string();
    for (key, value) in map {
        let placeholder = format!("{{{}}}", key);
        if !expanded.contains(&placeholder) {
            continue;
        }
        let rendered = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if matches!(rendered.as_str(), "" | "." | "..") {
            return Err(ExecutionError::InvalidPathValue {
                name: key.clone(),
                value: rendered,
            });
        }
        expanded = expanded.replace(&placeholder, &urlencoding::encode(&rendered));
        remaining.remove(key);
    }

    Ok((expanded, Value::Object(remaining)))
}

fn decode_payload(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
