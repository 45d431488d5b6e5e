//! Tool declarations and the tool execution boundary.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use strum::{Display, EnumString};

use super::message::{FunctionResponse, Part};

/// A function the model may call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(
        default,
        alias = "parameters_json_schema",
        skip_serializing_if = "Option::is_none"
    )]
    pub parameters_json_schema: Option<Value>,
}

impl FunctionDeclaration {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            parameters: Some(parameters),
            parameters_json_schema: None,
        }
    }

    /// The parameter schema, preferring `parameters_json_schema`.
    pub fn schema(&self) -> Option<&Value> {
        self.parameters_json_schema
            .as_ref()
            .or(self.parameters.as_ref())
    }
}

/// A group of declarations, as tools arrive from the Google-style API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolGroup {
    #[serde(alias = "function_declarations")]
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// A tool entry: either a single declaration or a group of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolSpec {
    Group(ToolGroup),
    Function(FunctionDeclaration),
}

impl ToolSpec {
    pub fn declarations(&self) -> &[FunctionDeclaration] {
        match self {
            Self::Group(g) => &g.function_declarations,
            Self::Function(f) => std::slice::from_ref(f),
        }
    }
}

impl From<FunctionDeclaration> for ToolSpec {
    fn from(decl: FunctionDeclaration) -> Self {
        Self::Function(decl)
    }
}

/// Flatten tool specs into their function declarations, in order.
pub fn flatten_declarations(tools: &[ToolSpec]) -> Vec<FunctionDeclaration> {
    tools
        .iter()
        .flat_map(|t| t.declarations().iter().cloned())
        .collect()
}

/// A tool invocation handed to the external executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub name: String,
    pub args: Map<String, Value>,
    pub is_client_initiated: bool,
    pub prompt_id: String,
}

/// Classification of a failed tool execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidParams,
    ToolNotRegistered,
    ExecutionFailed,
    Cancelled,
}

/// Outcome of a tool execution, reported back by the executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallResponse {
    pub call_id: String,
    pub response_parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,
}

impl ToolCallResponse {
    /// A successful execution producing `output`.
    pub fn success(request: &ToolCallRequest, output: impl Into<Value>) -> Self {
        let output = output.into();
        let result_display = match &output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            call_id: request.call_id.clone(),
            response_parts: vec![response_part(request, json!({ "output": output }))],
            result_display: Some(result_display),
            error: None,
            error_kind: None,
        }
    }

    /// A failed execution; the model sees the error message.
    pub fn failure(
        request: &ToolCallRequest,
        kind: ToolErrorKind,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            call_id: request.call_id.clone(),
            response_parts: vec![response_part(request, json!({ "error": message }))],
            result_display: Some(message.clone()),
            error: Some(message),
            error_kind: Some(kind),
        }
    }
}

fn response_part(request: &ToolCallRequest, response: Value) -> Part {
    Part::FunctionResponse(FunctionResponse {
        id: Some(request.call_id.clone()),
        name: request.name.clone(),
        response,
    })
}
