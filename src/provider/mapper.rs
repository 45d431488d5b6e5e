//! Translation between canonical history/tools and the OpenAI wire format.

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::types::{ChatTurn, FunctionCall, FunctionResponse, Part, Role, ToolSpec};

use super::wire::{WireFunctionCall, WireMessage, WireTool, WireToolCall};

/// Exact tool descriptions and the abbreviations sent in their place.
const DESCRIPTION_ABBREVIATIONS: &[(&str, &str)] = &[
    (
        "Lists the names of files and subdirectories directly within a specified directory path. Can optionally ignore entries matching provided glob patterns.",
        "ls",
    ),
    ("Writes content to a specified file in the local filesystem.", "write"),
    (
        "Reads and returns the content of a specified file. If the file is large, the content will be truncated.",
        "read",
    ),
    (
        "Replaces text within a file. By default, replaces a single occurrence, but can replace multiple occurrences when `expected_replacements` is specified.",
        "edit",
    ),
    ("This tool executes a given shell command as `bash -c <command>`.", "bash"),
    ("Navigate to a URL or refresh the current tab", "nav"),
    (
        "Searches for a regular expression pattern within the content of files in a specified directory",
        "grep",
    ),
    ("Efficiently finds files matching specific glob patterns", "find"),
    ("Performs a web search using Google Search", "search"),
    (
        "Processes content from URL(s), including local and private network addresses",
        "fetch",
    ),
    (
        "Reads content from multiple files specified by paths or glob patterns",
        "readm",
    ),
    (
        "Saves a specific piece of information or fact to your long-term memory",
        "memo",
    ),
];

const MAX_DESCRIPTION_CHARS: usize = 8;

/// Generate a `call_` id for tool calls that arrive without one.
pub fn synthesize_call_id() -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    format!("call_{}", &raw[..9])
}

/// Translate conversation history into wire messages.
///
/// A system message is prepended when `system_instruction` is given. Turns
/// made only of function responses become one `tool` message per response.
pub fn map_history_to_wire_messages(
    history: &[ChatTurn],
    system_instruction: Option<&str>,
) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if let Some(system) = system_instruction.filter(|s| !s.is_empty()) {
        messages.push(WireMessage::System {
            content: system.to_string(),
        });
    }

    for turn in history {
        if turn.is_function_responses_only() {
            messages.extend(turn.parts.iter().filter_map(|p| match p {
                Part::FunctionResponse(fr) => Some(tool_message(fr)),
                _ => None,
            }));
            continue;
        }

        let content = turn.text();
        match turn.role {
            Role::User => messages.push(WireMessage::User { content }),
            Role::Model => {
                let tool_calls: Vec<WireToolCall> =
                    turn.function_calls().map(wire_tool_call).collect();
                messages.push(WireMessage::Assistant {
                    content,
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                });
            }
            Role::Tool => {
                debug!(parts = turn.parts.len(), "skipping tool turn without function responses");
            }
        }
    }

    debug!(turns = history.len(), messages = messages.len(), "mapped history");
    messages
}

fn tool_message(fr: &FunctionResponse) -> WireMessage {
    let content = match &fr.response {
        Value::String(s) => s.clone(),
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    };
    WireMessage::Tool {
        tool_call_id: fr.id.clone(),
        name: Some(fr.name.clone()),
        content,
    }
}

fn wire_tool_call(fc: &FunctionCall) -> WireToolCall {
    let arguments = match &fc.args {
        Value::String(s) => s.clone(),
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    };
    WireToolCall {
        id: fc
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(synthesize_call_id),
        kind: "function".to_string(),
        function: WireFunctionCall {
            name: fc.name.clone(),
            arguments,
        },
    }
}

/// Translate tool declarations into the wire `tools` array.
///
/// Groups are flattened. Returns `None` when there are no functions at all,
/// so the field can be omitted from the request.
pub fn map_tool_declarations_to_wire_tools(tools: &[ToolSpec]) -> Option<Vec<WireTool>> {
    let out: Vec<WireTool> = tools
        .iter()
        .flat_map(ToolSpec::declarations)
        .map(|decl| {
            let parameters = decl
                .schema()
                .cloned()
                .unwrap_or_else(|| json!({ "type": "object", "properties": {} }));
            WireTool::function(
                decl.name.clone(),
                minify_description(decl.description.as_deref().unwrap_or_default()),
                compact_schema(&parameters),
            )
        })
        .collect();
    (!out.is_empty()).then_some(out)
}

/// Shorten a tool description for the request payload.
pub fn minify_description(description: &str) -> String {
    if let Some((_, short)) = DESCRIPTION_ABBREVIATIONS
        .iter()
        .find(|(full, _)| *full == description)
    {
        return (*short).to_string();
    }
    description.chars().take(MAX_DESCRIPTION_CHARS).collect()
}

/// Strip a JSON schema down to `type`, `properties`, `required` and `items`.
///
/// Lossy: descriptions, enums, formats, bounds, defaults and examples never
/// reach the model. Each property and the `items` schema keep only `type`.
pub fn compact_schema(schema: &Value) -> Value {
    match schema {
        Value::Array(items) => Value::Array(items.iter().map(compact_schema).collect()),
        Value::Object(obj) => {
            let mut out = Map::new();
            for (key, value) in obj {
                match key.as_str() {
                    "type" | "required" => {
                        out.insert(key.clone(), value.clone());
                    }
                    "properties" => match value {
                        Value::Object(props) => {
                            let props = props
                                .iter()
                                .map(|(name, prop)| (name.clone(), type_only(prop)))
                                .collect();
                            out.insert(key.clone(), Value::Object(props));
                        }
                        other => {
                            out.insert(key.clone(), other.clone());
                        }
                    },
                    "items" => {
                        out.insert(key.clone(), type_only(value));
                    }
                    _ => {}
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn type_only(schema: &Value) -> Value {
    let compacted = compact_schema(schema);
    match compacted.get("type") {
        Some(ty) if !ty.is_null() => json!({ "type": ty }),
        _ => compacted,
    }
}

/// Build a function call part from raw argument text; invalid JSON yields `{}`.
pub fn function_call_part(name: &str, args_text: &str, id: Option<String>) -> Part {
    let args = if args_text.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(args_text).unwrap_or_else(|_| json!({}))
    };
    Part::FunctionCall(FunctionCall {
        id,
        name: name.to_string(),
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionDeclaration;
    use pretty_assertions::assert_eq;

    #[test]
    fn known_descriptions_are_abbreviated() {
        assert_eq!(
            minify_description("Writes content to a specified file in the local filesystem."),
            "write"
        );
        assert_eq!(minify_description("Fetches weather data"), "Fetches ");
        assert_eq!(minify_description("short"), "short");
        assert_eq!(minify_description(""), "");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(minify_description("ééééééééééé"), "éééééééé");
    }

    #[test]
    fn compact_schema_drops_non_structural_keywords() {
        let schema = json!({
            "type": "object",
            "description": "args",
            "properties": {
                "path": { "type": "string", "description": "file", "pattern": "^/" },
                "mode": { "type": "string", "enum": ["a", "b"] },
                "paths": { "type": "array", "items": { "type": "string", "minLength": 1 } }
            },
            "required": ["path"],
            "additionalProperties": false
        });
        assert_eq!(
            compact_schema(&schema),
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "mode": { "type": "string" },
                    "paths": { "type": "array" }
                },
                "required": ["path"]
            })
        );
    }

    #[test]
    fn missing_parameters_default_to_empty_object_schema() {
        let tools = map_tool_declarations_to_wire_tools(&[ToolSpec::Function(FunctionDeclaration {
            name: "noop".into(),
            description: None,
            parameters: None,
            parameters_json_schema: None,
        })])
        .unwrap();
        assert_eq!(
            tools[0].function.parameters,
            json!({ "type": "object", "properties": {} })
        );
        assert_eq!(tools[0].function.description, "");
    }

    #[test]
    fn synthesized_ids_have_expected_shape() {
        let id = synthesize_call_id();
        assert!(id.starts_with("call_"));
        assert_eq!(id.len(), 14);
    }

    #[test]
    fn function_call_part_tolerates_invalid_args() {
        let part = function_call_part("ls", "{not json", Some("c1".into()));
        assert_eq!(
            part,
            Part::FunctionCall(FunctionCall {
                id: Some("c1".into()),
                name: "ls".into(),
                args: json!({}),
            })
        );
    }
}
