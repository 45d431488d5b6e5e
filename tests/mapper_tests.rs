//! Tests for history and tool mapping onto the chat completions wire format.

use pretty_assertions::assert_eq;
use serde_json::json;

use kestrel::provider::mapper::{map_history_to_wire_messages, map_tool_declarations_to_wire_tools};
use kestrel::provider::wire::WireMessage;
use kestrel::types::*;

fn model_call(id: Option<&str>, name: &str, args: serde_json::Value) -> ChatTurn {
    ChatTurn::new(
        Role::Model,
        vec![Part::FunctionCall(FunctionCall {
            id: id.map(str::to_string),
            name: name.to_string(),
            args,
        })],
    )
}

fn tool_result(id: &str, name: &str, response: serde_json::Value) -> ChatTurn {
    ChatTurn::new(
        Role::Tool,
        vec![Part::FunctionResponse(FunctionResponse {
            id: Some(id.to_string()),
            name: name.to_string(),
            response,
        })],
    )
}

#[test]
fn plain_history_maps_one_to_one_with_system_first() {
    let history = vec![
        ChatTurn::user("hi"),
        ChatTurn::model("hello"),
        ChatTurn::user("bye"),
    ];

    let messages = map_history_to_wire_messages(&history, Some("be brief"));
    assert_eq!(messages.len(), history.len() + 1);
    let roles: Vec<&str> = messages.iter().map(WireMessage::role).collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    assert_eq!(messages[0].content(), "be brief");
    assert_eq!(messages[2].content(), "hello");

    let without_system = map_history_to_wire_messages(&history, None);
    assert_eq!(without_system.len(), history.len());
}

#[test]
fn empty_system_instruction_is_omitted() {
    let messages = map_history_to_wire_messages(&[ChatTurn::user("hi")], Some(""));
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role(), "user");
}

#[test]
fn tool_round_trip_history() {
    let history = vec![
        ChatTurn::user("list files"),
        model_call(Some("call_1"), "list_directory", json!({ "path": "." })),
        tool_result("call_1", "list_directory", json!({ "output": "a.txt" })),
    ];

    let messages = map_history_to_wire_messages(&history, None);
    assert_eq!(messages.len(), 3);

    match &messages[1] {
        WireMessage::Assistant {
            content,
            tool_calls: Some(calls),
        } => {
            assert_eq!(content, "");
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].id, "call_1");
            assert_eq!(calls[0].kind, "function");
            assert_eq!(calls[0].function.name, "list_directory");
            assert_eq!(calls[0].function.arguments, r#"{"path":"."}"#);
        }
        other => panic!("expected assistant with tool calls, got {other:?}"),
    }

    match &messages[2] {
        WireMessage::Tool {
            tool_call_id,
            name,
            content,
        } => {
            assert_eq!(tool_call_id.as_deref(), Some("call_1"));
            assert_eq!(name.as_deref(), Some("list_directory"));
            assert_eq!(content, r#"{"output":"a.txt"}"#);
        }
        other => panic!("expected tool message, got {other:?}"),
    }
}

#[test]
fn missing_call_ids_are_synthesized() {
    let messages = map_history_to_wire_messages(&[model_call(None, "ls", json!({}))], None);
    match &messages[0] {
        WireMessage::Assistant {
            tool_calls: Some(calls),
            ..
        } => {
            assert!(calls[0].id.starts_with("call_"));
            assert_eq!(calls[0].id.len(), "call_".len() + 9);
        }
        other => panic!("expected assistant with tool calls, got {other:?}"),
    }
}

#[test]
fn string_and_null_payloads_pass_through() {
    let history = vec![
        model_call(Some("c1"), "bash", json!(r#"{"command":"ls"}"#)),
        tool_result("c1", "bash", json!("plain output")),
        tool_result("c2", "bash", serde_json::Value::Null),
    ];

    let messages = map_history_to_wire_messages(&history, None);
    match &messages[0] {
        WireMessage::Assistant {
            tool_calls: Some(calls),
            ..
        } => assert_eq!(calls[0].function.arguments, r#"{"command":"ls"}"#),
        other => panic!("expected assistant with tool calls, got {other:?}"),
    }
    assert_eq!(messages[1].content(), "plain output");
    assert_eq!(messages[2].content(), "{}");
}

#[test]
fn multiple_responses_in_one_turn_become_separate_messages() {
    let turn = ChatTurn::new(
        Role::User,
        vec![
            Part::FunctionResponse(FunctionResponse {
                id: Some("a".into()),
                name: "read_file".into(),
                response: json!({ "output": "1" }),
            }),
            Part::FunctionResponse(FunctionResponse {
                id: Some("b".into()),
                name: "read_file".into(),
                response: json!({ "output": "2" }),
            }),
        ],
    );

    let messages = map_history_to_wire_messages(&[turn], None);
    let roles: Vec<&str> = messages.iter().map(WireMessage::role).collect();
    assert_eq!(roles, vec!["tool", "tool"]);
}

#[test]
fn tool_groups_are_flattened_and_compacted() {
    let specs = vec![
        ToolSpec::Group(ToolGroup {
            function_declarations: vec![FunctionDeclaration::new(
                "read_file",
                "Reads and returns the content of a specified file. If the file is large, the content will be truncated.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "absolute path" }
                    },
                    "required": ["path"]
                }),
            )],
        }),
        ToolSpec::Function(FunctionDeclaration::new(
            "custom_tool",
            "Does something rather specific",
            json!({ "type": "object" }),
        )),
    ];

    let tools = map_tool_declarations_to_wire_tools(&specs).unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
    assert_eq!(names, vec!["read_file", "custom_tool"]);

    assert_eq!(tools[0].function.description, "read");
    assert_eq!(
        tools[0].function.parameters,
        json!({
            "type": "object",
            "properties": { "path": { "type": "string" } },
            "required": ["path"]
        })
    );
    assert_eq!(tools[1].function.description, "Does som");
}

#[test]
fn no_declarations_means_no_tools_field() {
    assert!(map_tool_declarations_to_wire_tools(&[]).is_none());
    let empty_group = vec![ToolSpec::Group(ToolGroup {
        function_declarations: vec![],
    })];
    assert!(map_tool_declarations_to_wire_tools(&empty_group).is_none());
}
