//! Tests for the tool selection policy.

mod common;

use pretty_assertions::assert_eq;

use common::declaration;
use kestrel::tools::selection::{
    ALLOWED_CHROME_TOOLS, DEFAULT_MAX_TOOLS, MUST_ALWAYS_TOOLS, OPTIONAL_ESSENTIAL_TOOLS,
};
use kestrel::tools::{categorize_tools, filter_tools, select_tools, NamedTool, ToolFilterConfig};
use kestrel::types::FunctionDeclaration;

fn names<T: NamedTool>(tools: &[T]) -> Vec<&str> {
    tools.iter().map(NamedTool::tool_name).collect()
}

fn full_catalog() -> Vec<FunctionDeclaration> {
    let mut tools: Vec<FunctionDeclaration> = Vec::new();
    tools.extend((0..10).map(|i| declaration(&format!("mcp_tool_{i}"))));
    tools.extend(OPTIONAL_ESSENTIAL_TOOLS.iter().map(|n| declaration(n)));
    tools.extend(ALLOWED_CHROME_TOOLS.iter().map(|n| declaration(n)));
    tools.extend(MUST_ALWAYS_TOOLS.iter().map(|n| declaration(n)));
    tools
}

#[test]
fn categorization_is_a_partition_when_chrome_names_are_allowed() {
    let tools = full_catalog();
    let categorized = categorize_tools(&tools);

    assert_eq!(categorized.len(), tools.len());
    assert_eq!(names(&categorized.must_always), MUST_ALWAYS_TOOLS.to_vec());
    assert_eq!(names(&categorized.chrome), ALLOWED_CHROME_TOOLS.to_vec());
    assert_eq!(names(&categorized.optional), OPTIONAL_ESSENTIAL_TOOLS.to_vec());
    assert_eq!(categorized.other.len(), 10);
}

#[test]
fn unknown_chrome_names_belong_to_no_group() {
    let tools = vec![declaration("chrome_screenshot"), declaration("read_file")];
    let categorized = categorize_tools(&tools);
    assert_eq!(categorized.len(), 1);

    let selection = select_tools(&tools, 10, true);
    assert_eq!(names(&selection.selected), vec!["read_file"]);
}

#[test]
fn selection_size_matches_budget_for_every_max_count() {
    let tools = full_catalog();
    let guaranteed = MUST_ALWAYS_TOOLS.len() + ALLOWED_CHROME_TOOLS.len();
    let flexible = OPTIONAL_ESSENTIAL_TOOLS.len() + 10;

    for max_count in guaranteed..=tools.len() + 3 {
        let selection = select_tools(&tools, max_count, true);
        assert_eq!(
            selection.selected.len(),
            max_count.min(guaranteed + flexible),
            "max_count = {max_count}"
        );
        assert_eq!(selection.guaranteed.len(), guaranteed);
        assert!(selection
            .guaranteed
            .iter()
            .all(|g| selection.selected.contains(g)));
        assert_eq!(selection.remaining_slots, max_count - guaranteed);
    }
}

#[test]
fn guaranteed_tools_come_first_then_optional_then_other() {
    let tools = full_catalog();
    let selection = select_tools(&tools, 19, true);

    let selected = names(&selection.selected);
    assert_eq!(&selected[..7], &MUST_ALWAYS_TOOLS[..]);
    assert_eq!(&selected[7..12], &ALLOWED_CHROME_TOOLS[..]);
    assert_eq!(&selected[12..17], &OPTIONAL_ESSENTIAL_TOOLS[..]);
    assert_eq!(&selected[17..], &["mcp_tool_0", "mcp_tool_1"]);
}

#[test]
fn disabling_optional_tools_gives_slots_to_other_tools() {
    let tools = full_catalog();
    let selection = select_tools(&tools, 14, false);

    let selected = names(&selection.selected);
    assert_eq!(selected.len(), 14);
    assert_eq!(&selected[12..], &["mcp_tool_0", "mcp_tool_1"]);
    assert!(!selected.contains(&"grep"));
}

#[test]
fn selection_is_pure() {
    let tools = full_catalog();
    assert_eq!(select_tools(&tools, 15, true), select_tools(&tools, 15, true));
}

#[test]
fn filter_uses_config_defaults() {
    let tools = full_catalog();
    let config = ToolFilterConfig::default();
    assert_eq!(config.max_tools, DEFAULT_MAX_TOOLS);

    let selection = filter_tools(&tools, &config);
    assert_eq!(selection.selected.len(), tools.len());
    assert!(selection.has_chrome());
}
