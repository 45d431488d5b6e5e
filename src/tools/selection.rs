//! Tool selection under a maximum tool count.
//!
//! Tools are partitioned by name into four priority groups. Must-always
//! tools and allow-listed browser tools are guaranteed a slot; the remaining
//! slots go to optional essentials (when enabled) and then everything else.

use serde::{Deserialize, Serialize};

use crate::provider::wire::WireTool;
use crate::types::FunctionDeclaration;

/// File system and shell tools that are always sent.
pub const MUST_ALWAYS_TOOLS: [&str; 7] = [
    "write_file",
    "read_file",
    "edit_file",
    "replace",
    "list_directory",
    "run_shell_command",
    "memory",
];

/// Tools that are preferred over the rest when there is room.
pub const OPTIONAL_ESSENTIAL_TOOLS: [&str; 5] =
    ["grep", "glob", "web_search", "web_fetch", "read_many_files"];

/// Browser tools that are always sent; other `chrome_` tools are dropped.
pub const ALLOWED_CHROME_TOOLS: [&str; 5] = [
    "chrome_navigate",
    "chrome_get_interactive_elements",
    "chrome_fill_or_select",
    "chrome_click_element",
    "chrome_get_web_content",
];

const CHROME_PREFIX: &str = "chrome_";

/// Upstream chat APIs reject requests with more tools than this.
pub const DEFAULT_MAX_TOOLS: usize = 128;

/// Anything that can be selected by name.
pub trait NamedTool {
    fn tool_name(&self) -> &str;
}

impl NamedTool for WireTool {
    fn tool_name(&self) -> &str {
        self.name()
    }
}

impl NamedTool for FunctionDeclaration {
    fn tool_name(&self) -> &str {
        &self.name
    }
}

/// Selection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFilterConfig {
    pub max_tools: usize,
    pub optional_essentials_enabled: bool,
}

impl Default for ToolFilterConfig {
    fn default() -> Self {
        Self {
            max_tools: DEFAULT_MAX_TOOLS,
            optional_essentials_enabled: true,
        }
    }
}

/// Tools split into priority groups, each in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorizedTools<T> {
    pub must_always: Vec<T>,
    pub chrome: Vec<T>,
    pub optional: Vec<T>,
    pub other: Vec<T>,
}

impl<T> CategorizedTools<T> {
    pub fn len(&self) -> usize {
        self.must_always.len() + self.chrome.len() + self.optional.len() + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of [`select_tools`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSelection<T> {
    pub selected: Vec<T>,
    pub guaranteed: Vec<T>,
    pub remaining_slots: usize,
    pub categorized: CategorizedTools<T>,
}

impl<T: NamedTool> ToolSelection<T> {
    /// Whether any browser tool made it into the selection.
    pub fn has_chrome(&self) -> bool {
        !self.categorized.chrome.is_empty()
    }
}

/// Partition tools by name.
///
/// `chrome_` tools outside [`ALLOWED_CHROME_TOOLS`] belong to no group.
pub fn categorize_tools<T: NamedTool + Clone>(tools: &[T]) -> CategorizedTools<T> {
    let mut categorized = CategorizedTools {
        must_always: Vec::new(),
        chrome: Vec::new(),
        optional: Vec::new(),
        other: Vec::new(),
    };

    for tool in tools {
        let name = tool.tool_name();
        let is_chrome = name.starts_with(CHROME_PREFIX);
        if is_chrome && ALLOWED_CHROME_TOOLS.contains(&name) {
            categorized.chrome.push(tool.clone());
        } else if MUST_ALWAYS_TOOLS.contains(&name) {
            categorized.must_always.push(tool.clone());
        } else if OPTIONAL_ESSENTIAL_TOOLS.contains(&name) {
            categorized.optional.push(tool.clone());
        } else if !is_chrome {
            categorized.other.push(tool.clone());
        }
    }
    categorized
}

/// Choose which tools to send.
///
/// Guaranteed tools are never truncated, even past `max_count`. Flexible
/// tools fill the remaining slots in priority order.
pub fn select_tools<T: NamedTool + Clone>(
    tools: &[T],
    max_count: usize,
    include_optional: bool,
) -> ToolSelection<T> {
    let categorized = categorize_tools(tools);

    let guaranteed: Vec<T> = categorized
        .must_always
        .iter()
        .chain(&categorized.chrome)
        .cloned()
        .collect();
    let remaining_slots = max_count.saturating_sub(guaranteed.len());

    let optional: &[T] = if include_optional {
        &categorized.optional
    } else {
        &[]
    };
    let selected = guaranteed
        .iter()
        .cloned()
        .chain(
            optional
                .iter()
                .chain(&categorized.other)
                .take(remaining_slots)
                .cloned(),
        )
        .collect();

    ToolSelection {
        selected,
        guaranteed,
        remaining_slots,
        categorized,
    }
}

/// [`select_tools`] driven by a [`ToolFilterConfig`].
pub fn filter_tools<T: NamedTool + Clone>(tools: &[T], config: &ToolFilterConfig) -> ToolSelection<T> {
    select_tools(tools, config.max_tools, config.optional_essentials_enabled)
}

/// System prompt addendum steering the model towards the browser tools.
///
/// Empty when no browser tool is available.
pub fn chrome_navigation_instruction(has_chrome: bool) -> &'static str {
    if !has_chrome {
        return "";
    }
    "\n\nCHROME NAVIGATION: When the user asks to navigate to websites, interact with web pages, or browse web content, use the chrome_* tools instead of web_fetch:\n\
- Use 'chrome_navigate' to navigate to URLs or refresh pages\n\
- Use 'chrome_get_interactive_elements' to see clickable elements on a page\n\
- Use 'chrome_click_element' to click on buttons, links, or other elements\n\
- Use 'chrome_fill_or_select' to fill forms or select dropdown options\n\
- Use 'chrome_get_web_content' to get the visible text content from a page\n\
Only use web_fetch as a fallback if Chrome tools are unavailable."
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tool(name: &str) -> WireTool {
        WireTool::function(name, "", json!({ "type": "object" }))
    }

    fn names(tools: &[WireTool]) -> Vec<&str> {
        tools.iter().map(|t| t.name()).collect()
    }

    #[test]
    fn unknown_chrome_tools_are_excluded() {
        let tools = [tool("chrome_navigate"), tool("chrome_screenshot"), tool("foo")];
        let categorized = categorize_tools(&tools);
        assert_eq!(names(&categorized.chrome), ["chrome_navigate"]);
        assert_eq!(names(&categorized.other), ["foo"]);
        assert_eq!(categorized.len(), 2);
    }

    #[test]
    fn optional_tools_come_before_other_tools() {
        let tools = [tool("custom_a"), tool("grep"), tool("read_file"), tool("custom_b")];
        let selection = select_tools(&tools, 3, true);
        assert_eq!(names(&selection.selected), ["read_file", "grep", "custom_a"]);
        assert_eq!(selection.remaining_slots, 2);
    }

    #[test]
    fn disabled_optional_tools_are_skipped() {
        let tools = [tool("grep"), tool("glob"), tool("custom")];
        let selection = select_tools(&tools, 10, false);
        assert_eq!(names(&selection.selected), ["custom"]);
    }

    #[test]
    fn guaranteed_tools_survive_a_tiny_budget() {
        let tools = [
            tool("write_file"),
            tool("chrome_click_element"),
            tool("memory"),
            tool("grep"),
        ];
        let selection = select_tools(&tools, 1, true);
        assert_eq!(
            names(&selection.selected),
            ["write_file", "memory", "chrome_click_element"]
        );
        assert_eq!(selection.remaining_slots, 0);
        assert!(selection.has_chrome());
    }

    #[test]
    fn chrome_instruction_only_when_available() {
        assert_eq!(chrome_navigation_instruction(false), "");
        assert!(chrome_navigation_instruction(true).contains("chrome_navigate"));
    }
}
