//! Tool handling: which tools are offered to the model.
//!
//! Execution is external; the agent only emits [`ToolCallRequest`]s and
//! consumes [`ToolCallResponse`]s.
//!
//! [`ToolCallRequest`]: crate::types::ToolCallRequest
//! [`ToolCallResponse`]: crate::types::ToolCallResponse

pub mod selection;

pub use selection::{
    categorize_tools, chrome_navigation_instruction, filter_tools, select_tools, CategorizedTools,
    NamedTool, ToolFilterConfig, ToolSelection,
};
