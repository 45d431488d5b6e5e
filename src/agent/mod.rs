//! Agent loop: chat sessions and the per-turn event stream.

pub mod chat;
pub mod events;
pub mod reporting;
pub mod turn;

pub use chat::ChatSession;
pub use events::{ChatCompressionInfo, StreamEvent, StructuredError, ThoughtSummary, TurnState};
pub use reporting::{ErrorReporter, TracingErrorReporter};
pub use turn::Turn;
