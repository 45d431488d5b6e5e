//! Core types for Kestrel.

pub mod generation;
pub mod message;
pub mod tool;
pub mod usage;

pub use generation::*;
pub use message::*;
pub use tool::*;
pub use usage::*;
