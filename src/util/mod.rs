//! Utility modules: token estimation, timeout.

pub mod timeout;
pub mod tokens;
