//! Completion backend abstractions and the multi-model fallback dispatcher.

pub mod dispatch;
pub mod port;
pub mod types;
