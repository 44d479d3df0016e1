//! Core domain + application logic for the vakil WhatsApp bot.
//!
//! This crate is intentionally framework-agnostic. WhatsApp / the completion
//! backend / SQLite live behind ports (traits) implemented in adapter crates.

pub mod completion;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handler;
pub mod limiter;
pub mod logging;
pub mod ports;

pub use errors::{Error, Result};
