//! Core domain + application logic for the channel auto-comment bot.
//!
//! This crate is intentionally framework-agnostic. The messaging service and the
//! interactive login input live behind ports (traits) implemented in adapter crates.

pub mod account;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod orchestrator;
pub mod ports;
pub mod session;
pub mod utils;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
