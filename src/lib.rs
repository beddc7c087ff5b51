//! vidforge - video editing over HTTP
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod server;

pub use error::{Error, Result};
