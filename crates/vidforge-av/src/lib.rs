//! # vidforge-av
//!
//! ffmpeg and ffprobe adapters for the vidforge editing pipeline.
//!
//! This crate provides:
//! - Tool discovery ([`ToolRegistry`]) from configured paths or `PATH`
//! - Async subprocess execution with timeouts ([`ToolCommand`])
//! - One function per editing action in [`actions`], each a single
//!   input-to-output ffmpeg invocation
//! - Audio presence and duration probing ([`AudioProber`])
//! - Per-run scratch directories for intermediates ([`Workspace`])
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use vidforge_av::{actions, ToolPaths, ToolRegistry};
//!
//! # async fn run() -> vidforge_av::Result<()> {
//! let tools = ToolRegistry::discover(&ToolPaths::default());
//! actions::trim(&tools, Path::new("in.mp4"), Path::new("out.mp4"), 5.0).await?;
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod command;
mod error;
pub mod probe;
pub mod tools;
pub mod workspace;

pub use command::{ToolCommand, ToolOutput};
pub use error::{Error, Result};
pub use probe::AudioProber;
pub use tools::{ToolInfo, ToolPaths, ToolRegistry, FFMPEG, FFPROBE};
pub use workspace::Workspace;
