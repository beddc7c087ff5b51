//! Error type for the vidforge service.
//!
//! Pipeline, orchestration and HTTP failures all land in [`Error`], which
//! carries enough context for handlers to pick a status code via
//! [`Error::http_status`] and a stable machine code via [`Error::code`].

use std::fmt;
use std::path::PathBuf;

/// Unified error type for request handling and pipeline execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request itself was malformed (bad multipart, bad JSON, bad path).
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The upload exceeded the configured size limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// One action in the list failed validation.
    #[error("Invalid action #{index} ({kind}): {field} {message}")]
    InvalidAction {
        /// Position of the action in the submitted list.
        index: usize,
        /// The `action` string as submitted.
        kind: String,
        /// The offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The pipeline was asked to write over its own input.
    #[error("Input and output are the same file: {}", path.display())]
    SameInputOutput { path: PathBuf },

    /// The caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A pipeline step failed.
    #[error("Step {index} ({kind}) failed: {source}")]
    Step {
        index: usize,
        kind: String,
        #[source]
        source: vidforge_av::Error,
    },

    /// A media tool failed outside of a specific step.
    #[error(transparent)]
    Media(#[from] vidforge_av::Error),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::BadRequest(_) | Error::InvalidAction { .. } | Error::SameInputOutput { .. } => {
                400
            }
            Error::Unauthorized(_) => 401,
            Error::PayloadTooLarge(_) => 413,
            Error::NotFound { .. } => 404,
            Error::Step { source, .. } | Error::Media(source) => media_status(source),
            Error::Io { .. } | Error::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            Error::BadRequest(_) => "invalid_request",
            Error::PayloadTooLarge(_) => "payload_too_large",
            Error::InvalidAction { .. } => "invalid_action",
            Error::SameInputOutput { .. } => "same_input_output",
            Error::Unauthorized(_) => "unauthorized",
            Error::NotFound { .. } => "not_found",
            Error::Step { source, .. } | Error::Media(source) => media_code(source),
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::InvalidAction`].
    pub fn invalid_action(
        index: usize,
        kind: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::InvalidAction {
            index,
            kind: kind.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Step`].
    pub fn step(index: usize, kind: impl Into<String>, source: vidforge_av::Error) -> Self {
        Error::Step {
            index,
            kind: kind.into(),
            source,
        }
    }
}

fn media_status(err: &vidforge_av::Error) -> u16 {
    use vidforge_av::Error as Av;
    match err {
        Av::ToolFailed { .. } | Av::Timeout { .. } => 502,
        Av::InvalidInput(_) => 400,
        Av::ToolNotFound { .. } | Av::FileNotFound { .. } | Av::Io(_) | Av::Workspace(_) => 500,
    }
}

fn media_code(err: &vidforge_av::Error) -> &'static str {
    use vidforge_av::Error as Av;
    match err {
        Av::ToolNotFound { .. } => "tool_not_found",
        Av::ToolFailed { .. } => "tool_failed",
        Av::Timeout { .. } => "tool_timeout",
        Av::InvalidInput(_) => "invalid_input",
        Av::FileNotFound { .. } => "file_not_found",
        Av::Io(_) => "io_error",
        Av::Workspace(_) => "workspace_error",
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
