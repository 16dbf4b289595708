//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use paddock_config::ConfigError;
use paddock_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const UNAVAILABLE: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to camera '{camera}': {reason}")]
    #[diagnostic(
        code(paddock::connection_failed),
        help(
            "Check that the gateway for this camera is running and reachable.\n\
             Try: paddock status"
        )
    )]
    ConnectionFailed { camera: String, reason: String },

    #[error("Camera '{camera}' is unavailable: {reason}")]
    #[diagnostic(
        code(paddock::unavailable),
        help("Disabled cameras are skipped; set `enabled = true` in the config to use it.")
    )]
    Unavailable { camera: String, reason: String },

    // ── Cameras ──────────────────────────────────────────────────────

    #[error("Camera '{camera}' not found")]
    #[diagnostic(
        code(paddock::not_found),
        help("Run: paddock config show to list configured cameras")
    )]
    NotFound { camera: String },

    // ── Commands ─────────────────────────────────────────────────────

    #[error("{command} failed on '{camera}': {message}")]
    #[diagnostic(code(paddock::command_failed))]
    CommandFailed {
        camera: String,
        command: String,
        message: String,
    },

    #[error("{command} was rejected by '{camera}'")]
    #[diagnostic(
        code(paddock::rejected),
        help("Run with -v to see why the gateway refused the request.")
    )]
    Rejected { camera: String, command: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(paddock::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(paddock::config),
        help("Inspect the effective settings with: paddock config show")
    )]
    Config(#[from] ConfigError),

    #[error("Config file already exists at {path}")]
    #[diagnostic(code(paddock::config_exists), help("Pass --force to overwrite it."))]
    ConfigExists { path: String },

    #[error("Internal error: {0}")]
    #[diagnostic(code(paddock::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode JSON: {0}")]
    #[diagnostic(code(paddock::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Unavailable { .. } => exit_code::UNAVAILABLE,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::Config(_) | Self::ConfigExists { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { device_id, reason }
            | CoreError::Protocol { device_id, reason } => CliError::ConnectionFailed {
                camera: device_id.to_string(),
                reason,
            },

            CoreError::DeviceUnavailable { device_id, reason } => CliError::Unavailable {
                camera: device_id.to_string(),
                reason,
            },

            CoreError::DeviceNotFound { device_id } => CliError::NotFound {
                camera: device_id.to_string(),
            },

            CoreError::CommandFailed {
                device_id,
                command,
                message,
                status: _,
            } => CliError::CommandFailed {
                camera: device_id.to_string(),
                command,
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
