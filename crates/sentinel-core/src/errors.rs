//! Error types for the sentinel kernel.
//!
//! This module defines the full error taxonomy described in spec §7:
//!
//! - [`SentinelError`] — top-level enum wrapping every component error
//! - [`ProviderError`] — planner/auditor/executor model-adapter errors
//! - [`SessionError`] — session lifecycle errors
//! - [`ToolError`] — tool execution errors
//! - [`IpcError`] — malformed or truncated stdin protocol traffic
//! - [`StoreError`] — persistence failures
//! - [`OrchestratorError`] — planning/orchestration failures
//! - [`ConfigError`] — CLI/config validation failures
//!
//! All types derive `Serialize` so errors can be folded into an `error`
//! event payload without a separate mapping step.

use serde::Serialize;

// -- ProviderError --

/// Model-adapter error taxonomy, shared by the planner, auditor and
/// executor `Provider` roles.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ProviderError {
    /// Provider rate limit exceeded (HTTP 429 or equivalent).
    #[error("{message}")]
    RateLimit {
        message: String,
        provider: Option<String>,
        retry_after: Option<f64>,
    },

    /// Invalid or missing API credentials (HTTP 401/403).
    #[error("{message}")]
    Authentication {
        message: String,
        provider: Option<String>,
    },

    /// Request exceeds the model's context window.
    #[error("{message}")]
    ContextLength {
        message: String,
        provider: Option<String>,
    },

    /// Content blocked by the provider's safety filter.
    #[error("{message}")]
    ContentFilter {
        message: String,
        provider: Option<String>,
    },

    /// Malformed request rejected by the provider (HTTP 400/422).
    #[error("{message}")]
    InvalidRequest {
        message: String,
        provider: Option<String>,
    },

    /// Provider service unavailable (HTTP 5xx, network error).
    #[error("{message}")]
    Unavailable {
        message: String,
        provider: Option<String>,
        status_code: Option<u16>,
    },

    /// Request timed out before the provider responded.
    #[error("{message}")]
    Timeout {
        message: String,
        provider: Option<String>,
    },

    /// Catch-all provider error.
    #[error("{message}")]
    Other {
        message: String,
        provider: Option<String>,
        status_code: Option<u16>,
        retryable: bool,
    },
}

impl ProviderError {
    /// Whether the caller should consider retrying the request.
    pub fn retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. } => true,
            Self::Unavailable { .. } => true,
            Self::Timeout { .. } => true,
            Self::Other { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Seconds to wait before retrying, if available.
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

// -- SessionError --

/// Session lifecycle errors.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum SessionError {
    /// Session has not been initialized yet.
    #[error("session not initialized")]
    NotInitialized,

    /// A required configuration field is missing.
    #[error("missing required config: {field}")]
    ConfigMissing { field: String },

    /// Session has already completed.
    #[error("session already completed")]
    AlreadyCompleted,

    /// Catch-all for other session errors.
    #[error("{message}")]
    Other { message: String },
}

// -- ToolError --

/// Tool execution errors (failure kind 6 of spec §7).
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ToolError {
    /// Tool execution failed (non-audit, non-approval failure).
    #[error("tool execution failed: {message}")]
    ExecutionFailed {
        message: String,
        stdout: Option<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// Requested tool was not found.
    #[error("tool not found: {name}")]
    NotFound { name: String },

    /// A bounded subprocess helper (used by the auditor) timed out.
    #[error("tool timed out after {seconds}s")]
    TimedOut { seconds: f64 },

    /// Catch-all for other tool errors.
    #[error("{message}")]
    Other { message: String },
}

// -- IpcError --

/// Stdin protocol failures (failure kind 5 of spec §7).
#[derive(Debug, thiserror::Error, Serialize)]
pub enum IpcError {
    /// Standard input was closed before a reply arrived.
    #[error("stdin closed (EOF) while awaiting a reply")]
    Eof,

    /// A line on stdin was not valid JSON, or not the shape expected.
    #[error("malformed command/approval JSON: {message}")]
    MalformedJson { message: String },

    /// A command object had no recognized `type` field.
    #[error("unknown command type: {type_name}")]
    UnknownCommand { type_name: String },
}

// -- StoreError --

/// Persistence failures (failure kind 7 of spec §7).
#[derive(Debug, thiserror::Error, Serialize)]
pub enum StoreError {
    /// Reading or writing the on-disk session form failed.
    #[error("session persistence failed: {message}")]
    Io { message: String },

    /// A persisted record could not be deserialized.
    #[error("corrupt session record '{session_hash}': {message}")]
    Corrupt {
        session_hash: String,
        message: String,
    },
}

// -- OrchestratorError --

/// Planning/orchestration failures (failure kind 2 of spec §7).
#[derive(Debug, thiserror::Error, Serialize)]
pub enum OrchestratorError {
    /// The planner produced no usable plan.
    #[error("agent could not form a clear initial plan")]
    EmptyPlan,

    /// A new session was requested without the required initial query.
    #[error("a new session requires an initial query")]
    MissingInitialQuery,

    /// Catch-all orchestration failure.
    #[error("{message}")]
    Other { message: String },
}

// -- ConfigError --

/// Startup/config validation failures (failure kind 1 of spec §7).
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ConfigError {
    /// A `--*-params` flag did not contain a JSON object.
    #[error("invalid {field}: {message}")]
    InvalidJson { field: String, message: String },

    /// A required argument was absent.
    #[error("missing required argument: {field}")]
    MissingArgument { field: String },
}

// -- SentinelError --

/// Top-level error enum wrapping all component errors.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum SentinelError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Ipc(#[from] IpcError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
