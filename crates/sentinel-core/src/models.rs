//! Core data models for the sentinel kernel.
//!
//! Domain entities from spec §3 (`ToolKind`, `RecipeStep`, `AuditVerdict`,
//! `ExecutedAction`) plus the provider scaffolding ([`ToolResult`],
//! [`ModelInfo`], [`ProviderInfo`], [`ConfigField`]) that backs the
//! `Tool`/`Provider` module contracts.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// ToolResult
// ---------------------------------------------------------------------------

/// Outcome of invoking an underlying [`crate::traits::Tool`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<HashMap<String, Value>>,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Provider scaffolding (planner/auditor/executor model adapters)
// ---------------------------------------------------------------------------

/// A model available from a [`crate::traits::Provider`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub display_name: String,
    pub context_window: i64,
    pub max_output_tokens: i64,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Static description of a configurable provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub credential_env_vars: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub defaults: HashMap<String, Value>,
    #[serde(default)]
    pub config_fields: Vec<ConfigField>,
}

/// One configuration field a provider exposes (model id, temperature, etc).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigField {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "default", default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

// ---------------------------------------------------------------------------
// ToolKind — spec §9 redesign: closed sum type over dynamic dispatch
// ---------------------------------------------------------------------------

/// The two tools the mediator knows how to wrap (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    ShellTool,
    FileContentTool,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::ShellTool => "shell_tool",
            ToolKind::FileContentTool => "file_content_tool",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shell_tool" => Ok(ToolKind::ShellTool),
            "file_content_tool" => Ok(ToolKind::FileContentTool),
            other => Err(format!("unknown tool kind: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// RecipeStep / AuditVerdict / ExecutedAction — spec §3 entities
// ---------------------------------------------------------------------------

/// One step of a parsed plan (spec §3, §4.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeStep {
    pub description: String,
    pub expected_outcome: String,
    pub action: String,
    pub tool: ToolKind,
}

impl RecipeStep {
    /// The newline-separated subcommands of a (possibly multi-line) action.
    pub fn subcommands(&self) -> Vec<&str> {
        self.action.trim().split('\n').map(str::trim).collect()
    }
}

/// Auditor verdict (spec §3, §6 "Auditor verdict grammar").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditVerdict {
    pub safe: bool,
    pub reason: String,
    pub explanation: String,
}

/// One entry of `Session::executed_actions` (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedAction {
    pub tool: ToolKind,
    pub action: String,
    pub result: String,
    pub timestamp: String,
}

/// Status of a single mediated invocation (`result` event, spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failure,
    Cancelled,
}

/// Verbosity level configured at startup (spec §4.1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Debug,
    Info,
    Warn,
    None,
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Verbosity::Debug),
            "info" => Ok(Verbosity::Info),
            "warn" => Ok(Verbosity::Warn),
            "none" => Ok(Verbosity::None),
            other => Err(format!("unknown verbosity: {other}")),
        }
    }
}

/// A front-end reply to a `request_approval` event (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalReply {
    pub approved: bool,
}
