//! Module contract traits for the sentinel kernel.
//!
//! These two traits define the seams through which external collaborators —
//! concrete shell/file tools and an LLM backend — are plugged into the
//! kernel. The kernel itself stores them as `Arc<dyn Trait>` and dispatches
//! dynamically; there is exactly one production implementation of the
//! orchestrator and mediator, so those are concrete types
//! ([`crate::orchestrator::AgentOrchestrator`], [`crate::mediator::Mediator`])
//! rather than further traits.
//!
//! # Design Decisions
//!
//! - **Explicit `Pin<Box<dyn Future>>`** instead of `#[async_trait]` —
//!   no macro magic, AI agents see the actual type signature.
//! - **`Send + Sync` on trait definition** — errors appear at impl site,
//!   not scattered across every usage site.
//! - **`Arc<dyn Trait>`** over generics — no generic virus, runtime module
//!   loading requires dynamic dispatch anyway.
//!
//! # Connections
//!
//! - [`Tool`] is implemented by `ShellTool`/`FileContentTool` (`sentinel-cli`)
//!   and invoked by [`crate::mediator`].
//! - [`Provider`] is implemented once per LLM backend and reused across the
//!   planner, auditor and executor roles.
//!
//! All data types referenced here are defined in [`crate::models`],
//! [`crate::messages`], and [`crate::errors`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::{ProviderError, ToolError};
use crate::messages::{ChatRequest, ChatResponse, ToolCall, ToolSpec};
use crate::models::{ModelInfo, ProviderInfo, ToolResult};

// ---------------------------------------------------------------------------
// Tool
// ---------------------------------------------------------------------------

/// Interface for tool modules.
///
/// Tools provide capabilities that the mediator can invoke on the agent's
/// behalf. Each tool has a unique name, a human-readable description, and
/// an async `execute` method that processes JSON input and returns a
/// [`ToolResult`].
///
/// # Object safety
///
/// This trait is object-safe: `Arc<dyn Tool>` is the standard storage type.
///
/// # Example
///
/// ```rust
/// use std::pin::Pin;
/// use std::future::Future;
/// use sentinel_core::traits::Tool;
/// use sentinel_core::models::ToolResult;
/// use sentinel_core::errors::ToolError;
/// use sentinel_core::messages::ToolSpec;
/// use serde_json::Value;
/// use std::collections::HashMap;
///
/// struct EchoTool;
///
/// impl Tool for EchoTool {
///     fn name(&self) -> &str { "echo" }
///     fn description(&self) -> &str { "Echoes input back" }
///     fn get_spec(&self) -> ToolSpec {
///         ToolSpec {
///             name: "echo".into(),
///             parameters: HashMap::new(),
///             description: Some("Echoes input back".into()),
///             extensions: HashMap::new(),
///         }
///     }
///     fn execute(
///         &self,
///         input: Value,
///     ) -> Pin<Box<dyn Future<Output = Result<ToolResult, ToolError>> + Send + '_>> {
///         Box::pin(async move {
///             Ok(ToolResult { success: true, output: Some(input), error: None })
///         })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// Unique name used to invoke this tool (e.g., `"shell_tool"`, `"file_content_tool"`).
    fn name(&self) -> &str;

    /// Human-readable description shown to the LLM.
    fn description(&self) -> &str;

    /// Return a [`ToolSpec`] describing this tool's JSON Schema interface.
    ///
    /// Providers send this spec to the LLM so it knows what arguments to pass.
    fn get_spec(&self) -> ToolSpec;

    /// Execute the tool with the given JSON input.
    ///
    /// # Arguments
    ///
    /// * `input` — Tool-specific input parameters as a JSON value
    ///   (typically an object matching the schema from [`get_spec`](Tool::get_spec)).
    ///
    /// # Returns
    ///
    /// `Ok(ToolResult)` on success (even partial success — check `success` field).
    /// `Err(ToolError)` only for infrastructure failures (tool not found, timed out, etc.).
    fn execute(
        &self,
        input: Value,
    ) -> Pin<Box<dyn Future<Output = Result<ToolResult, ToolError>> + Send + '_>>;
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Interface for LLM provider modules.
///
/// Providers receive [`ChatRequest`] (typed, validated messages) and return
/// [`ChatResponse`] (typed, structured content). A single `Provider` impl is
/// reused for the planner, auditor and executor roles — the orchestrator
/// selects the model per role via `RunConfig`.
///
/// # Object safety
///
/// This trait is object-safe: `Arc<dyn Provider>` is the standard storage type.
pub trait Provider: Send + Sync {
    /// Provider identifier (e.g., `"anthropic"`, `"openai"`).
    fn name(&self) -> &str;

    /// Return provider metadata (capabilities, credentials, defaults).
    fn get_info(&self) -> ProviderInfo;

    /// List models available from this provider.
    ///
    /// Implementations may query an API, return a hardcoded list, or return
    /// an empty `Vec` if model discovery is not supported.
    fn list_models(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ModelInfo>, ProviderError>> + Send + '_>>;

    /// Generate a completion from a [`ChatRequest`].
    ///
    /// # Arguments
    ///
    /// * `request` — Typed chat request with messages, tools, and config.
    ///
    /// # Returns
    ///
    /// `Ok(ChatResponse)` with content blocks, optional tool calls, and usage.
    /// `Err(ProviderError)` with a typed error (rate limit, auth, timeout, etc.).
    fn complete(
        &self,
        request: ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatResponse, ProviderError>> + Send + '_>>;

    /// Extract tool calls from a provider response.
    ///
    /// Each provider may encode tool calls differently in the response.
    /// This method normalises them into [`ToolCall`] structs.
    fn parse_tool_calls(&self, response: &ChatResponse) -> Vec<ToolCall>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
