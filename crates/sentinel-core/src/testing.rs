//! Test fakes for sentinel kernel traits.
//!
//! Concrete, predictable implementations of the module traits for use in
//! tests. Every fake stores configurable return values and records calls so
//! tests can assert both behaviour and interaction patterns.
//!
//! # Design Decisions
//!
//! - **Concrete fakes, not mock frameworks** — AI agents can read and modify
//!   these directly. Mock frameworks (mockall) generate invisible code.
//! - **`Mutex<…>`** for interior mutability — fakes are stored as
//!   `Arc<dyn Trait>` and must be `Send + Sync`.
//! - **Pre-configured responses** — construct with expected outputs;
//!   `execute`/`complete` consume them in order.
//!
//! # Connections
//!
//! Both fakes implement the corresponding trait from [`crate::traits`].
//! They back the planner/auditor/executor `Provider` role in mediator and
//! orchestrator tests, and the `ShellTool`/`FileContentTool` slot in
//! mediator tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use serde_json::Value;

use crate::errors::{ProviderError, ToolError};
use crate::messages::{ChatRequest, ChatResponse, ContentBlock, ToolCall, ToolSpec};
use crate::models::{ModelInfo, ProviderInfo, ToolResult};
use crate::traits::{Provider, Tool};

// ---------------------------------------------------------------------------
// FakeTool
// ---------------------------------------------------------------------------

/// A fake tool that returns pre-configured results and records calls.
///
/// # Usage
///
/// ```rust
/// use sentinel_core::testing::FakeTool;
/// use sentinel_core::traits::Tool;
///
/// let tool = FakeTool::new("shell_tool", "runs a shell command");
/// assert_eq!(tool.name(), "shell_tool");
/// ```
pub struct FakeTool {
    tool_name: String,
    tool_description: String,
    /// Pre-configured responses consumed in order. When exhausted, returns
    /// a default success result.
    responses: Mutex<Vec<ToolResult>>,
    /// Records every input passed to `execute`.
    calls: Mutex<Vec<Value>>,
}

impl FakeTool {
    /// Create a fake tool that always returns a default success result.
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            tool_name: name.into(),
            tool_description: description.into(),
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a fake tool with pre-configured responses consumed in order.
    pub fn with_responses(name: &str, description: &str, responses: Vec<ToolResult>) -> Self {
        Self {
            tool_name: name.into(),
            tool_description: description.into(),
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Return a clone of all recorded call inputs.
    pub fn recorded_calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }
}

impl Tool for FakeTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.tool_description
    }

    fn get_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.tool_name.clone(),
            parameters: HashMap::new(),
            description: Some(self.tool_description.clone()),
            extensions: HashMap::new(),
        }
    }

    fn execute(
        &self,
        input: Value,
    ) -> Pin<Box<dyn Future<Output = Result<ToolResult, ToolError>> + Send + '_>> {
        self.calls.lock().unwrap().push(input.clone());
        let result = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                ToolResult {
                    success: true,
                    output: Some(input),
                    error: None,
                }
            } else {
                responses.remove(0)
            }
        };
        Box::pin(async move { Ok(result) })
    }
}

// ---------------------------------------------------------------------------
// FakeProvider
// ---------------------------------------------------------------------------

/// A fake provider that returns a pre-configured text response.
///
/// Used in place of the planner, auditor, or executor `Provider` role in
/// orchestrator and mediator tests.
pub struct FakeProvider {
    provider_name: String,
    /// Text content returned by `complete`.
    response_text: String,
    /// Records every request passed to `complete`.
    calls: Mutex<Vec<ChatRequest>>,
}

impl FakeProvider {
    /// Create a fake provider that always returns `response_text` as a text block.
    pub fn new(name: &str, response_text: &str) -> Self {
        Self {
            provider_name: name.into(),
            response_text: response_text.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Return a clone of all recorded requests.
    pub fn recorded_calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl Provider for FakeProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn get_info(&self) -> ProviderInfo {
        ProviderInfo {
            id: self.provider_name.clone(),
            display_name: self.provider_name.clone(),
            credential_env_vars: Vec::new(),
            capabilities: Vec::new(),
            defaults: HashMap::new(),
            config_fields: Vec::new(),
        }
    }

    fn list_models(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ModelInfo>, ProviderError>> + Send + '_>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn complete(
        &self,
        request: ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatResponse, ProviderError>> + Send + '_>> {
        self.calls.lock().unwrap().push(request);
        let text = self.response_text.clone();
        Box::pin(async move {
            Ok(ChatResponse {
                content: vec![ContentBlock::Text {
                    text,
                    visibility: None,
                    extensions: HashMap::new(),
                }],
                tool_calls: None,
                usage: None,
                degradation: None,
                finish_reason: Some("stop".into()),
                metadata: None,
                extensions: HashMap::new(),
            })
        })
    }

    fn parse_tool_calls(&self, response: &ChatResponse) -> Vec<ToolCall> {
        response.tool_calls.clone().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn fake_tool_returns_success() {
        let tool = FakeTool::new("shell_tool", "runs a shell command");
        let result = tool
            .execute(serde_json::json!({"action": "ls"}))
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn fake_tool_returns_preconfigured_results() {
        let tool = FakeTool::with_responses(
            "multi",
            "multi tool",
            vec![
                ToolResult {
                    success: true,
                    output: Some(serde_json::json!("first")),
                    error: None,
                },
                ToolResult {
                    success: false,
                    output: None,
                    error: None,
                },
            ],
        );
        let r1 = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(r1.success);
        assert_eq!(r1.output, Some(serde_json::json!("first")));

        let r2 = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(!r2.success);
    }

    #[tokio::test]
    async fn fake_tool_records_calls() {
        let tool = FakeTool::new("rec", "records");
        tool.execute(serde_json::json!({"a": 1})).await.unwrap();
        tool.execute(serde_json::json!({"b": 2})).await.unwrap();
        let calls = tool.recorded_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], serde_json::json!({"a": 1}));
    }

    #[test]
    fn fake_tool_is_arc_compatible() {
        let tool: Arc<dyn Tool> = Arc::new(FakeTool::new("test", "desc"));
        assert_eq!(tool.name(), "test");
        assert_eq!(tool.description(), "desc");
    }

    #[tokio::test]
    async fn fake_provider_returns_response() {
        let provider = FakeProvider::new("test-provider", "Hello from test");
        let req = crate::messages::ChatRequest {
            messages: vec![crate::messages::Message {
                role: crate::messages::Role::User,
                content: crate::messages::MessageContent::Text("hi".into()),
                name: None,
                tool_call_id: None,
                metadata: None,
                extensions: Default::default(),
            }],
            tools: None,
            response_format: None,
            temperature: None,
            top_p: None,
            max_output_tokens: None,
            conversation_id: None,
            stream: None,
            metadata: None,
            model: None,
            tool_choice: None,
            stop: None,
            reasoning_effort: None,
            timeout: None,
            extensions: Default::default(),
        };
        let response = provider.complete(req).await.unwrap();
        assert!(!response.content.is_empty());
    }

    #[test]
    fn fake_provider_is_arc_compatible() {
        let provider: Arc<dyn Provider> = Arc::new(FakeProvider::new("p", "resp"));
        assert_eq!(provider.name(), "p");
    }
}
