//! Anthropic Messages API adapter — the one production [`Provider`]
//! implementation, reused across the planner, auditor, and executor roles
//! (spec §6 "`--executor-model`, `--planner-model`, `--auditor-model`").
//!
//! Grounded on the request/response shape of
//! `examples/querymt-querymt/crates/providers/anthropic`, adapted from that
//! crate's `extism`-hosted WASM plugin form to a plain `reqwest` HTTP
//! client, since this binary runs natively rather than inside a host
//! runtime.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use sentinel_core::errors::ProviderError;
use sentinel_core::messages::{ChatRequest, ChatResponse, ContentBlock, Message, MessageContent, Role, ToolCall, Usage};
use sentinel_core::models::{ModelInfo, ProviderInfo};
use sentinel_core::traits::Provider;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Calls the Anthropic Messages API for one of the three model roles.
///
/// A fresh [`AnthropicProvider`] is constructed per role in `main.rs`
/// (`--executor-model`, `--planner-model`, `--auditor-model` each pick their
/// own model id and parameter object), but all three share the same
/// `reqwest::Client` and credential.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model_id: String,
    params: Value,
}

impl AnthropicProvider {
    /// Build a provider bound to one role's model id and parameter object.
    ///
    /// Reads the API key from `ANTHROPIC_API_KEY` (spec is silent on
    /// credential sourcing; following `querymt-anthropic`'s `get_env_var`
    /// convention rather than accepting the key as a CLI flag, which would
    /// leak it into process listings).
    pub fn new(model_id: String, params: Value) -> Result<Self, ProviderError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| ProviderError::Authentication {
            message: "ANTHROPIC_API_KEY is not set".to_string(),
            provider: Some("anthropic".to_string()),
        })?;
        let base_url = std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::Other {
                message: format!("failed to build HTTP client: {e}"),
                provider: Some("anthropic".to_string()),
                status_code: None,
                retryable: false,
            })?;
        Ok(Self { client, api_key, base_url, model_id, params })
    }
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicContentBlock>,
}

/// Anthropic's wire content block. One struct covers every variant we
/// send (`text`, `tool_use`, `tool_result`); unused fields are omitted via
/// `skip_serializing_if`, mirroring `querymt-anthropic`'s `MessageContent`.
#[derive(Debug, Serialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    block_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "id")]
    tool_use_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "name")]
    tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "input")]
    tool_input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "tool_use_id")]
    tool_result_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "content")]
    tool_output: Option<String>,
}

impl AnthropicContentBlock {
    fn text(text: String) -> Self {
        Self {
            block_type: "text",
            text: Some(text),
            tool_use_id: None,
            tool_name: None,
            tool_input: None,
            tool_result_id: None,
            tool_output: None,
        }
    }

    fn tool_use(id: String, name: String, input: Value) -> Self {
        Self {
            block_type: "tool_use",
            text: None,
            tool_use_id: Some(id),
            tool_name: Some(name),
            tool_input: Some(input),
            tool_result_id: None,
            tool_output: None,
        }
    }

    fn tool_result(tool_use_id: String, content: String) -> Self {
        Self {
            block_type: "tool_result",
            text: None,
            tool_use_id: None,
            tool_name: None,
            tool_input: None,
            tool_result_id: Some(tool_use_id),
            tool_output: Some(content),
        }
    }
}

/// Anthropic-specific tool format (`examples/querymt-querymt`'s
/// `AnthropicTool`): `parameters`/`description` from [`ToolSpec`] map onto
/// `input_schema`/`description`.
#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: HashMap<String, Value>,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponseBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: i64,
    output_tokens: i64,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn get_info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "anthropic".to_string(),
            display_name: "Anthropic".to_string(),
            credential_env_vars: vec!["ANTHROPIC_API_KEY".to_string()],
            capabilities: vec!["tool_calls".to_string(), "streaming".to_string()],
            defaults: HashMap::new(),
            config_fields: Vec::new(),
        }
    }

    fn list_models(&self) -> Pin<Box<dyn Future<Output = Result<Vec<ModelInfo>, ProviderError>> + Send + '_>> {
        Box::pin(async move { Ok(Vec::new()) })
    }

    fn complete(&self, request: ChatRequest) -> Pin<Box<dyn Future<Output = Result<ChatResponse, ProviderError>> + Send + '_>> {
        Box::pin(async move {
            let (system, messages) = split_system_prompt(&request.messages);

            let max_tokens = request.max_output_tokens.and_then(|n| u32::try_from(n).ok()).unwrap_or(4096);

            let mut extra = HashMap::new();
            if let Value::Object(map) = &self.params {
                for (k, v) in map {
                    extra.insert(k.clone(), v.clone());
                }
            }

            let tools = request.tools.as_ref().map(|specs| {
                specs
                    .iter()
                    .map(|spec| AnthropicTool {
                        name: spec.name.clone(),
                        description: spec.description.clone().unwrap_or_default(),
                        input_schema: spec.parameters.clone(),
                    })
                    .collect()
            });

            let body = AnthropicRequest {
                model: self.model_id.clone(),
                max_tokens,
                messages,
                system,
                temperature: request.temperature,
                tools,
                extra,
            };

            let response = self
                .client
                .post(&self.base_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(|e| network_error(&e))?;

            let status = response.status();
            let bytes = response.bytes().await.map_err(|e| network_error(&e))?;

            if !status.is_success() {
                return Err(classify_http_error(status.as_u16(), &bytes));
            }

            let parsed: AnthropicResponse = serde_json::from_slice(&bytes).map_err(|e| ProviderError::Other {
                message: format!("malformed Anthropic response: {e}"),
                provider: Some("anthropic".to_string()),
                status_code: Some(status.as_u16()),
                retryable: false,
            })?;

            let mut content = Vec::new();
            let mut tool_calls = Vec::new();

            for block in parsed.content {
                match block.block_type.as_str() {
                    "text" => content.push(ContentBlock::Text {
                        text: block.text.unwrap_or_default(),
                        visibility: None,
                        extensions: HashMap::new(),
                    }),
                    "tool_use" => {
                        let arguments = match block.input.unwrap_or(Value::Null) {
                            Value::Object(map) => map.into_iter().collect(),
                            _ => HashMap::new(),
                        };
                        tool_calls.push(ToolCall {
                            id: block.id.unwrap_or_default(),
                            name: block.name.unwrap_or_default(),
                            arguments,
                            extensions: HashMap::new(),
                        });
                    }
                    _ => {}
                }
            }

            let usage = parsed.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
                reasoning_tokens: None,
                cache_read_tokens: None,
                cache_write_tokens: None,
                extensions: HashMap::new(),
            });

            Ok(ChatResponse {
                content,
                tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                usage,
                degradation: None,
                finish_reason: parsed.stop_reason,
                metadata: None,
                extensions: HashMap::new(),
            })
        })
    }

    fn parse_tool_calls(&self, response: &ChatResponse) -> Vec<ToolCall> {
        response.tool_calls.clone().unwrap_or_default()
    }
}

/// Anthropic's wire format separates the system prompt from the message
/// list; pull any leading `Role::System` messages out into that slot.
fn split_system_prompt(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system_parts = Vec::new();
    let mut rest = Vec::new();

    for message in messages {
        match message.role {
            Role::System | Role::Developer => system_parts.push(flatten_to_text(&message.content)),
            Role::User | Role::Function | Role::Tool => {
                rest.push(AnthropicMessage { role: "user", content: to_content_blocks(&message.content) })
            }
            Role::Assistant => {
                rest.push(AnthropicMessage { role: "assistant", content: to_content_blocks(&message.content) })
            }
        }
    }

    let system = if system_parts.is_empty() { None } else { Some(system_parts.join("\n\n")) };
    (system, rest)
}

/// Translate a [`MessageContent`] into Anthropic content blocks, preserving
/// `tool_call`/`tool_result` blocks instead of collapsing them to plain text.
fn to_content_blocks(content: &MessageContent) -> Vec<AnthropicContentBlock> {
    match content {
        MessageContent::Text(text) => vec![AnthropicContentBlock::text(text.clone())],
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text, .. } => Some(AnthropicContentBlock::text(text.clone())),
                ContentBlock::ToolCall { id, name, input, .. } => Some(AnthropicContentBlock::tool_use(
                    id.clone(),
                    name.clone(),
                    Value::Object(input.clone().into_iter().collect()),
                )),
                ContentBlock::ToolResult { tool_call_id, output, .. } => Some(AnthropicContentBlock::tool_result(
                    tool_call_id.clone(),
                    stringify_tool_output(output),
                )),
                _ => None,
            })
            .collect(),
    }
}

fn stringify_tool_output(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn flatten_to_text(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text, .. } => Some(text.clone()),
                ContentBlock::ToolResult { output, .. } => Some(stringify_tool_output(output)),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn network_error(e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout { message: e.to_string(), provider: Some("anthropic".to_string()) }
    } else {
        ProviderError::Unavailable { message: e.to_string(), provider: Some("anthropic".to_string()), status_code: None }
    }
}

fn classify_http_error(status_code: u16, body: &[u8]) -> ProviderError {
    let (error_type, message) = match serde_json::from_slice::<AnthropicErrorBody>(body) {
        Ok(parsed) => (parsed.error.error_type, parsed.error.message),
        Err(_) => ("unknown".to_string(), String::from_utf8_lossy(body).to_string()),
    };
    let provider = Some("anthropic".to_string());

    match status_code {
        401 | 403 => ProviderError::Authentication { message, provider },
        429 => ProviderError::RateLimit { message, provider, retry_after: None },
        400 if error_type == "invalid_request_error" && message.contains("context") => {
            ProviderError::ContextLength { message, provider }
        }
        400 | 422 => ProviderError::InvalidRequest { message, provider },
        code if (500..600).contains(&code) => ProviderError::Unavailable { message, provider, status_code: Some(code) },
        code => ProviderError::Other { message, provider, status_code: Some(code), retryable: false },
    }
}
