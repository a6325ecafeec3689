//! Shared NDJSON stdin protocol (spec §4.5 "Command loop", §6 "Command
//! stream").
//!
//! One line reader is shared by the orchestrator's command loop and the
//! mediator's approval-reply read (spec §5: "single-threaded cooperative…
//! awaiting a line from standard input"). Both consumers read from the same
//! underlying stream in sequence — there is never a concurrent read, so a
//! plain `&mut` handle to one [`LineReader`] is enough; no locking is
//! required.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};

use crate::errors::IpcError;
use crate::models::ApprovalReply;

/// One front-end → core command (spec §6 "Command stream").
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ExecuteRecipe,
    ExecuteSingleAction,
    ExecuteFallback,
    UserApprovalResponse { approved: bool },
    DenyCurrentAction,
    /// A `type` the core does not recognize (spec §4.5 "Unknown type").
    Unknown { type_name: String },
}

#[derive(Debug, Deserialize)]
struct RawCommand {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    approved: Option<bool>,
}

/// Parse one NDJSON line from the front-end into a [`Command`].
pub fn parse_command(line: &str) -> Result<Command, IpcError> {
    let raw: RawCommand = serde_json::from_str(line).map_err(|e| IpcError::MalformedJson { message: e.to_string() })?;
    Ok(match raw.type_name.as_str() {
        "execute_recipe" => Command::ExecuteRecipe,
        "execute_single_action" => Command::ExecuteSingleAction,
        "execute_fallback" => Command::ExecuteFallback,
        "user_approval_response" => Command::UserApprovalResponse {
            approved: raw.approved.unwrap_or(false),
        },
        "deny_current_action" => Command::DenyCurrentAction,
        other => Command::Unknown { type_name: other.to_string() },
    })
}

/// Parse one NDJSON line as an [`ApprovalReply`] (spec §4.4 step 5).
pub fn parse_approval_reply(line: &str) -> Result<ApprovalReply, IpcError> {
    serde_json::from_str(line).map_err(|e| IpcError::MalformedJson { message: e.to_string() })
}

/// A buffered line-oriented reader over any `AsyncRead` source (`stdin` in
/// production, an in-memory buffer in tests).
pub struct LineReader<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            lines: BufReader::new(source).lines(),
        }
    }

    /// Read the next non-empty line, or `Ok(None)` on EOF
    /// (spec §4.5 "EOF: exit").
    pub async fn next_line(&mut self) -> Result<Option<String>, IpcError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| IpcError::MalformedJson { message: e.to_string() })?;
            match line {
                None => return Ok(None),
                Some(l) if l.trim().is_empty() => continue,
                Some(l) => return Ok(Some(l)),
            }
        }
    }

    /// Read the next line and parse it as a [`Command`]. `Ok(None)` means EOF.
    pub async fn next_command(&mut self) -> Result<Option<Command>, IpcError> {
        match self.next_line().await? {
            None => Ok(None),
            Some(line) => parse_command(&line).map(Some),
        }
    }

    /// Read the next line and parse it as an [`ApprovalReply`].
    /// Returns [`IpcError::Eof`] if stdin closes before a reply arrives.
    pub async fn next_approval(&mut self) -> Result<ApprovalReply, IpcError> {
        match self.next_line().await? {
            None => Err(IpcError::Eof),
            Some(line) => parse_approval_reply(&line),
        }
    }
}

pub fn stdin_reader() -> LineReader<tokio::io::Stdin> {
    LineReader::new(tokio::io::stdin())
}

/// A `request_approval` event payload (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct RequestApprovalPayload {
    pub description: String,
    pub action: String,
    pub tool: String,
}

/// A `plan` event payload (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct PlanPayload {
    pub request: String,
    pub recipe_steps: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_action: Option<Value>,
}
