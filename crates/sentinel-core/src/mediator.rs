//! The tool proxy / mediator (spec §4.4 — "the crux of the design").
//!
//! [`Mediator::invoke`] wraps every call the executor makes to a concrete
//! [`crate::traits::Tool`]: audit, plan-match, auto-approval-or-ask, execute,
//! spill large output, interpret shell results, persist, emit. Spec §9's
//! redesign note replaces the source's object-oriented "around hook" with
//! this single explicit mediator function — there is exactly one proxy
//! implementation, so no dynamic hook registration is needed.

use std::io::Write as IoWrite;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::AsyncRead;

use crate::emitter::Emitter;
use crate::errors::IpcError;
use crate::events;
use crate::ipc::{LineReader, RequestApprovalPayload};
use crate::messages::{ChatRequest, Message, MessageContent, Role};
use crate::models::{AuditVerdict, ResultStatus, ToolKind, ToolResult};
use crate::store::SessionStore;
use crate::traits::{Provider, Tool};
use crate::verdict::parse_audit_response;

/// Default spill root; the concrete path is `<ROOT>/<session_hash>/`
/// (spec §6 "Persisted state" — `/tmp/og/<session_hash>/<turn>_<tool>.txt`).
pub const SPILL_ROOT: &str = "/tmp/og";

/// Outcome of one mediated invocation, distinguishing "proceed" from every
/// terminating/non-terminating short-circuit spec §4.4 describes.
#[derive(Debug, Clone, PartialEq)]
pub enum MediatorOutcome {
    /// The tool ran (successfully or not) and a `result` event was emitted.
    Executed(Option<ToolResult>),
    /// The auditor rejected the action; the run should stop here.
    Unsafe,
    /// The user declined approval; the run should stop here.
    Denied,
    /// Stdin closed or sent malformed JSON while awaiting an approval reply.
    IpcFailure,
}

/// Wraps tool invocations with the audit/approval/execute pipeline.
pub struct Mediator {
    auditor: Arc<dyn Provider>,
    output_threshold_bytes: u64,
    spill_root: PathBuf,
}

impl Mediator {
    pub fn new(auditor: Arc<dyn Provider>, output_threshold_bytes: u64) -> Self {
        Self {
            auditor,
            output_threshold_bytes,
            spill_root: PathBuf::from(SPILL_ROOT),
        }
    }

    #[cfg(test)]
    fn with_spill_root(auditor: Arc<dyn Provider>, output_threshold_bytes: u64, spill_root: PathBuf) -> Self {
        Self {
            auditor,
            output_threshold_bytes,
            spill_root,
        }
    }

    /// Run the full ten-step algorithm of spec §4.4 for one proposed call
    /// to `tool` with JSON arguments `input`.
    pub async fn invoke<W: IoWrite, R: AsyncRead + Unpin>(
        &self,
        tool: &Arc<dyn Tool>,
        input: Value,
        store: &mut SessionStore,
        emitter: &mut Emitter<W>,
        stdin: &mut LineReader<R>,
        turn_index: usize,
    ) -> MediatorOutcome {
        let tool_name = tool.name().to_string();
        let action_str = derive_action_str(&input);

        // -- 1/2: audit gate --
        let context = store.get_execution_context();
        let verdict = self.audit(&action_str, &context).await;
        if !verdict.safe {
            if !store.deviation_occurred() {
                report_store_error(emitter, store.set_deviation(true));
            }
            let _ = emitter.emit_typed(events::UNSAFE, &verdict);
            let _ = emitter.emit(events::DENY_CURRENT_ACTION, json!({"message": "Action denied by safety audit"}));
            return MediatorOutcome::Unsafe;
        }

        // -- 3: plan-match test --
        let (is_planned, just_deviated) = self.check_plan_match(store, &tool_name, &action_str);
        if just_deviated && !store.deviation_occurred() {
            report_store_error(emitter, store.set_deviation(true));
        }

        // -- 4: auto-approval test --
        let needs_approval = !is_planned || self.requires_individual_approval(store);

        // -- 5: user-approval gate --
        if needs_approval {
            let description = format!("{tool_name} -> {action_str}");
            report_store_error(emitter, store.append_history("assistant", description.clone()));
            let _ = emitter.emit_typed(
                events::REQUEST_APPROVAL,
                &RequestApprovalPayload {
                    description,
                    action: action_str.clone(),
                    tool: tool_name.clone(),
                },
            );

            let reply = match stdin.next_approval().await {
                Ok(reply) => reply,
                Err(e) => {
                    let _ = emitter.emit(events::ERROR, json!({"message": approval_error_message(&e)}));
                    let _ = emitter.emit(events::DENY_CURRENT_ACTION, json!({"message": "Approval could not be obtained"}));
                    return MediatorOutcome::IpcFailure;
                }
            };

            if !reply.approved {
                let _ = emitter.emit(
                    events::RESULT,
                    json!({"status": "cancelled", "interpret_message": "User denied execution"}),
                );
                let _ = emitter.emit(events::DENY_CURRENT_ACTION, json!({"message": "User denied the proposed action"}));
                return MediatorOutcome::Denied;
            }
        }

        // -- 6: execute --
        let tool_kind = action_str_tool_kind(&tool_name);
        let exec_result = tool.execute(input).await;

        let result = match exec_result {
            Ok(result) => result,
            Err(e) => {
                let error_msg = format!("Tool execution failed: {e}");
                let _ = emitter.emit(events::ERROR, json!({"message": error_msg}));
                report_store_error(emitter, store.append_executed(tool_kind, &action_str, format!("ERROR: {error_msg}")));
                if store.recipe_preapproved() && !store.deviation_occurred() {
                    report_store_error(emitter, store.set_deviation(true));
                }
                let _ = emitter.emit(
                    events::RESULT,
                    json!({"status": "failure", "interpret_message": error_msg, "output": ""}),
                );
                return MediatorOutcome::Executed(None);
            }
        };

        let raw_output = stringify_output(&result.output);

        // -- 7: large-output spill --
        let (final_output, spill_note) = self.maybe_spill(&raw_output, &store.session_hash().to_string(), turn_index, &tool_name);

        // -- 8: shell-result interpretation --
        let (status, interpret_message) = if tool_kind == ToolKind::ShellTool {
            interpret_shell_output(&raw_output)
        } else if result.success {
            (ResultStatus::Success, format!("Executed {tool_name}"))
        } else {
            (ResultStatus::Failure, format!("{tool_name} reported failure"))
        };

        let persisted_result = spill_note.clone().unwrap_or_else(|| raw_output.clone());
        report_store_error(emitter, store.append_executed(tool_kind, &action_str, &persisted_result));

        // -- 9: advance cursor, only for planned invocations --
        if is_planned && matches!(status, ResultStatus::Success) {
            report_store_error(emitter, store.increment_subcmd());
            let past_end = store
                .get_expected_recipe_step()
                .map(|step| store.subcmd_idx() >= step.subcommands().len())
                .unwrap_or(true);
            if past_end {
                report_store_error(emitter, store.increment_step());
            }
        }

        // -- 10: emit result --
        let status_str = match status {
            ResultStatus::Success => "success",
            ResultStatus::Failure => "failure",
            ResultStatus::Cancelled => "cancelled",
        };
        let _ = emitter.emit(
            events::RESULT,
            json!({"status": status_str, "interpret_message": interpret_message, "output": final_output}),
        );

        MediatorOutcome::Executed(Some(result))
    }

    pub async fn audit(&self, action_str: &str, context: &str) -> AuditVerdict {
        let request = build_audit_request(action_str, context);
        match self.auditor.complete(request).await {
            Ok(response) => parse_audit_response(&response_text(&response)),
            Err(_) => AuditVerdict {
                safe: false,
                reason: "Audit evaluation failed".to_string(),
                explanation: "The auditor model could not be reached".to_string(),
            },
        }
    }

    /// Spec §4.4 step 3: is this call the one the recipe cursor expects?
    /// Returns `(is_planned, newly_deviated)`.
    fn check_plan_match(&self, store: &SessionStore, tool_name: &str, action_str: &str) -> (bool, bool) {
        let Some(step) = store.get_expected_recipe_step() else {
            return (false, true);
        };
        if step.tool.as_str() != tool_name {
            return (false, true);
        }
        let Some(expected_subcmd) = store.get_expected_subcommand() else {
            return (false, true);
        };
        if action_str.trim() != expected_subcmd.trim() {
            return (false, true);
        }
        (true, false)
    }

    /// Spec §4.4 step 4: does a planned, non-deviated call still need an
    /// explicit approval?
    fn requires_individual_approval(&self, store: &SessionStore) -> bool {
        if store.deviation_occurred() {
            return true;
        }
        if store.recipe_preapproved() {
            return false;
        }
        if store.is_single_step_plan() {
            // Only the very first subcommand of the very first step is
            // auto-approved.
            return !(store.step_idx() == 0 && store.subcmd_idx() == 0);
        }
        true
    }

    fn maybe_spill(&self, output: &str, session_hash: &str, turn_index: usize, tool_name: &str) -> (String, Option<String>) {
        if (output.len() as u64) <= self.output_threshold_bytes || output.is_empty() {
            return (output.to_string(), None);
        }

        let dir = self.spill_root.join(session_hash);
        let path = dir.join(format!("{turn_index}_{tool_name}.txt"));

        match std::fs::create_dir_all(&dir).and_then(|_| std::fs::write(&path, output)) {
            Ok(()) => {
                let sentinel = format!(
                    "Output exceeded {} bytes and was written to {}. Use `grep`/`cat` on that file to inspect it.",
                    self.output_threshold_bytes,
                    path.display()
                );
                (sentinel.clone(), Some(sentinel))
            }
            Err(_) => (output.to_string(), None),
        }
    }
}

/// Spec §7 failure kind 7: "Persistence error — emit `error`; state in
/// memory is authoritative for the remaining run." Every `SessionStore`
/// mutator call in this module is routed through here instead of being
/// silently discarded.
fn report_store_error<W: IoWrite>(emitter: &mut Emitter<W>, result: Result<(), crate::errors::StoreError>) {
    if let Err(e) = result {
        let _ = emitter.emit(events::ERROR, json!({"message": format!("persistence error: {e}")}));
    }
}

fn approval_error_message(e: &IpcError) -> String {
    match e {
        IpcError::Eof => "Received EOF while awaiting approval reply".to_string(),
        other => format!("Failed to parse approval response from stdin: {other}"),
    }
}

/// Spec §4.4 step 1: `command` if present, else `path`, else the first
/// positional argument, else `"an unknown action"`.
fn derive_action_str(input: &Value) -> String {
    if let Value::Object(map) = input {
        if let Some(Value::String(s)) = map.get("command") {
            return s.clone();
        }
        if let Some(Value::String(s)) = map.get("path") {
            return s.clone();
        }
        if let Some((_, first)) = map.iter().next() {
            if let Value::String(s) = first {
                return s.clone();
            }
            return first.to_string();
        }
    }
    if let Value::String(s) = input {
        return s.clone();
    }
    "an unknown action".to_string()
}

fn action_str_tool_kind(tool_name: &str) -> ToolKind {
    tool_name.parse::<ToolKind>().unwrap_or(ToolKind::ShellTool)
}

fn stringify_output(output: &Option<Value>) -> String {
    match output {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Spec §4.4 step 8: parse `--- STDOUT ---` / `--- STDERR ---` / `--- Command
/// exited with status: N ---` sections out of a shell tool's raw output.
pub fn interpret_shell_output(raw: &str) -> (ResultStatus, String) {
    const NO_OUTPUT: &str = "[Command executed with no output]";
    if raw.trim() == NO_OUTPUT {
        return (ResultStatus::Success, "Command executed with no output".to_string());
    }

    let stdout = section_between(raw, "--- STDOUT ---", "--- STDERR ---");
    let stderr = section_between(raw, "--- STDERR ---", "--- Command exited with status:");
    let exit_code = raw
        .rfind("--- Command exited with status:")
        .and_then(|idx| raw[idx..].split(':').nth(1))
        .and_then(|tail| tail.trim().trim_end_matches("---").trim().parse::<i32>().ok());

    match exit_code {
        Some(0) => (ResultStatus::Success, summarize(&stdout, &stderr)),
        Some(code) => (ResultStatus::Failure, format!("Command exited with status {code}: {}", summarize(&stdout, &stderr))),
        None => {
            // No recognizable markers at all: treat any non-empty body as a
            // successful, unstructured result.
            if raw.trim().is_empty() {
                (ResultStatus::Success, "Command executed with no output".to_string())
            } else {
                (ResultStatus::Success, raw.trim().to_string())
            }
        }
    }
}

fn section_between(raw: &str, start_marker: &str, end_marker: &str) -> String {
    let Some(start) = raw.find(start_marker) else {
        return String::new();
    };
    let after_start = &raw[start + start_marker.len()..];
    match after_start.find(end_marker) {
        Some(end) => after_start[..end].trim().to_string(),
        None => after_start.trim().to_string(),
    }
}

fn summarize(stdout: &str, stderr: &str) -> String {
    if !stdout.is_empty() {
        stdout.to_string()
    } else if !stderr.is_empty() {
        stderr.to_string()
    } else {
        "Command executed with no output".to_string()
    }
}

fn build_audit_request(action_str: &str, context: &str) -> ChatRequest {
    let body = format!(
        "Proposed action: {action_str}\n\nExecution context:\n{context}\n\n\
         Reply with a safety verdict: either JSON {{\"safe\": bool, \"reason\": str, \"explanation\": str}} \
         or the markdown form `# SAFE: <true|false>` / `# REASON: <...>` / `# EXPLANATION: <...>`."
    );
    ChatRequest {
        messages: vec![Message {
            role: Role::User,
            content: MessageContent::Text(body),
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
    }
}

fn response_text(response: &crate::messages::ChatResponse) -> String {
    response
        .content
        .iter()
        .filter_map(|block| match block {
            crate::messages::ContentBlock::Text { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
