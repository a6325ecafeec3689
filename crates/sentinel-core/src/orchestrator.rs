//! The orchestrator (spec §4.5): initial-plan path, resume path, and the
//! front-end command loop.
//!
//! [`AgentOrchestrator`] is a concrete struct rather than a trait: this
//! crate has exactly one orchestration strategy, so there is no swappable
//! implementation to abstract behind `Arc<dyn Orchestrator>` the way the
//! teacher's generic coordinator does for its hook-mounted agents.

use std::collections::HashMap;
use std::io::Write as IoWrite;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::AsyncRead;

use crate::emitter::Emitter;
use crate::errors::OrchestratorError;
use crate::events;
use crate::ipc::{Command, LineReader, PlanPayload};
use crate::mediator::{Mediator, MediatorOutcome};
use crate::messages::{ChatRequest, ContentBlock, Message, MessageContent, Role, ToolSpec};
use crate::plan::parse_plan;
use crate::store::SessionStore;
use crate::traits::{Provider, Tool};

/// Upper bound on executor turns per invocation, guarding against a model
/// that never stops calling tools. Not named in the event/command schema;
/// exceeding it is treated like any other executor failure.
const MAX_EXECUTOR_TURNS: usize = 25;

/// Outcome of running the executor to completion for one command.
enum TurnOutcome {
    Success { summary: String, nutshell: String },
    Cancelled { reason: String },
}

/// Drives the plan → audit → execute lifecycle for one session run.
pub struct AgentOrchestrator<W: IoWrite, R: AsyncRead + Unpin> {
    planner: Arc<dyn Provider>,
    executor: Arc<dyn Provider>,
    tools: HashMap<String, Arc<dyn Tool>>,
    mediator: Mediator,
    store: SessionStore,
    emitter: Emitter<W>,
    stdin: LineReader<R>,
    next_turn_index: usize,
}

impl<W: IoWrite, R: AsyncRead + Unpin> AgentOrchestrator<W, R> {
    pub fn new(
        planner: Arc<dyn Provider>,
        auditor: Arc<dyn Provider>,
        executor: Arc<dyn Provider>,
        tools: Vec<Arc<dyn Tool>>,
        store: SessionStore,
        emitter: Emitter<W>,
        stdin: LineReader<R>,
        output_threshold_bytes: u64,
    ) -> Self {
        let tools = tools.into_iter().map(|tool| (tool.name().to_string(), tool)).collect();
        Self {
            planner,
            executor,
            tools,
            mediator: Mediator::new(auditor, output_threshold_bytes),
            store,
            emitter,
            stdin,
            next_turn_index: 0,
        }
    }

    /// Run the full session: initial-plan path if `is_new_session`, then the
    /// command loop. Returns the process exit code (spec §6 "Exit codes").
    pub async fn run(mut self, is_new_session: bool, query: Option<String>) -> i32 {
        if is_new_session {
            match self.run_initial_plan(query).await {
                Ok(true) => {}
                Ok(false) => return 1,
                Err(e) => {
                    let _ = self.emitter.emit(events::ERROR, json!({"message": e.to_string()}));
                    return 1;
                }
            }
        }
        self.run_command_loop().await
    }

    /// Spec §4.5(a): require the query, plan, parse, audit the first
    /// action, store, emit `plan`. Returns `Ok(true)` to proceed into the
    /// command loop, `Ok(false)` if the run should already exit (empty plan
    /// or unsafe first action — both exit without a `final_summary`, per
    /// spec §4.6 worked example 2).
    async fn run_initial_plan(&mut self, query: Option<String>) -> Result<bool, OrchestratorError> {
        let query = query.ok_or(OrchestratorError::MissingInitialQuery)?;
        let result = self.store.set_original_query(query.clone());
        self.report_store_error(result);
        let result = self.store.append_history("user", query.clone());
        self.report_store_error(result);

        let plan_response = self
            .planner
            .complete(build_planner_request(&query))
            .await
            .map_err(|e| OrchestratorError::Other { message: e.to_string() })?;
        let plan_text = response_text(&plan_response.content);

        let (steps, fallback) = parse_plan(&plan_text);
        if steps.is_empty() {
            let _ = self.emitter.emit(events::ERROR, json!({"message": "Agent could not form a clear initial plan"}));
            let _ = self.emitter.emit(
                events::UNSAFE,
                json!({"reason": "Agent could not form a clear initial plan", "explanation": plan_text}),
            );
            return Ok(false);
        }

        let first_action = steps[0].subcommands().first().copied().unwrap_or(&steps[0].action).to_string();
        let verdict = self.mediator.audit(&first_action, &self.store.get_execution_context()).await;
        if !verdict.safe {
            let _ = self.emitter.emit_typed(events::UNSAFE, &verdict);
            return Ok(false);
        }

        let result = self.store.set_plan(steps.clone(), fallback.clone());
        self.report_store_error(result);
        let _ = self.emitter.emit_typed(
            events::PLAN,
            &PlanPayload {
                request: query,
                recipe_steps: steps.iter().map(|s| serde_json::to_value(s).unwrap_or(Value::Null)).collect(),
                fallback_action: fallback.map(|f| serde_json::to_value(f).unwrap_or(Value::Null)),
            },
        );
        Ok(true)
    }

    /// Spec §4.5 "Command loop". `user_approval_response` is the one
    /// command that passes through and keeps looping (it's consumed by the
    /// mediator's own stdin read, never seen here in practice); every other
    /// command ends the run, mirroring `command_handler.py`'s handlers all
    /// returning `False` to `agent_orchestrator.py`'s `_process_commands`.
    async fn run_command_loop(&mut self) -> i32 {
        loop {
            let command = match self.stdin.next_command().await {
                Ok(Some(command)) => command,
                Ok(None) => return 0,
                Err(e) => {
                    let _ = self.emitter.emit(events::ERROR, json!({"message": e.to_string()}));
                    return 1;
                }
            };

            match command {
                Command::ExecuteRecipe => {
                    let result = self.store.set_recipe_preapproved(true);
                    self.report_store_error(result);
                    let result = self.store.set_single_step_plan(false);
                    self.report_store_error(result);
                    let result = self.store.set_deviation(false);
                    self.report_store_error(result);
                    let result = self.store.reset_cursor();
                    self.report_store_error(result);
                    let request = self.build_continuation_request("Continue executing the approved recipe.");
                    self.drive_executor_and_report(request).await;
                    return 0;
                }
                Command::ExecuteSingleAction => {
                    let result = self.store.set_recipe_preapproved(false);
                    self.report_store_error(result);
                    let result = self.store.set_single_step_plan(true);
                    self.report_store_error(result);
                    let result = self.store.set_deviation(false);
                    self.report_store_error(result);
                    let result = self.store.reset_cursor();
                    self.report_store_error(result);
                    let request = self.build_continuation_request("Execute the proposed single action.");
                    self.drive_executor_and_report(request).await;
                    return 0;
                }
                Command::ExecuteFallback => {
                    let result = self.store.set_recipe_preapproved(false);
                    self.report_store_error(result);
                    let result = self.store.set_single_step_plan(false);
                    self.report_store_error(result);
                    let result = self.store.set_deviation(true);
                    self.report_store_error(result);
                    let request = self.build_continuation_request("The original plan was rejected. Execute the fallback action instead.");
                    self.drive_executor_and_report(request).await;
                    return 0;
                }
                Command::UserApprovalResponse { .. } => {
                    // Consumed by the mediator's own stdin read; a pass-through here.
                    continue;
                }
                Command::DenyCurrentAction => {
                    let _ = self.emitter.emit(
                        events::FINAL_SUMMARY,
                        json!({"summary": "Run cancelled by user", "nutshell": "cancelled", "status": "cancelled"}),
                    );
                    return 0;
                }
                Command::Unknown { type_name } => {
                    let _ = self.emitter.emit(events::ERROR, json!({"message": format!("unknown command type: {type_name}")}));
                    return 1;
                }
            }
        }
    }

    fn build_continuation_request(&self, instruction: &str) -> ChatRequest {
        let context = self.store.get_execution_context();
        let body = format!("{instruction}\n\n{context}");
        ChatRequest {
            messages: vec![Message {
                role: Role::User,
                content: MessageContent::Text(body),
                name: None,
                tool_call_id: None,
                metadata: None,
                extensions: Default::default(),
            }],
            tools: Some(self.tool_specs()),
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

    fn tool_specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|tool| tool.get_spec()).collect()
    }

    /// Spec §7 failure kind 7: "Persistence error — emit `error`; state in
    /// memory is authoritative for the remaining run." Every `SessionStore`
    /// mutator call in this file is routed through here instead of being
    /// silently discarded.
    fn report_store_error(&mut self, result: Result<(), crate::errors::StoreError>) {
        if let Err(e) = result {
            let _ = self.emitter.emit(events::ERROR, json!({"message": format!("persistence error: {e}")}));
        }
    }

    /// Run the executor's tool-calling loop to completion and emit the
    /// resulting `final_summary` (spec §4.5 "invoke the executor, emit
    /// `final_summary` on return").
    async fn drive_executor_and_report(&mut self, initial_request: ChatRequest) {
        match self.run_executor_loop(initial_request).await {
            TurnOutcome::Success { summary, nutshell } => {
                let result = self.store.append_history("assistant", summary.clone());
                self.report_store_error(result);
                let _ = self.emitter.emit(
                    events::FINAL_SUMMARY,
                    json!({"summary": summary, "nutshell": nutshell, "status": "success"}),
                );
            }
            TurnOutcome::Cancelled { reason } => {
                let _ = self.emitter.emit(
                    events::FINAL_SUMMARY,
                    json!({"summary": reason.clone(), "nutshell": "cancelled", "status": "cancelled", "reason": reason}),
                );
            }
        }
    }

    async fn run_executor_loop(&mut self, initial_request: ChatRequest) -> TurnOutcome {
        let mut messages = initial_request.messages.clone();

        for _turn in 0..MAX_EXECUTOR_TURNS {
            let request = ChatRequest {
                messages: messages.clone(),
                ..initial_request.clone()
            };

            let response = match self.executor.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    let _ = self.emitter.emit(events::ERROR, json!({"message": format!("executor call failed: {e}")}));
                    return TurnOutcome::Cancelled { reason: format!("executor error: {e}") };
                }
            };

            let tool_calls = self.executor.parse_tool_calls(&response);
            if tool_calls.is_empty() {
                let summary = response_text(&response.content);
                let nutshell = summary.lines().next().unwrap_or("done").to_string();
                return TurnOutcome::Success { summary, nutshell };
            }

            let mut assistant_blocks = response.content.clone();
            for call in &tool_calls {
                assistant_blocks.push(ContentBlock::ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                    visibility: None,
                    extensions: Default::default(),
                });
            }
            messages.push(Message {
                role: Role::Assistant,
                content: MessageContent::Blocks(assistant_blocks),
                name: None,
                tool_call_id: None,
                metadata: None,
                extensions: Default::default(),
            });

            for call in tool_calls {
                let Some(tool) = self.tools.get(&call.name).cloned() else {
                    let _ = self.emitter.emit(events::ERROR, json!({"message": format!("unknown tool: {}", call.name)}));
                    return TurnOutcome::Cancelled { reason: format!("unknown tool: {}", call.name) };
                };

                let input: Value = Value::Object(call.arguments.clone().into_iter().collect());
                let turn_index = self.next_turn_index;
                self.next_turn_index += 1;

                let outcome = self
                    .mediator
                    .invoke(&tool, input, &mut self.store, &mut self.emitter, &mut self.stdin, turn_index)
                    .await;

                match outcome {
                    MediatorOutcome::Unsafe => {
                        return TurnOutcome::Cancelled { reason: "unsafe action denied by audit".to_string() };
                    }
                    MediatorOutcome::Denied => {
                        return TurnOutcome::Cancelled { reason: "user denied the proposed action".to_string() };
                    }
                    MediatorOutcome::IpcFailure => {
                        return TurnOutcome::Cancelled { reason: "approval could not be obtained".to_string() };
                    }
                    MediatorOutcome::Executed(result) => {
                        let output = result
                            .and_then(|r| r.output)
                            .unwrap_or(Value::Null);
                        messages.push(Message {
                            role: Role::Tool,
                            content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                                tool_call_id: call.id.clone(),
                                output,
                                visibility: None,
                                extensions: Default::default(),
                            }]),
                            name: None,
                            tool_call_id: Some(call.id.clone()),
                            metadata: None,
                            extensions: Default::default(),
                        });
                    }
                }
            }
        }

        TurnOutcome::Cancelled { reason: "executor exceeded the maximum number of turns".to_string() }
    }
}

fn build_planner_request(query: &str) -> ChatRequest {
    let body = format!(
        "User request: {query}\n\n\
         Produce a step-by-step shell command plan. Separate each step with a line \
         containing only `[STEP]`."
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

fn response_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeProvider, FakeTool};
    use serde_json::json;
    use std::collections::HashMap as StdHashMap;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use tempfile::tempdir;

    use crate::errors::ProviderError;
    use crate::messages::{ChatResponse, ToolCall};
    use crate::models::{ModelInfo, ProviderInfo, ToolResult};

    /// A provider that replies with pre-scripted tool calls for N turns,
    /// then a plain text final answer.
    struct ScriptedExecutor {
        turns: Mutex<Vec<ChatResponse>>,
    }

    impl ScriptedExecutor {
        fn new(turns: Vec<ChatResponse>) -> Self {
            Self { turns: Mutex::new(turns) }
        }
    }

    impl Provider for ScriptedExecutor {
        fn name(&self) -> &str {
            "scripted"
        }
        fn get_info(&self) -> ProviderInfo {
            ProviderInfo {
                id: "scripted".into(),
                display_name: "scripted".into(),
                credential_env_vars: vec![],
                capabilities: vec![],
                defaults: StdHashMap::new(),
                config_fields: vec![],
            }
        }
        fn list_models(&self) -> Pin<Box<dyn Future<Output = Result<Vec<ModelInfo>, ProviderError>> + Send + '_>> {
            Box::pin(async { Ok(Vec::new()) })
        }
        fn complete(&self, _request: ChatRequest) -> Pin<Box<dyn Future<Output = Result<ChatResponse, ProviderError>> + Send + '_>> {
            let mut turns = self.turns.lock().unwrap();
            let response = if turns.is_empty() {
                ChatResponse {
                    content: vec![ContentBlock::Text { text: "done".into(), visibility: None, extensions: StdHashMap::new() }],
                    tool_calls: None,
                    usage: None,
                    degradation: None,
                    finish_reason: Some("stop".into()),
                    metadata: None,
                    extensions: StdHashMap::new(),
                }
            } else {
                turns.remove(0)
            };
            Box::pin(async move { Ok(response) })
        }
        fn parse_tool_calls(&self, response: &ChatResponse) -> Vec<ToolCall> {
            response.tool_calls.clone().unwrap_or_default()
        }
    }

    fn tool_call_response(id: &str, name: &str, args: Value) -> ChatResponse {
        let arguments: StdHashMap<String, Value> = match args {
            Value::Object(map) => map.into_iter().collect(),
            _ => StdHashMap::new(),
        };
        ChatResponse {
            content: vec![],
            tool_calls: Some(vec![ToolCall {
                id: id.into(),
                name: name.into(),
                arguments,
                extensions: StdHashMap::new(),
            }]),
            usage: None,
            degradation: None,
            finish_reason: Some("tool_calls".into()),
            metadata: None,
            extensions: StdHashMap::new(),
        }
    }

    fn orchestrator_for(
        dir: &std::path::Path,
        executor: Arc<dyn Provider>,
        tool: Arc<dyn Tool>,
        stdin_script: &str,
    ) -> AgentOrchestrator<Vec<u8>, &'static [u8]> {
        let store = SessionStore::open(dir, false, "sess1").unwrap();
        let planner = Arc::new(FakeProvider::new("planner", "[STEP]\nls"));
        let auditor = Arc::new(FakeProvider::new("auditor", r#"{"safe": true, "reason": "ok", "explanation": "fine"}"#));
        let emitter = Emitter::new(Vec::new(), crate::models::Verbosity::Debug);
        let leaked: &'static [u8] = Box::leak(stdin_script.to_string().into_boxed_str()).as_bytes();
        let stdin = LineReader::new(leaked);
        AgentOrchestrator::new(planner, auditor, executor, vec![tool], store, emitter, stdin, 16768)
    }

    #[tokio::test]
    async fn initial_plan_path_emits_plan_for_nonempty_plan() {
        let dir = tempdir().unwrap();
        let tool: Arc<dyn Tool> = Arc::new(FakeTool::new("shell_tool", "shell"));
        let executor: Arc<dyn Provider> = Arc::new(FakeProvider::new("executor", "done"));
        let orchestrator = orchestrator_for(dir.path(), executor, tool, "");
        let exit = orchestrator.run(true, Some("count python files".into())).await;
        assert_eq!(exit, 0);
    }

    #[tokio::test]
    async fn initial_plan_path_without_query_fails() {
        let dir = tempdir().unwrap();
        let tool: Arc<dyn Tool> = Arc::new(FakeTool::new("shell_tool", "shell"));
        let executor: Arc<dyn Provider> = Arc::new(FakeProvider::new("executor", "done"));
        let orchestrator = orchestrator_for(dir.path(), executor, tool, "");
        let exit = orchestrator.run(true, None).await;
        assert_eq!(exit, 1);
    }

    #[tokio::test]
    async fn empty_plan_exits_without_final_summary() {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path(), false, "sess2").unwrap();
        let planner = Arc::new(FakeProvider::new("planner", "[STEP]\n[STEP]"));
        let auditor = Arc::new(FakeProvider::new("auditor", r#"{"safe": true, "reason": "ok", "explanation": "fine"}"#));
        let executor: Arc<dyn Provider> = Arc::new(FakeProvider::new("executor", "done"));
        let tool: Arc<dyn Tool> = Arc::new(FakeTool::new("shell_tool", "shell"));
        let emitter = Emitter::new(Vec::new(), crate::models::Verbosity::Debug);
        let stdin = LineReader::new("".as_bytes());
        let orchestrator = AgentOrchestrator::new(planner, auditor, executor, vec![tool], store, emitter, stdin, 16768);
        let exit = orchestrator.run(true, Some("do nothing".into())).await;
        assert_eq!(exit, 1);
    }

    #[tokio::test]
    async fn resume_path_skips_planner_and_enters_command_loop() {
        let dir = tempdir().unwrap();
        {
            let mut store = SessionStore::open(dir.path(), false, "sess3").unwrap();
            store
                .set_plan(
                    vec![crate::models::RecipeStep {
                        description: "d".into(),
                        expected_outcome: "e".into(),
                        action: "ls".into(),
                        tool: crate::models::ToolKind::ShellTool,
                    }],
                    None,
                )
                .unwrap();
        }
        let store = SessionStore::open(dir.path(), false, "sess3").unwrap();
        let planner = Arc::new(FakeProvider::new("planner", "unused"));
        let auditor = Arc::new(FakeProvider::new("auditor", r#"{"safe": true, "reason": "ok", "explanation": "fine"}"#));
        let executor: Arc<dyn Provider> = Arc::new(FakeProvider::new("executor", "all done"));
        let tool: Arc<dyn Tool> = Arc::new(FakeTool::new("shell_tool", "shell"));
        let emitter = Emitter::new(Vec::new(), crate::models::Verbosity::Debug);
        let stdin = LineReader::new("{\"type\":\"execute_recipe\"}\n".as_bytes());
        let orchestrator = AgentOrchestrator::new(planner, auditor, executor, vec![tool], store, emitter, stdin, 16768);
        let exit = orchestrator.run(false, None).await;
        assert_eq!(exit, 0);
    }

    #[tokio::test]
    async fn executor_tool_call_loop_runs_to_completion() {
        let dir = tempdir().unwrap();
        let tool: Arc<dyn Tool> = Arc::new(FakeTool::with_responses(
            "shell_tool",
            "shell",
            vec![ToolResult {
                success: true,
                output: Some(json!("--- STDOUT ---\nok\n--- STDERR ---\n--- Command exited with status: 0 ---")),
                error: None,
            }],
        ));
        let executor: Arc<dyn Provider> = Arc::new(ScriptedExecutor::new(vec![tool_call_response(
            "call-1",
            "shell_tool",
            json!({"command": "ls"}),
        )]));

        let mut store = SessionStore::open(dir.path(), false, "sess4").unwrap();
        store
            .set_plan(
                vec![crate::models::RecipeStep {
                    description: "d".into(),
                    expected_outcome: "e".into(),
                    action: "ls".into(),
                    tool: crate::models::ToolKind::ShellTool,
                }],
                None,
            )
            .unwrap();

        let planner = Arc::new(FakeProvider::new("planner", "unused"));
        let auditor = Arc::new(FakeProvider::new("auditor", r#"{"safe": true, "reason": "ok", "explanation": "fine"}"#));
        let emitter = Emitter::new(Vec::new(), crate::models::Verbosity::Debug);
        let stdin = LineReader::new("{\"type\":\"execute_recipe\"}\n".as_bytes());
        let orchestrator = AgentOrchestrator::new(planner, auditor, executor, vec![tool], store, emitter, stdin, 16768);
        let exit = orchestrator.run(false, None).await;
        assert_eq!(exit, 0);
    }

    #[tokio::test]
    async fn deny_current_action_command_emits_cancelled_summary_and_exits() {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path(), false, "sess5").unwrap();
        let planner = Arc::new(FakeProvider::new("planner", "unused"));
        let auditor = Arc::new(FakeProvider::new("auditor", r#"{"safe": true, "reason": "ok", "explanation": "fine"}"#));
        let executor: Arc<dyn Provider> = Arc::new(FakeProvider::new("executor", "unused"));
        let tool: Arc<dyn Tool> = Arc::new(FakeTool::new("shell_tool", "shell"));
        let emitter = Emitter::new(Vec::new(), crate::models::Verbosity::Debug);
        let stdin = LineReader::new("{\"type\":\"deny_current_action\"}\n".as_bytes());
        let orchestrator = AgentOrchestrator::new(planner, auditor, executor, vec![tool], store, emitter, stdin, 16768);
        let exit = orchestrator.run(false, None).await;
        assert_eq!(exit, 0);
    }

    #[tokio::test]
    async fn unknown_command_type_emits_error_and_exits_nonzero() {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path(), false, "sess6").unwrap();
        let planner = Arc::new(FakeProvider::new("planner", "unused"));
        let auditor = Arc::new(FakeProvider::new("auditor", r#"{"safe": true, "reason": "ok", "explanation": "fine"}"#));
        let executor: Arc<dyn Provider> = Arc::new(FakeProvider::new("executor", "unused"));
        let tool: Arc<dyn Tool> = Arc::new(FakeTool::new("shell_tool", "shell"));
        let emitter = Emitter::new(Vec::new(), crate::models::Verbosity::Debug);
        let stdin = LineReader::new("{\"type\":\"frobnicate\"}\n".as_bytes());
        let orchestrator = AgentOrchestrator::new(planner, auditor, executor, vec![tool], store, emitter, stdin, 16768);
        let exit = orchestrator.run(false, None).await;
        assert_eq!(exit, 1);
    }

    #[tokio::test]
    async fn eof_on_command_stream_exits_cleanly() {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path(), false, "sess7").unwrap();
        let planner = Arc::new(FakeProvider::new("planner", "unused"));
        let auditor = Arc::new(FakeProvider::new("auditor", r#"{"safe": true, "reason": "ok", "explanation": "fine"}"#));
        let executor: Arc<dyn Provider> = Arc::new(FakeProvider::new("executor", "unused"));
        let tool: Arc<dyn Tool> = Arc::new(FakeTool::new("shell_tool", "shell"));
        let emitter = Emitter::new(Vec::new(), crate::models::Verbosity::Debug);
        let stdin = LineReader::new("".as_bytes());
        let orchestrator = AgentOrchestrator::new(planner, auditor, executor, vec![tool], store, emitter, stdin, 16768);
        let exit = orchestrator.run(false, None).await;
        assert_eq!(exit, 0);
    }
}
