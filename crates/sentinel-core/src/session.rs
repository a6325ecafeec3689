//! The `Session` entity (spec §3, §4.2).
//!
//! A session is the single unit of persisted state for one `session_hash`:
//! the original query, conversation history, the actions executed so far,
//! the current recipe (if any) and the cursor into it, and the handful of
//! booleans that drive the mediator's auto-approval test (spec §4.4 step
//! 4). Every mutator here updates in-memory state only — callers persist
//! through [`crate::store::SessionStore`] after each mutation, mirroring
//! `session.py`'s "mutate, then `_save_session()`" discipline.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::{ExecutedAction, RecipeStep, ToolKind};

/// One turn of `conversation_history` (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

/// The serializable on-disk projection of a [`Session`].
///
/// Shared by both persistence forms (`crate::store`) so the single-file and
/// archive representations never drift out of sync with each other.
pub type SessionSnapshot = Session;

/// Maximum characters of a result shown in `get_execution_context` before
/// truncation (`session.py::get_execution_context`).
const RESULT_TRUNCATE_LEN: usize = 200;

/// In-memory and on-disk state for one `session_hash` (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_hash: String,

    #[serde(default)]
    pub original_query: Option<String>,

    #[serde(default)]
    pub conversation_history: Vec<HistoryEntry>,

    #[serde(default)]
    pub executed_actions: Vec<ExecutedAction>,

    #[serde(default)]
    pub current_recipe: Option<Vec<RecipeStep>>,

    #[serde(default)]
    pub fallback_action: Option<RecipeStep>,

    #[serde(default)]
    pub step_idx: usize,

    #[serde(default)]
    pub subcmd_idx: usize,

    #[serde(default)]
    pub recipe_preapproved: bool,

    #[serde(default)]
    pub is_single_step_plan: bool,

    #[serde(default)]
    pub deviation_occurred: bool,
}

impl Session {
    /// Create a blank session for a session hash not yet seen (spec §4.2
    /// restore-fallback order, final fallback).
    pub fn new(session_hash: impl Into<String>) -> Self {
        Self {
            session_hash: session_hash.into(),
            original_query: None,
            conversation_history: Vec::new(),
            executed_actions: Vec::new(),
            current_recipe: None,
            fallback_action: None,
            step_idx: 0,
            subcmd_idx: 0,
            recipe_preapproved: false,
            is_single_step_plan: false,
            deviation_occurred: false,
        }
    }

    /// Set the original query, once. Per spec §3's invariant, later calls
    /// are no-ops if a query is already recorded.
    pub fn set_original_query(&mut self, query: impl Into<String>) {
        if self.original_query.is_none() {
            self.original_query = Some(query.into());
        }
    }

    /// Append one turn to `conversation_history`.
    pub fn add_to_history(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.conversation_history.push(HistoryEntry {
            role: role.into(),
            content: content.into(),
        });
    }

    /// Append one completed invocation to `executed_actions`, stamping the
    /// current time (`session.py::add_executed_action`).
    pub fn add_executed_action(&mut self, tool: ToolKind, action: impl Into<String>, result: impl Into<String>) {
        self.executed_actions.push(ExecutedAction {
            tool,
            action: action.into(),
            result: result.into(),
            timestamp: Utc::now().to_rfc3339(),
        });
    }

    /// Store a freshly-parsed plan and reset the cursor/flags
    /// (`session.py::set_plan`). `is_single_step_plan` is derived, not
    /// caller-supplied, per spec §3's mutual-exclusivity invariant.
    pub fn set_plan(&mut self, recipe_steps: Vec<RecipeStep>, fallback_action: Option<RecipeStep>) {
        self.is_single_step_plan = recipe_steps.len() == 1 && fallback_action.is_none();
        self.current_recipe = Some(recipe_steps);
        self.fallback_action = fallback_action;
        self.recipe_preapproved = false;
        self.step_idx = 0;
        self.subcmd_idx = 0;
        self.deviation_occurred = false;
    }

    pub fn set_recipe_preapproved(&mut self, value: bool) {
        self.recipe_preapproved = value;
    }

    pub fn set_single_step_plan(&mut self, value: bool) {
        self.is_single_step_plan = value;
    }

    pub fn set_deviation_occurred(&mut self, value: bool) {
        self.deviation_occurred = value;
    }

    /// Reset the step cursor to the start of the current recipe.
    pub fn reset_step_idx(&mut self) {
        self.step_idx = 0;
        self.subcmd_idx = 0;
    }

    /// Advance to the next recipe step, resetting the subcommand cursor
    /// (`session.py::increment_recipe_step`).
    pub fn increment_step(&mut self) {
        self.step_idx += 1;
        self.subcmd_idx = 0;
    }

    /// Advance the subcommand cursor within the current step
    /// (`session.py::increment_subcommand_idx`).
    pub fn increment_subcmd(&mut self) {
        self.subcmd_idx += 1;
    }

    /// The recipe step the cursor currently expects, if any
    /// (`session.py::get_expected_recipe_step`).
    pub fn get_expected_recipe_step(&self) -> Option<&RecipeStep> {
        self.current_recipe
            .as_ref()
            .and_then(|steps| steps.get(self.step_idx))
    }

    /// The subcommand within the expected step the cursor currently
    /// expects, if the step is a (possibly multi-line) shell action
    /// (`session.py::get_expected_subcommand`).
    pub fn get_expected_subcommand(&self) -> Option<&str> {
        let step = self.get_expected_recipe_step()?;
        if step.tool != ToolKind::ShellTool {
            return None;
        }
        step.subcommands().get(self.subcmd_idx).copied()
    }

    /// Render the execution-context block fed to the planner/auditor/
    /// executor models on every call (`session.py::get_execution_context`).
    pub fn get_execution_context(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(query) = &self.original_query {
            parts.push(format!("Original Request: {query}"));
        }

        if !self.executed_actions.is_empty() {
            let mut lines = vec!["Actions completed so far:".to_string()];
            for (i, action) in self.executed_actions.iter().enumerate() {
                lines.push(format!("  {}. {}: {}", i + 1, action.tool, action.action));
                if !action.result.is_empty() {
                    lines.push(format!("     Result: {}", truncate(&action.result, RESULT_TRUNCATE_LEN)));
                }
            }
            parts.push(lines.join("\n"));
        }

        if self.deviation_occurred {
            parts.push(
                "Note: Agent deviated from the initial pre-approved recipe. \
                 All future actions require individual approval."
                    .to_string(),
            );
        } else if let Some(recipe) = &self.current_recipe {
            let mut lines = vec!["Initial recipe/plan provided to user:".to_string()];
            for (i, step) in recipe.iter().enumerate() {
                let step_marker = if i < self.step_idx {
                    "✅ "
                } else if i == self.step_idx {
                    "▶️ "
                } else {
                    ""
                };
                lines.push(format!("{step_marker}Step {}: {} ({})", i + 1, step.description, step.tool));

                if i == self.step_idx && step.tool == ToolKind::ShellTool {
                    for (j, subcmd) in step.subcommands().iter().enumerate() {
                        let sub_marker = if j < self.subcmd_idx { "✅ " } else { "" };
                        lines.push(format!("    {sub_marker}{subcmd}"));
                    }
                }
            }
            if let Some(fallback) = &self.fallback_action {
                lines.push(format!("Fallback action: {} ({})", fallback.action, fallback.tool));
            }
            parts.push(lines.join("\n"));
        }

        if parts.is_empty() {
            "No prior actions or initial recipe available".to_string()
        } else {
            parts.join("\n\n")
        }
    }
}

/// Truncate `s` to at most `max_len` characters, appending `…` if cut.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len).collect();
        format!("{truncated}…")
    }
}
