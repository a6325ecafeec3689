//! sentinel-core: kernel for the sentinel interactive agent supervisor.
//!
//! This crate owns the session state machine, the audit/approval mediator,
//! the plan parser, the dual-form session store, and the orchestrator that
//! drives the plan → audit → execute lifecycle described in the project
//! specification. It has no dependency on any concrete LLM SDK or shell
//! sandbox — those are consumed through the [`traits::Tool`] and
//! [`traits::Provider`] seams and supplied by `sentinel-cli`.
//!
//! # Crate organization
//!
//! - `events` — canonical NDJSON event-type constants
//! - `errors` — error taxonomy (`SentinelError` and its component errors)
//! - `models` — core data models (`RecipeStep`, `AuditVerdict`, `ToolKind`, …)
//! - `messages` — chat protocol envelope (`ChatRequest`/`ChatResponse`/…)
//! - `traits` — `Tool` and `Provider` module contracts
//! - `session` — the `Session` entity and execution-context rendering
//! - `store` — dual-form persistence and the mutator contract
//! - `plan` — `[STEP]`-delimited plan parser
//! - `verdict` — auditor verdict parse cascade
//! - `emitter` — NDJSON event emitter with verbosity filtering
//! - `mediator` — the tool proxy's audit/approval/execute algorithm
//! - `orchestrator` — initial-plan path, resume path, command loop
//! - `ipc` — shared NDJSON stdin line reader
//! - `config` — typed CLI configuration
//! - `testing` — test doubles for `Tool`/`Provider`

pub mod config;
pub mod emitter;
pub mod errors;
pub mod events;
pub mod ipc;
pub mod mediator;
pub mod messages;
pub mod models;
pub mod orchestrator;
pub mod plan;
pub mod session;
pub mod store;
pub mod traits;
pub mod verdict;

#[cfg(test)]
pub mod testing;
