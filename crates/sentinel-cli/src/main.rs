//! CLI entry point (spec §6 "CLI surface").
//!
//! Parses the flag surface with `clap`, validates it into a
//! [`sentinel_core::config::RunConfig`], wires up the two concrete tools and
//! three [`AnthropicProvider`] instances, and drives
//! [`AgentOrchestrator::run`] to completion.

mod provider;
mod tools;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use sentinel_core::config::{RawArgs, RunConfig};
use sentinel_core::emitter::Emitter;
use sentinel_core::ipc;
use sentinel_core::orchestrator::AgentOrchestrator;
use sentinel_core::store::SessionStore;
use sentinel_core::traits::{Provider, Tool};

use provider::AnthropicProvider;
use tools::{FileContentTool, ShellTool};

/// An interactive agent supervisor: audits and mediates every tool call an
/// executor model proposes before it touches the workstation.
#[derive(Parser, Debug)]
#[command(name = "sentinel", author, version, about, long_about = None)]
struct Args {
    /// Natural-language task for a new session. Required unless resuming.
    #[arg(long)]
    query: Option<String>,

    /// Hex session identifier; a prior run with the same hash resumes.
    #[arg(long)]
    session_hash: String,

    /// Working directory the process changes into before any tool runs.
    #[arg(long)]
    workdir: String,

    #[arg(long)]
    executor_model: String,
    #[arg(long)]
    executor_params: Option<String>,

    #[arg(long)]
    planner_model: String,
    #[arg(long)]
    planner_params: Option<String>,

    #[arg(long)]
    auditor_model: String,
    #[arg(long)]
    auditor_params: Option<String>,

    /// `debug | info | warn | none`.
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[arg(long)]
    summary_mode: bool,

    #[arg(long)]
    output_threshold_bytes: Option<u64>,

    #[arg(long)]
    json_logs_enabled: Option<bool>,

    #[arg(long)]
    cache_directory: Option<String>,
}

impl From<Args> for RawArgs {
    fn from(args: Args) -> Self {
        RawArgs {
            query: args.query,
            session_hash: Some(args.session_hash),
            workdir: Some(args.workdir),
            executor_model: Some(args.executor_model),
            executor_params: args.executor_params,
            planner_model: Some(args.planner_model),
            planner_params: args.planner_params,
            auditor_model: Some(args.auditor_model),
            auditor_params: args.auditor_params,
            verbosity: Some(args.verbosity),
            summary_mode: args.summary_mode,
            output_threshold_bytes: args.output_threshold_bytes,
            json_logs_enabled: args.json_logs_enabled,
            cache_directory: args.cache_directory,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let config = match RunConfig::from_raw(args.into()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{{\"type\":\"error\",\"message\":{:?}}}", e.to_string());
            return ExitCode::from(1);
        }
    };

    if let Err(e) = std::env::set_current_dir(&config.workdir) {
        eprintln!("{{\"type\":\"error\",\"message\":\"failed to enter workdir: {e}\"}}");
        return ExitCode::from(1);
    }

    let is_new_session = !SessionStore::exists(&config.cache_directory, &config.session_hash);
    let store = match SessionStore::open(config.cache_directory.clone(), config.json_logs_enabled, &config.session_hash) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{{\"type\":\"error\",\"message\":\"failed to open session store: {e}\"}}");
            return ExitCode::from(1);
        }
    };

    let planner: Arc<dyn Provider> = match AnthropicProvider::new(config.planner.model_id.clone(), config.planner.params.clone()) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            eprintln!("{{\"type\":\"error\",\"message\":\"failed to configure planner model: {e}\"}}");
            return ExitCode::from(1);
        }
    };
    let auditor: Arc<dyn Provider> = match AnthropicProvider::new(config.auditor.model_id.clone(), config.auditor.params.clone()) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            eprintln!("{{\"type\":\"error\",\"message\":\"failed to configure auditor model: {e}\"}}");
            return ExitCode::from(1);
        }
    };
    let executor: Arc<dyn Provider> = match AnthropicProvider::new(config.executor.model_id.clone(), config.executor.params.clone()) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            eprintln!("{{\"type\":\"error\",\"message\":\"failed to configure executor model: {e}\"}}");
            return ExitCode::from(1);
        }
    };

    let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(ShellTool::new()), Arc::new(FileContentTool::new())];

    let emitter = Emitter::new(io::stdout(), config.verbosity);
    let stdin = ipc::stdin_reader();

    let orchestrator = AgentOrchestrator::new(
        planner,
        auditor,
        executor,
        tools,
        store,
        emitter,
        stdin,
        config.output_threshold_bytes,
    );

    let exit_code = orchestrator.run(is_new_session, config.query).await;
    ExitCode::from(exit_code as u8)
}
