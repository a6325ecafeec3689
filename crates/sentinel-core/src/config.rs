//! Typed run configuration for the sentinel CLI surface (spec §6 "CLI
//! surface").
//!
//! [`RunConfig`] is the validated, typed form of the process's arguments.
//! `sentinel-cli` owns argument parsing (`clap`) and hands this module raw
//! strings; [`RunConfig::from_raw`] does the JSON-shape and required-field
//! validation described in spec §7 failure kind 1 ("Configuration error"),
//! named-field-by-field in the style of `amplifier-core`'s
//! `SessionConfig::from_value`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ConfigError;
use crate::models::Verbosity;

/// Default output-threshold in bytes before a tool result is spilled to a
/// temporary file (spec §6).
pub const DEFAULT_OUTPUT_THRESHOLD_BYTES: u64 = 16768;

/// One model role's id plus its free-form parameter object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub model_id: String,
    #[serde(default)]
    pub params: Value,
}

/// Raw, unvalidated argument strings as `clap` collects them.
///
/// Every field here is exactly one CLI flag from spec §6; `sentinel-cli`'s
/// `clap::Parser` struct maps onto this 1:1 before handing it to
/// [`RunConfig::from_raw`] for validation.
#[derive(Debug, Clone, Default)]
pub struct RawArgs {
    pub query: Option<String>,
    pub session_hash: Option<String>,
    pub workdir: Option<String>,
    pub executor_model: Option<String>,
    pub executor_params: Option<String>,
    pub planner_model: Option<String>,
    pub planner_params: Option<String>,
    pub auditor_model: Option<String>,
    pub auditor_params: Option<String>,
    pub verbosity: Option<String>,
    pub summary_mode: bool,
    pub output_threshold_bytes: Option<u64>,
    pub json_logs_enabled: Option<bool>,
    pub cache_directory: Option<String>,
}

/// Validated configuration for one orchestrator run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub query: Option<String>,
    pub session_hash: String,
    pub workdir: PathBuf,
    pub executor: ModelSpecValidated,
    pub planner: ModelSpecValidated,
    pub auditor: ModelSpecValidated,
    pub verbosity: Verbosity,
    pub summary_mode: bool,
    pub output_threshold_bytes: u64,
    pub json_logs_enabled: bool,
    pub cache_directory: PathBuf,
}

/// A [`ModelSpec`] after its `params` string has been parsed as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpecValidated {
    pub model_id: String,
    pub params: Value,
}

impl RunConfig {
    /// Validate `raw` into a [`RunConfig`], mirroring the required-argument
    /// and JSON-shape checks of spec §7 failure kind 1.
    pub fn from_raw(raw: RawArgs) -> Result<Self, ConfigError> {
        let session_hash = raw.session_hash.ok_or_else(|| ConfigError::MissingArgument {
            field: "session-hash".into(),
        })?;
        let workdir = raw.workdir.ok_or_else(|| ConfigError::MissingArgument {
            field: "workdir".into(),
        })?;

        let executor_model = raw.executor_model.ok_or_else(|| ConfigError::MissingArgument {
            field: "executor-model".into(),
        })?;
        let planner_model = raw.planner_model.ok_or_else(|| ConfigError::MissingArgument {
            field: "planner-model".into(),
        })?;
        let auditor_model = raw.auditor_model.ok_or_else(|| ConfigError::MissingArgument {
            field: "auditor-model".into(),
        })?;

        let executor = ModelSpecValidated {
            model_id: executor_model,
            params: parse_params("executor-params", raw.executor_params)?,
        };
        let planner = ModelSpecValidated {
            model_id: planner_model,
            params: parse_params("planner-params", raw.planner_params)?,
        };
        let auditor = ModelSpecValidated {
            model_id: auditor_model,
            params: parse_params("auditor-params", raw.auditor_params)?,
        };

        let verbosity = match raw.verbosity {
            Some(s) => s.parse::<Verbosity>().map_err(|message| ConfigError::InvalidJson {
                field: "verbosity".into(),
                message,
            })?,
            None => Verbosity::Info,
        };

        let cache_directory = raw
            .cache_directory
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_directory);

        Ok(RunConfig {
            query: raw.query,
            session_hash,
            workdir: PathBuf::from(workdir),
            executor,
            planner,
            auditor,
            verbosity,
            summary_mode: raw.summary_mode,
            output_threshold_bytes: raw.output_threshold_bytes.unwrap_or(DEFAULT_OUTPUT_THRESHOLD_BYTES),
            json_logs_enabled: raw.json_logs_enabled.unwrap_or(false),
            cache_directory,
        })
    }
}

/// Parse a `--*-params` flag's raw text as a JSON object, defaulting to an
/// empty object when the flag was omitted.
fn parse_params(field: &str, raw: Option<String>) -> Result<Value, ConfigError> {
    let Some(text) = raw else {
        return Ok(Value::Object(Default::default()));
    };
    let value: Value = serde_json::from_str(&text).map_err(|e| ConfigError::InvalidJson {
        field: field.to_string(),
        message: e.to_string(),
    })?;
    if !value.is_object() {
        return Err(ConfigError::InvalidJson {
            field: field.to_string(),
            message: "must be a JSON object".to_string(),
        });
    }
    Ok(value)
}

/// `~/.local/share/sentinel`, the session-state home directory, used when
/// `--cache-directory` is not given (ported from `session.py`'s
/// `~/.local/share/og` default).
fn default_cache_directory() -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    home.join(".local").join("share").join("sentinel")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_raw() -> RawArgs {
        RawArgs {
            query: Some("count python files".into()),
            session_hash: Some("a".repeat(64)),
            workdir: Some("/tmp/work".into()),
            executor_model: Some("exec-model".into()),
            executor_params: None,
            planner_model: Some("plan-model".into()),
            planner_params: None,
            auditor_model: Some("audit-model".into()),
            auditor_params: None,
            verbosity: None,
            summary_mode: false,
            output_threshold_bytes: None,
            json_logs_enabled: None,
            cache_directory: None,
        }
    }

    #[test]
    fn valid_raw_args_produce_config_with_defaults() {
        let config = RunConfig::from_raw(valid_raw()).unwrap();
        assert_eq!(config.verbosity, Verbosity::Info);
        assert_eq!(config.output_threshold_bytes, DEFAULT_OUTPUT_THRESHOLD_BYTES);
        assert!(!config.json_logs_enabled);
        assert_eq!(config.executor.params, Value::Object(Default::default()));
    }

    #[test]
    fn missing_session_hash_is_an_error() {
        let mut raw = valid_raw();
        raw.session_hash = None;
        let err = RunConfig::from_raw(raw).unwrap_err();
        assert!(err.to_string().contains("session-hash"));
    }

    #[test]
    fn missing_workdir_is_an_error() {
        let mut raw = valid_raw();
        raw.workdir = None;
        let err = RunConfig::from_raw(raw).unwrap_err();
        assert!(err.to_string().contains("workdir"));
    }

    #[test]
    fn missing_model_ids_are_errors() {
        let mut raw = valid_raw();
        raw.executor_model = None;
        let err = RunConfig::from_raw(raw).unwrap_err();
        assert!(err.to_string().contains("executor-model"));
    }

    #[test]
    fn invalid_params_json_is_an_error() {
        let mut raw = valid_raw();
        raw.executor_params = Some("not json".into());
        let err = RunConfig::from_raw(raw).unwrap_err();
        assert!(err.to_string().contains("executor-params"));
    }

    #[test]
    fn non_object_params_json_is_an_error() {
        let mut raw = valid_raw();
        raw.executor_params = Some("[1, 2, 3]".into());
        let err = RunConfig::from_raw(raw).unwrap_err();
        assert!(err.to_string().contains("must be a JSON object"));
    }

    #[test]
    fn valid_params_json_parses() {
        let mut raw = valid_raw();
        raw.executor_params = Some(r#"{"temperature": 0.2}"#.into());
        let config = RunConfig::from_raw(raw).unwrap();
        assert_eq!(config.executor.params["temperature"], 0.2);
    }

    #[test]
    fn invalid_verbosity_is_an_error() {
        let mut raw = valid_raw();
        raw.verbosity = Some("loud".into());
        assert!(RunConfig::from_raw(raw).is_err());
    }

    #[test]
    fn explicit_cache_directory_is_honored() {
        let mut raw = valid_raw();
        raw.cache_directory = Some("/var/lib/sentinel".into());
        let config = RunConfig::from_raw(raw).unwrap();
        assert_eq!(config.cache_directory, PathBuf::from("/var/lib/sentinel"));
    }
}
