//! Concrete `Tool` implementations the orchestrator dispatches through the
//! mediator: a shell runner and a file reader (spec §4.4 "currently
//! `shell_tool`, `file_content_tool`").
//!
//! These are the only two tool kinds [`sentinel_core::models::ToolKind`]
//! knows about; the core crate defines the proxy contract and parses this
//! module's output (`mediator::interpret_shell_output` expects the exact
//! `--- STDOUT ---` / `--- STDERR ---` / `--- Command exited with status: N
//! ---` framing produced here), but never runs a process itself (spec §1:
//! "the concrete implementations of shell execution and file reading" are
//! explicitly out of the core's scope).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use sentinel_core::errors::ToolError;
use sentinel_core::messages::ToolSpec;
use sentinel_core::models::ToolResult;
use sentinel_core::traits::Tool;
use serde_json::{json, Value};
use tokio::process::Command;
use tokio::time::timeout;

/// Upper bound on how long a shell invocation may run before it is treated
/// as a timeout failure (spec §5: subprocess helpers use bounded timeouts
/// "in the 5-45 second range").
const SHELL_TIMEOUT_SECS: u64 = 30;

/// Runs a command through `sh -c`, capturing stdout/stderr/exit status into
/// the marker format the mediator parses.
pub struct ShellTool;

impl ShellTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell_tool"
    }

    fn description(&self) -> &str {
        "Runs a shell command in the working directory and reports its stdout, stderr, and exit status."
    }

    fn get_spec(&self) -> ToolSpec {
        let mut parameters = HashMap::new();
        parameters.insert("type".to_string(), json!("object"));
        parameters.insert(
            "properties".to_string(),
            json!({"command": {"type": "string", "description": "Shell command to execute."}}),
        );
        parameters.insert("required".to_string(), json!(["command"]));
        ToolSpec {
            name: self.name().to_string(),
            parameters,
            description: Some(self.description().to_string()),
            extensions: HashMap::new(),
        }
    }

    fn execute(
        &self,
        input: Value,
    ) -> Pin<Box<dyn Future<Output = Result<ToolResult, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let command = input
                .get("command")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::Other {
                    message: "shell_tool requires a string \"command\" argument".to_string(),
                })?
                .to_string();

            let child = Command::new("sh").arg("-c").arg(&command).output();

            let output = match timeout(Duration::from_secs(SHELL_TIMEOUT_SECS), child).await {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    return Err(ToolError::ExecutionFailed {
                        message: e.to_string(),
                        stdout: None,
                        stderr: None,
                        exit_code: None,
                    })
                }
                Err(_) => return Err(ToolError::TimedOut { seconds: SHELL_TIMEOUT_SECS as f64 }),
            };

            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let status = output.status.code().unwrap_or(-1);

            let rendered = if stdout.trim().is_empty() && stderr.trim().is_empty() && status == 0 {
                "[Command executed with no output]".to_string()
            } else {
                format!("--- STDOUT ---\n{stdout}\n--- STDERR ---\n{stderr}\n--- Command exited with status: {status} ---")
            };

            Ok(ToolResult { success: status == 0, output: Some(Value::String(rendered)), error: None })
        })
    }
}

/// Reads a file's contents from disk (spec §4.4 "predominantly ... `path`
/// for file").
pub struct FileContentTool;

impl FileContentTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileContentTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for FileContentTool {
    fn name(&self) -> &str {
        "file_content_tool"
    }

    fn description(&self) -> &str {
        "Reads and returns the full contents of a text file at the given path."
    }

    fn get_spec(&self) -> ToolSpec {
        let mut parameters = HashMap::new();
        parameters.insert("type".to_string(), json!("object"));
        parameters.insert(
            "properties".to_string(),
            json!({"path": {"type": "string", "description": "Path to the file to read."}}),
        );
        parameters.insert("required".to_string(), json!(["path"]));
        ToolSpec {
            name: self.name().to_string(),
            parameters,
            description: Some(self.description().to_string()),
            extensions: HashMap::new(),
        }
    }

    fn execute(
        &self,
        input: Value,
    ) -> Pin<Box<dyn Future<Output = Result<ToolResult, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let path = input
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::Other {
                    message: "file_content_tool requires a string \"path\" argument".to_string(),
                })?
                .to_string();

            let expanded = expand_tilde(&path);

            match tokio::fs::read_to_string(&expanded).await {
                Ok(contents) => Ok(ToolResult { success: true, output: Some(Value::String(contents)), error: None }),
                Err(e) => Ok(ToolResult {
                    success: false,
                    output: Some(Value::String(format!("[ERROR] {e}"))),
                    error: None,
                }),
            }
        })
    }
}

/// Expand a leading `~` to the user's home directory (ported from
/// `tools.py`'s `Path(path).expanduser()`); left untouched otherwise.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') {
            if let Some(home) = std::env::var_os("HOME") {
                return format!("{}{}", home.to_string_lossy(), rest);
            }
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shell_tool_reports_stdout_and_status() {
        let tool = ShellTool::new();
        let result = tool.execute(json!({"command": "echo hi"})).await.unwrap();
        assert!(result.success);
        let output = result.output.unwrap();
        let text = output.as_str().unwrap();
        assert!(text.contains("--- STDOUT ---"));
        assert!(text.contains("hi"));
        assert!(text.contains("--- Command exited with status: 0 ---"));
    }

    #[tokio::test]
    async fn shell_tool_reports_nonzero_exit() {
        let tool = ShellTool::new();
        let result = tool.execute(json!({"command": "exit 3"})).await.unwrap();
        assert!(!result.success);
        let text = result.output.unwrap();
        assert!(text.as_str().unwrap().contains("status: 3"));
    }

    #[tokio::test]
    async fn shell_tool_no_output_sentinel() {
        let tool = ShellTool::new();
        let result = tool.execute(json!({"command": "true"})).await.unwrap();
        assert_eq!(result.output.unwrap(), json!("[Command executed with no output]"));
    }

    #[tokio::test]
    async fn shell_tool_missing_command_is_an_error() {
        let tool = ShellTool::new();
        assert!(tool.execute(json!({})).await.is_err());
    }

    #[tokio::test]
    async fn file_content_tool_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("hello.txt");
        tokio::fs::write(&file_path, "hello world").await.unwrap();

        let tool = FileContentTool::new();
        let result = tool.execute(json!({"path": file_path.to_str().unwrap()})).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output.unwrap(), json!("hello world"));
    }

    #[tokio::test]
    async fn file_content_tool_reports_missing_file() {
        let tool = FileContentTool::new();
        let result = tool.execute(json!({"path": "/no/such/file/here"})).await.unwrap();
        assert!(!result.success);
        assert!(result.output.unwrap().as_str().unwrap().starts_with("[ERROR]"));
    }
}
