use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};

use crate::extension::{Extension, ToolDefinition, ToolResponse};

/// The hard ceiling on a single `execute_command` invocation, independent
/// of any per-step `timeout` enforced by the interpreter.
const BASH_TIMEOUT: Duration = Duration::from_secs(30);

/// The built-in `Bash` extension: a minimal MCP-like shell runner.
pub struct BashExtension;

impl BashExtension {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BashExtension {
    fn default() -> Self {
        Self::new()
    }
}

impl Extension for BashExtension {
    fn name(&self) -> &str {
        "Bash"
    }

    fn describe(&self) -> ToolDefinition {
        ToolDefinition {
            name: "execute_command".to_string(),
            description: "Execute a bash command on the host system.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The command to execute"
                    }
                },
                "required": ["command"]
            }),
        }
    }

    fn invoke(&self, tool_name: &str, arguments: &Map<String, Value>) -> anyhow::Result<ToolResponse> {
        if tool_name != "execute_command" {
            anyhow::bail!("Unknown tool: {tool_name}");
        }

        let command = arguments
            .get("command")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Missing 'command' argument"))?;

        Ok(run_with_timeout(command, BASH_TIMEOUT))
    }
}

fn run_with_timeout(command: &str, timeout: Duration) -> ToolResponse {
    let mut child = match Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => return ToolResponse::error(err.to_string()),
    };

    // Drain stdout/stderr on their own threads while we poll for exit below;
    // a command writing more than the pipe buffer would otherwise block on
    // write and never exit, reporting a spurious timeout.
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_reader = std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = stdout_pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    });
    let stderr_reader = std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = stderr_pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    });

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if started.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(err) => {
                let _ = stdout_reader.join();
                let _ = stderr_reader.join();
                return ToolResponse::error(err.to_string());
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    match status {
        None => ToolResponse::error(format!(
            "command timed out after {}s",
            timeout.as_secs()
        )),
        Some(status) if status.success() => ToolResponse::ok(stdout),
        Some(status) => {
            let code = status.code().unwrap_or(-1);
            ToolResponse::error(format!("Error (Exit Code {code}):\n{stderr}\n{stdout}"))
        }
    }
}
