use crate::framework::{raw_params, Module};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process;

/// Executes a command without going through a shell.
pub struct Command;

pub(crate) fn output_to_value(output: &std::process::Output) -> Value {
    let rc = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();

    let mut result = json!({
        "changed": true,
        "rc": rc,
        "stdout": stdout,
        "stderr": stderr,
    });

    if rc != 0 {
        result["failed"] = json!(1);
        result["msg"] = result["stderr"].clone();
    }

    result
}

#[async_trait]
impl Module for Command {
    async fn run(&self, args: &Value) -> Result<Value> {
        let raw = match raw_params(args) {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return Ok(json!({"failed": 1, "msg": "no command given"})),
        };

        let argv = match shlex::split(raw) {
            Some(argv) if !argv.is_empty() => argv,
            _ => {
                return Ok(json!({
                    "failed": 1,
                    "msg": format!("failed to split command line ({raw})"),
                }))
            }
        };

        let mut cmd = process::Command::new(&argv[0]);
        cmd.args(&argv[1..]);

        if let Some(chdir) = args.get("chdir").and_then(Value::as_str) {
            cmd.current_dir(chdir);
        }

        match cmd.output().await {
            Ok(output) => Ok(output_to_value(&output)),
            Err(err) => Ok(json!({
                "failed": 1,
                "rc": -1,
                "msg": format!("failed to execute {}: {err}", argv[0]),
            })),
        }
    }
}
