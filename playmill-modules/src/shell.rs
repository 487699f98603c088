use crate::command::output_to_value;
use crate::framework::{raw_params, Module};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process;

/// Executes a command line through `sh -c`, so pipes and redirection work.
pub struct Shell;

#[async_trait]
impl Module for Shell {
    async fn run(&self, args: &Value) -> Result<Value> {
        let raw = match raw_params(args) {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return Ok(json!({"failed": 1, "msg": "no command given"})),
        };

        let mut cmd = process::Command::new("sh");
        cmd.arg("-c").arg(raw);

        if let Some(chdir) = args.get("chdir").and_then(Value::as_str) {
            cmd.current_dir(chdir);
        }

        match cmd.output().await {
            Ok(output) => Ok(output_to_value(&output)),
            Err(err) => Ok(json!({
                "failed": 1,
                "rc": -1,
                "msg": format!("failed to execute shell: {err}"),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shell_supports_pipes() {
        let result = Shell
            .run(&json!({"_raw_params": "echo one two | wc -w"}))
            .await
            .unwrap();
        assert_eq!(result.get("rc"), Some(&json!(0)));
        assert_eq!(
            result.get("stdout").and_then(Value::as_str).map(str::trim),
            Some("2")
        );
    }
}
