use crate::framework::find_module;
use anyhow::Result;
use async_trait::async_trait;
use playmill_plugins::connection::{Connection, ConnectionContext};
use serde_json::{json, Value};

/// Connection backend that runs modules in-process on the control machine.
/// Useful on its own for localhost plays and as the reference backend for
/// the connection seam.
pub struct LocalConnection;

#[async_trait]
impl Connection for LocalConnection {
    async fn exec_module(
        &self,
        _host: &str,
        _context: &ConnectionContext,
        module_name: &str,
        args: &Value,
    ) -> Result<Value> {
        let module = match find_module(module_name) {
            Some(module) => module,
            None => {
                return Ok(json!({
                    "failed": 1,
                    "msg": format!("module ({module_name}) not found"),
                }))
            }
        };

        match module.run(args).await {
            Ok(result) => Ok(result),
            // a module that cannot even produce a report is still a module
            // failure, not a transport failure
            Err(err) => Ok(json!({"failed": 1, "msg": err.to_string()})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_module_is_reported_not_raised() {
        let ctx = ConnectionContext::default();
        let result = LocalConnection
            .exec_module("localhost", &ctx, "no_such_module", &json!({}))
            .await
            .unwrap();
        assert_eq!(result.get("failed"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn ping_round_trip() {
        let ctx = ConnectionContext::default();
        let result = LocalConnection
            .exec_module("localhost", &ctx, "ping", &json!({}))
            .await
            .unwrap();
        assert_eq!(result.get("ping"), Some(&json!("pong")));
    }
}
