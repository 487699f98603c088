use crate::framework::Module;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Trivial reachability check.
pub struct Ping;

#[async_trait]
impl Module for Ping {
    async fn run(&self, _args: &Value) -> Result<Value> {
        Ok(json!({ "ping": "pong", "changed": false }))
    }
}
