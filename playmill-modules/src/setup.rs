use crate::framework::Module;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::env;

/// Gathers facts about the target and echoes any pushed play variables back
/// as facts so that later tasks can template against them.
pub struct Setup;

fn system_facts() -> Map<String, Value> {
    let mut facts = Map::new();

    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());

    facts.insert("mill_hostname".to_string(), Value::String(host));
    facts.insert(
        "mill_os".to_string(),
        Value::String(env::consts::OS.to_string()),
    );
    facts.insert(
        "mill_arch".to_string(),
        Value::String(env::consts::ARCH.to_string()),
    );
    facts.insert(
        "mill_family".to_string(),
        Value::String(env::consts::FAMILY.to_string()),
    );

    if let Ok(user) = env::var("USER") {
        facts.insert("mill_user".to_string(), Value::String(user));
    }

    facts
}

#[async_trait]
impl Module for Setup {
    async fn run(&self, args: &Value) -> Result<Value> {
        let mut facts = system_facts();

        // pushed variables become facts with the same visibility as the
        // gathered ones
        if let Value::Object(vars) = args {
            for (key, value) in vars {
                if key.starts_with('_') {
                    continue;
                }
                facts.insert(key.clone(), value.clone());
            }
        }

        Ok(json!({ "changed": false, "facts": Value::Object(facts) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn setup_reports_system_facts() {
        let result = Setup.run(&json!({})).await.unwrap();
        let facts = result.get("facts").unwrap();
        assert!(facts.get("mill_os").is_some());
        assert!(facts.get("mill_hostname").is_some());
        assert_eq!(result.get("changed"), Some(&json!(false)));
    }

    #[tokio::test]
    async fn setup_echoes_pushed_vars_as_facts() {
        let result = Setup
            .run(&json!({"http_port": 80, "_internal": true}))
            .await
            .unwrap();
        let facts = result.get("facts").unwrap();
        assert_eq!(facts.get("http_port"), Some(&json!(80)));
        assert!(facts.get("_internal").is_none());
    }
}
