use crate::vars::variable::json_to_var_map;
use crate::vars::VarMap;
use indexmap::IndexMap;
use serde_json::{json, Value};

/// One host's outcome for one module invocation. The well-known fields are
/// explicit; anything else a module reports is preserved in `extra`.
#[derive(Debug, Clone, Default)]
pub struct TaskResult {
    pub changed: bool,
    pub failed: bool,
    pub skipped: bool,
    pub unreachable: bool,
    pub rc: Option<i64>,
    pub msg: Option<String>,
    pub facts: Option<VarMap>,
    pub extra: IndexMap<String, Value>,
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().map_or(true, |i| i != 0),
        Value::Null => false,
        _ => true,
    }
}

impl TaskResult {
    /// Parses a module's JSON report.
    pub fn from_value(value: &Value) -> Self {
        let mut result = TaskResult::default();

        let Value::Object(map) = value else {
            result.failed = true;
            result.msg = Some(format!("module returned non-object data: {value}"));
            return result;
        };

        for (key, val) in map {
            match key.as_str() {
                "changed" => result.changed = truthy(val),
                "failed" => result.failed = truthy(val),
                "skipped" => result.skipped = truthy(val),
                "rc" => result.rc = val.as_i64(),
                "msg" => result.msg = val.as_str().map(str::to_string),
                "facts" => result.facts = Some(json_to_var_map(val)),
                _ => {
                    result.extra.insert(key.clone(), val.clone());
                }
            }
        }

        result
    }

    pub fn skipped() -> Self {
        TaskResult {
            skipped: true,
            ..Default::default()
        }
    }

    pub fn failure(msg: String) -> Self {
        TaskResult {
            failed: true,
            msg: Some(msg),
            ..Default::default()
        }
    }

    /// Transport-level failure; the host counts as dark, not failed.
    pub fn dark(msg: String) -> Self {
        TaskResult {
            unreachable: true,
            msg: Some(msg),
            ..Default::default()
        }
    }

    /// Synthesized for hosts that never reported back from an async job.
    pub fn timed_out() -> Self {
        TaskResult {
            failed: true,
            rc: None,
            msg: Some("timed out".to_string()),
            ..Default::default()
        }
    }

    /// Initial record for a host whose async job was just launched.
    pub fn started(job_id: &str) -> Self {
        let mut extra = IndexMap::new();
        extra.insert("started".to_string(), json!(1));
        extra.insert("job_id".to_string(), json!(job_id));
        TaskResult {
            extra,
            ..Default::default()
        }
    }

    /// Whether this result counts against the host's failure tally.
    pub fn is_failure(&self) -> bool {
        self.failed || self.rc.map_or(false, |rc| rc != 0)
    }

    /// Renders the result back into the JSON shape callbacks receive.
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        if self.changed {
            map.insert("changed".to_string(), json!(true));
        }
        if self.failed {
            map.insert("failed".to_string(), json!(1));
        }
        if self.skipped {
            map.insert("skipped".to_string(), json!(true));
        }
        if self.unreachable {
            map.insert("unreachable".to_string(), json!(true));
        }
        if let Some(rc) = self.rc {
            map.insert("rc".to_string(), json!(rc));
        }
        if let Some(msg) = &self.msg {
            map.insert("msg".to_string(), json!(msg));
        }
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// What a runner hands back: per-host results for the hosts it reached and
/// the reasons for the ones it could not.
#[derive(Debug, Default)]
pub struct RunResults {
    pub contacted: IndexMap<String, TaskResult>,
    pub dark: IndexMap<String, TaskResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::variable::Variable;

    #[test]
    fn parses_known_fields_and_keeps_the_rest() {
        let result = TaskResult::from_value(&json!({
            "changed": true,
            "rc": 0,
            "stdout": "hello",
            "facts": {"os": "linux"},
        }));

        assert!(result.changed);
        assert!(!result.is_failure());
        assert_eq!(result.rc, Some(0));
        assert_eq!(result.extra["stdout"], json!("hello"));
        assert_eq!(
            result.facts.unwrap()["os"],
            Variable::String("linux".to_string())
        );
    }

    #[test]
    fn failed_accepts_integers_and_booleans() {
        assert!(TaskResult::from_value(&json!({"failed": 1})).is_failure());
        assert!(TaskResult::from_value(&json!({"failed": true})).is_failure());
        assert!(!TaskResult::from_value(&json!({"failed": 0})).is_failure());
    }

    #[test]
    fn nonzero_rc_is_a_failure() {
        assert!(TaskResult::from_value(&json!({"rc": 2})).is_failure());
        assert!(!TaskResult::from_value(&json!({"rc": 0})).is_failure());
    }

    #[test]
    fn timed_out_matches_the_synthesized_shape() {
        let result = TaskResult::timed_out();
        assert!(result.is_failure());
        assert_eq!(result.rc, None);
        assert_eq!(result.msg.as_deref(), Some("timed out"));
    }
}
