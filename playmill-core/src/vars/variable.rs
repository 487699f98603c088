use crate::vars::VarMap;
use anyhow::{bail, Result};
use serde::Serialize;

/// A playbook/inventory variable value. The YAML sources and the JSON
/// module wire format both map onto this.
#[derive(Debug, PartialEq, Clone, Serialize)]
#[serde(untagged)]
pub enum Variable {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Variable>),
    Map(VarMap),
}

impl Variable {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variable::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Variable::Null => serde_json::Value::Null,
            Variable::Bool(b) => serde_json::Value::Bool(*b),
            Variable::Int(i) => serde_json::Value::from(*i),
            Variable::Float(f) => serde_json::Value::from(*f),
            Variable::String(s) => serde_json::Value::String(s.clone()),
            Variable::List(items) => {
                serde_json::Value::Array(items.iter().map(Variable::to_json).collect())
            }
            Variable::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<&serde_yaml::Value> for Variable {
    type Error = anyhow::Error;

    fn try_from(value: &serde_yaml::Value) -> Result<Self> {
        use serde_yaml::Value;

        match value {
            Value::Null => Ok(Variable::Null),
            Value::Bool(b) => Ok(Variable::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Variable::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Variable::Float(f))
                } else {
                    bail!("invalid number format: {:?}", n);
                }
            }
            Value::String(s) => Ok(Variable::String(s.to_string())),
            Value::Sequence(s) => {
                let items: Result<Vec<Variable>> = s.iter().map(Variable::try_from).collect();
                items.map(Variable::List)
            }
            Value::Mapping(m) => {
                let map: Result<VarMap> = m
                    .iter()
                    .map(|(k, v)| {
                        if let Value::String(key) = k {
                            Variable::try_from(v).map(|var| (key.to_string(), var))
                        } else {
                            bail!("mapping key is not a string: {:?}", k);
                        }
                    })
                    .collect();
                map.map(Variable::Map)
            }
            Value::Tagged(t) => bail!("unsupported value type: {:?}", t),
        }
    }
}

impl From<&serde_json::Value> for Variable {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Variable::Null,
            Value::Bool(b) => Variable::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Variable::Int(i)
                } else {
                    Variable::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => Variable::String(s.clone()),
            Value::Array(items) => Variable::List(items.iter().map(Variable::from).collect()),
            Value::Object(map) => Variable::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Variable::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Interprets a YAML value as a variable mapping. `Null` (an absent key in
/// the playbook) yields an empty map.
pub fn yaml_to_var_map(value: &serde_yaml::Value) -> Result<VarMap> {
    match Variable::try_from(value)? {
        Variable::Null => Ok(VarMap::new()),
        Variable::Map(map) => Ok(map),
        other => bail!("expected a mapping of variables, got: {:?}", other),
    }
}

/// Interprets a JSON object (e.g. a facts document from a module) as a
/// variable mapping. Non-objects yield an empty map.
pub fn json_to_var_map(value: &serde_json::Value) -> VarMap {
    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), Variable::from(v)))
            .collect(),
        _ => VarMap::new(),
    }
}
