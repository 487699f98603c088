pub mod variable;

use variable::Variable;

pub type VarMap = indexmap::IndexMap<String, Variable>;

/// Merges `source` into `target`; on key conflict the `source` value wins.
pub fn combine(target: &mut VarMap, source: &VarMap) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}
