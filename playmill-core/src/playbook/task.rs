use crate::playbook::loader::TaskDs;
use crate::vars::variable::yaml_to_var_map;
use crate::vars::{combine, VarMap};
use anyhow::{bail, Result};

/// Module arguments as written in the playbook: either the free-form
/// `key=value ...` tail of an action line, or a full variable mapping (the
/// setup step passes play vars this way).
#[derive(Clone, Debug)]
pub enum ModuleArgs {
    Params(String),
    Vars(VarMap),
}

#[derive(Clone, Debug)]
pub struct Task {
    name: String,
    module_name: String,
    module_args: ModuleArgs,
    module_vars: VarMap,
    notify: Vec<String>,
    only_if: Option<String>,
    async_seconds: u64,
    poll_interval: u64,
}

impl Task {
    /// Builds a runtime task from playbook data. `base_vars` are the play
    /// vars with extra vars already merged on top; task-level vars merge
    /// over those.
    pub fn parse(ds: &TaskDs, base_vars: &VarMap) -> Result<Self> {
        let action = ds.action.trim();
        let (module_name, args) = match action.split_once(char::is_whitespace) {
            Some((module_name, args)) => (module_name, args.trim()),
            None => (action, ""),
        };

        if module_name.is_empty() {
            bail!("task ({}) has an empty action", ds.name);
        }

        let mut module_vars = base_vars.clone();
        combine(&mut module_vars, &yaml_to_var_map(&ds.vars)?);

        Ok(Task {
            name: ds.name.clone(),
            module_name: module_name.to_string(),
            module_args: ModuleArgs::Params(args.to_string()),
            module_vars,
            notify: ds.notify.clone(),
            only_if: ds.only_if.clone(),
            async_seconds: ds.async_seconds,
            poll_interval: ds.poll,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn module_args(&self) -> &ModuleArgs {
        &self.module_args
    }

    pub fn module_vars(&self) -> &VarMap {
        &self.module_vars
    }

    pub fn notify(&self) -> &[String] {
        &self.notify
    }

    pub fn only_if(&self) -> Option<&str> {
        self.only_if.as_deref()
    }

    pub fn async_seconds(&self) -> u64 {
        self.async_seconds
    }

    pub fn poll_interval(&self) -> u64 {
        self.poll_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::variable::Variable;

    fn task_ds(action: &str) -> TaskDs {
        TaskDs {
            name: "test task".to_string(),
            action: action.to_string(),
            notify: Vec::new(),
            only_if: None,
            async_seconds: 0,
            poll: 10,
            vars: serde_yaml::Value::Null,
        }
    }

    #[test]
    fn action_splits_into_module_and_args() {
        let task = Task::parse(&task_ds("command /bin/true --flag"), &VarMap::new()).unwrap();
        assert_eq!(task.module_name(), "command");
        match task.module_args() {
            ModuleArgs::Params(args) => assert_eq!(args, "/bin/true --flag"),
            _ => panic!("expected params"),
        }
    }

    #[test]
    fn bare_action_has_empty_args() {
        let task = Task::parse(&task_ds("ping"), &VarMap::new()).unwrap();
        assert_eq!(task.module_name(), "ping");
        match task.module_args() {
            ModuleArgs::Params(args) => assert!(args.is_empty()),
            _ => panic!("expected params"),
        }
    }

    #[test]
    fn task_vars_override_base_vars() {
        let mut base = VarMap::new();
        base.insert("port".to_string(), Variable::Int(80));
        base.insert("region".to_string(), Variable::String("east".to_string()));

        let mut ds = task_ds("ping");
        ds.vars = serde_yaml::from_str("{port: 8080}").unwrap();

        let task = Task::parse(&ds, &base).unwrap();
        assert_eq!(task.module_vars()["port"], Variable::Int(8080));
        assert_eq!(
            task.module_vars()["region"],
            Variable::String("east".to_string())
        );
    }

    #[test]
    fn empty_action_is_rejected() {
        assert!(Task::parse(&task_ds("  "), &VarMap::new()).is_err());
    }
}
