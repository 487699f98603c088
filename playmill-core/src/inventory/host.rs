use crate::vars::VarMap;
use crate::vars::variable::Variable;

#[derive(Clone, Debug)]
pub struct Host {
    pub name: String,
    vars: VarMap,
    groups: Vec<String>,
}

impl Host {
    pub fn new(name: &str) -> Self {
        Host {
            name: name.to_string(),
            vars: VarMap::new(),
            groups: Vec::new(),
        }
    }

    pub fn get_vars(&self) -> &VarMap {
        &self.vars
    }

    pub fn set_var(&mut self, key: &str, value: Variable) {
        self.vars.insert(key.to_string(), value);
    }

    pub fn add_group(&mut self, group: &str) {
        let group_name = group.to_string();
        if !self.groups.contains(&group_name) {
            self.groups.push(group_name);
        }
    }

    pub fn get_groups(&self) -> &Vec<String> {
        &self.groups
    }
}
