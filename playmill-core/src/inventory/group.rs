use crate::vars::VarMap;
use crate::vars::variable::Variable;
use indexmap::IndexMap;
use std::collections::HashSet;

#[derive(Clone, Debug)]
pub struct Group {
    pub name: String,
    vars: VarMap,
    hosts: Vec<String>,
    child_groups: Vec<String>,
}

impl Group {
    pub fn new(name: &str) -> Self {
        Group {
            name: name.to_string(),
            vars: VarMap::new(),
            hosts: Vec::new(),
            child_groups: Vec::new(),
        }
    }

    pub fn add_host(&mut self, host_name: &str) {
        let name = host_name.to_string();
        if !self.hosts.contains(&name) {
            self.hosts.push(name);
        }
    }

    pub fn add_child_group(&mut self, child: &str) {
        let name = child.to_string();
        if !self.child_groups.contains(&name) {
            self.child_groups.push(name);
        }
    }

    pub fn set_variable(&mut self, key: &str, value: Variable) {
        self.vars.insert(key.to_string(), value);
    }

    pub fn get_vars(&self) -> &VarMap {
        &self.vars
    }

    /// Lists the hosts of this group, recursing into child groups. Order
    /// follows declaration; a host reachable through several children is
    /// listed once.
    pub fn get_hosts(&self, groups: &IndexMap<String, Group>) -> Vec<String> {
        let mut hosts = Vec::new();
        let mut seen = HashSet::new();
        self.collect_hosts(groups, &mut hosts, &mut seen);
        hosts
    }

    fn collect_hosts(
        &self,
        groups: &IndexMap<String, Group>,
        hosts: &mut Vec<String>,
        seen: &mut HashSet<String>,
    ) {
        for host in &self.hosts {
            if seen.insert(host.clone()) {
                hosts.push(host.clone());
            }
        }
        for child_name in &self.child_groups {
            // a group that names itself as a descendant would loop forever;
            // seen-host tracking does not protect against that, so guard here
            if child_name == &self.name {
                continue;
            }
            if let Some(child) = groups.get(child_name) {
                child.collect_hosts(groups, hosts, seen);
            }
        }
    }
}
