use crate::inventory::group::Group;
use crate::inventory::host::Host;
use crate::inventory::parser;
use crate::inventory::utils::glob_to_regex;
use crate::vars::VarMap;
use anyhow::Result;
use indexmap::IndexMap;
use log::warn;

/// The engine's view of the fleet: groups, hosts, their variables, and a
/// LIFO restriction stack narrowing what `list_hosts` returns while a task
/// or handler is being dispatched.
pub struct InventoryManager {
    groups: IndexMap<String, Group>,
    hosts: IndexMap<String, Host>,
    restrictions: Vec<Vec<String>>,
    is_script: bool,
}

impl Default for InventoryManager {
    fn default() -> Self {
        Self::new()
    }
}

fn pattern_priority(pattern: &str) -> u8 {
    if pattern.starts_with('!') {
        2
    } else if pattern.starts_with('&') {
        1
    } else {
        0
    }
}

impl InventoryManager {
    pub fn new() -> Self {
        InventoryManager {
            groups: IndexMap::new(),
            hosts: IndexMap::new(),
            restrictions: Vec::new(),
            is_script: false,
        }
    }

    pub fn parse_sources(&mut self, sources: &[String]) -> Result<()> {
        for source in sources {
            let script = parser::parse_source(source, &mut self.groups, &mut self.hosts)?;
            self.is_script = self.is_script || script;
        }
        Ok(())
    }

    /// Whether any source was a dynamic inventory script.
    pub fn is_script(&self) -> bool {
        self.is_script
    }

    pub fn get_host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    pub fn list_groups(&self) -> Vec<&Group> {
        self.groups.values().collect()
    }

    /// Variables declared on the named group, empty if it does not exist.
    pub fn get_group_variables(&self, name: &str) -> VarMap {
        self.groups
            .get(name)
            .map(|group| group.get_vars().clone())
            .unwrap_or_default()
    }

    /// Lists hosts matching the pattern (`all` when absent), filtered
    /// through every active restriction.
    pub fn list_hosts(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let mut selected = self.filter_hosts(pattern.unwrap_or("all"))?;
        for restriction in &self.restrictions {
            selected.retain(|host| restriction.contains(host));
        }
        Ok(selected)
    }

    /// Pushes a restriction; until it is lifted, `list_hosts` only returns
    /// hosts in the given set. Restrictions nest strictly (LIFO).
    pub fn restrict_to(&mut self, hosts: &[String]) {
        self.restrictions.push(hosts.to_vec());
    }

    pub fn lift_restriction(&mut self) {
        if self.restrictions.pop().is_none() {
            warn!("lift_restriction called with no restriction in place");
        }
    }

    pub fn restriction_depth(&self) -> usize {
        self.restrictions.len()
    }

    /// Resolves a host pattern against the full inventory, ignoring
    /// restrictions. Patterns are comma/semicolon-separated globs over
    /// group and host names; `!` excludes, `&` intersects.
    pub fn filter_hosts(&self, pattern: &str) -> Result<Vec<String>> {
        let mut patterns: Vec<String> = pattern
            .split([',', ';'])
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        patterns.sort_by_key(|p| pattern_priority(p));

        self.apply_patterns(&patterns)
    }

    fn apply_patterns(&self, patterns: &[String]) -> Result<Vec<String>> {
        let mut selected = Vec::new();

        for pattern in patterns {
            if let Some(stripped) = pattern.strip_prefix('!') {
                let matched = self.enumerate_matches(stripped)?;
                selected.retain(|host| !matched.contains(host));
            } else if let Some(stripped) = pattern.strip_prefix('&') {
                let matched = self.enumerate_matches(stripped)?;
                selected.retain(|host| matched.contains(host));
            } else {
                for host in self.enumerate_matches(pattern)? {
                    if !selected.contains(&host) {
                        selected.push(host);
                    }
                }
            }
        }

        Ok(selected)
    }

    fn enumerate_matches(&self, pattern: &str) -> Result<Vec<String>> {
        if pattern == "all" || pattern == "*" {
            return Ok(self.hosts.keys().cloned().collect());
        }

        let regex = glob_to_regex(pattern)?;
        let mut matches = Vec::new();

        for (name, group) in &self.groups {
            if regex.is_match(name) {
                for host in group.get_hosts(&self.groups) {
                    if !matches.contains(&host) {
                        matches.push(host);
                    }
                }
            }
        }

        for name in self.hosts.keys() {
            if regex.is_match(name) && !matches.contains(name) {
                matches.push(name.clone());
            }
        }

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_hosts(names: &[&str]) -> InventoryManager {
        let mut manager = InventoryManager::new();
        manager
            .parse_sources(&[names.join(",")])
            .expect("host list parses");
        manager
    }

    #[test]
    fn restrictions_nest_and_lift() {
        let mut manager = manager_with_hosts(&["h1", "h2", "h3"]);

        manager.restrict_to(&["h1".to_string(), "h2".to_string()]);
        manager.restrict_to(&["h2".to_string()]);
        assert_eq!(manager.list_hosts(None).unwrap(), vec!["h2".to_string()]);
        assert_eq!(manager.restriction_depth(), 2);

        manager.lift_restriction();
        assert_eq!(
            manager.list_hosts(None).unwrap(),
            vec!["h1".to_string(), "h2".to_string()]
        );

        manager.lift_restriction();
        assert_eq!(manager.list_hosts(None).unwrap().len(), 3);
        assert_eq!(manager.restriction_depth(), 0);
    }

    #[test]
    fn restriction_filters_pattern_matches() {
        let mut manager = manager_with_hosts(&["web1", "web2", "db1"]);

        manager.restrict_to(&["web2".to_string(), "db1".to_string()]);
        assert_eq!(
            manager.list_hosts(Some("web*")).unwrap(),
            vec!["web2".to_string()]
        );
    }

    #[test]
    fn exclusion_applies_after_additions() {
        let manager = manager_with_hosts(&["web1", "web2", "db1"]);
        // exclusions sort after additions regardless of written order
        let hosts = manager.filter_hosts("!web2, web*").unwrap();
        assert_eq!(hosts, vec!["web1".to_string()]);
    }

    #[test]
    fn unknown_pattern_matches_nothing() {
        let manager = manager_with_hosts(&["web1"]);
        assert!(manager.list_hosts(Some("mail*")).unwrap().is_empty());
    }
}
