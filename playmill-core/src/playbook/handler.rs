use crate::playbook::task::Task;

/// A task that only runs at the end of a play, against the hosts that
/// notified it. `notified_by` may hold duplicates; the dispatch set is the
/// deduplicated view, in first-notification order.
#[derive(Clone, Debug)]
pub struct Handler {
    task: Task,
    notified_by: Vec<String>,
}

impl Handler {
    pub fn new(task: Task) -> Self {
        Handler {
            task,
            notified_by: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn notify(&mut self, host: &str) {
        self.notified_by.push(host.to_string());
    }

    pub fn has_notifications(&self) -> bool {
        !self.notified_by.is_empty()
    }

    /// The set of notified hosts, first-notification order preserved.
    pub fn notified_hosts(&self) -> Vec<String> {
        let mut hosts = Vec::new();
        for host in &self.notified_by {
            if !hosts.contains(host) {
                hosts.push(host.clone());
            }
        }
        hosts
    }

    /// Clears notifications so the play can be run again.
    pub fn reset_notifications(&mut self) {
        self.notified_by.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::loader::TaskDs;
    use crate::vars::VarMap;

    fn handler() -> Handler {
        let ds = TaskDs {
            name: "restart service".to_string(),
            action: "command /bin/restart".to_string(),
            notify: Vec::new(),
            only_if: None,
            async_seconds: 0,
            poll: 10,
            vars: serde_yaml::Value::Null,
        };
        Handler::new(Task::parse(&ds, &VarMap::new()).unwrap())
    }

    #[test]
    fn duplicate_notifications_collapse_to_a_set() {
        let mut handler = handler();
        handler.notify("h1");
        handler.notify("h3");
        handler.notify("h1");

        assert!(handler.has_notifications());
        assert_eq!(
            handler.notified_hosts(),
            vec!["h1".to_string(), "h3".to_string()]
        );
    }

    #[test]
    fn reset_makes_the_handler_reusable() {
        let mut handler = handler();
        handler.notify("h1");
        handler.reset_notifications();
        assert!(!handler.has_notifications());
    }
}
