use crate::constants::DEFAULT_POLL_INTERVAL;
use crate::error::ConfigError;
use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

/// Raw playbook data as it appears on disk; turned into runtime plays by
/// `Play::parse`.
#[derive(Debug, Deserialize)]
pub struct PlayDs {
    pub name: Option<String>,
    pub hosts: String,
    #[serde(default)]
    pub remote_user: Option<String>,
    #[serde(default)]
    pub remote_port: Option<u16>,
    #[serde(default)]
    pub transport: Option<String>,
    #[serde(default)]
    pub sudo: Option<bool>,
    #[serde(default)]
    pub sudo_user: Option<String>,
    #[serde(default)]
    pub vars: serde_yaml::Value,
    #[serde(default)]
    pub vars_files: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<TaskDs>,
    #[serde(default)]
    pub handlers: Vec<TaskDs>,
}

fn default_poll() -> u64 {
    DEFAULT_POLL_INTERVAL
}

#[derive(Debug, Deserialize)]
pub struct TaskDs {
    pub name: String,
    pub action: String,
    #[serde(default)]
    pub notify: Vec<String>,
    #[serde(default)]
    pub only_if: Option<String>,
    #[serde(default, rename = "async")]
    pub async_seconds: u64,
    #[serde(default = "default_poll")]
    pub poll: u64,
    #[serde(default)]
    pub vars: serde_yaml::Value,
}

/// Parses a playbook file into its sequence of play data structures.
pub fn load_playbook(path: &Path) -> Result<Vec<PlayDs>> {
    let invalid = |reason: String| ConfigError::InvalidPlaybook {
        path: path.display().to_string(),
        reason,
    };

    let file = std::fs::File::open(path).map_err(|err| invalid(err.to_string()))?;
    let plays: Vec<PlayDs> =
        serde_yaml::from_reader(file).map_err(|err| invalid(err.to_string()))?;
    Ok(plays)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_playbook_parses_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "- hosts: webservers\n  tasks:\n    - name: noop\n      action: ping\n"
        )
        .unwrap();

        let plays = load_playbook(file.path()).unwrap();
        assert_eq!(plays.len(), 1);
        assert_eq!(plays[0].hosts, "webservers");
        assert_eq!(plays[0].tasks.len(), 1);
        assert_eq!(plays[0].tasks[0].async_seconds, 0);
        assert_eq!(plays[0].tasks[0].poll, DEFAULT_POLL_INTERVAL);
        assert!(plays[0].handlers.is_empty());
    }

    #[test]
    fn malformed_playbook_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "hosts: not-a-list-of-plays").unwrap();

        let err = load_playbook(file.path()).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }
}
