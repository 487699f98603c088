use crate::error::ConfigError;
use crate::executor::SetupCache;
use crate::playbook::handler::Handler;
use crate::playbook::loader::PlayDs;
use crate::playbook::task::Task;
use crate::template::Templar;
use crate::vars::variable::yaml_to_var_map;
use crate::vars::{combine, VarMap};
use anyhow::{Context, Result};
use log::debug;
use std::path::Path;

/// One play: a host pattern bound to an ordered list of tasks and
/// handlers, plus play-level variables and connection overrides.
#[derive(Clone, Debug)]
pub struct Play {
    name: String,
    hosts: String,
    remote_user: Option<String>,
    remote_port: Option<u16>,
    transport: Option<String>,
    sudo: Option<bool>,
    sudo_user: Option<String>,
    vars: VarMap,
    vars_files: Vec<String>,
    tasks: Vec<Task>,
    handlers: Vec<Handler>,
}

impl Play {
    /// Builds a runtime play. `extra_vars` take precedence over play vars
    /// when constructing the per-task variable sets.
    pub fn parse(ds: &PlayDs, extra_vars: &VarMap) -> Result<Self> {
        let vars = yaml_to_var_map(&ds.vars)?;

        let mut base_vars = vars.clone();
        combine(&mut base_vars, extra_vars);

        let tasks = ds
            .tasks
            .iter()
            .map(|task| Task::parse(task, &base_vars))
            .collect::<Result<Vec<Task>>>()?;

        let handlers = ds
            .handlers
            .iter()
            .map(|task| Task::parse(task, &base_vars).map(Handler::new))
            .collect::<Result<Vec<Handler>>>()?;

        Ok(Play {
            name: ds.name.clone().unwrap_or_else(|| ds.hosts.clone()),
            hosts: ds.hosts.clone(),
            remote_user: ds.remote_user.clone(),
            remote_port: ds.remote_port,
            transport: ds.transport.clone(),
            sudo: ds.sudo,
            sudo_user: ds.sudo_user.clone(),
            vars,
            vars_files: ds.vars_files.clone(),
            tasks,
            handlers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hosts(&self) -> &str {
        &self.hosts
    }

    pub fn remote_user(&self) -> Option<&str> {
        self.remote_user.as_deref()
    }

    pub fn remote_port(&self) -> Option<u16> {
        self.remote_port
    }

    pub fn transport(&self) -> Option<&str> {
        self.transport.as_deref()
    }

    pub fn sudo(&self) -> Option<bool> {
        self.sudo
    }

    pub fn sudo_user(&self) -> Option<&str> {
        self.sudo_user.as_deref()
    }

    pub fn vars(&self) -> &VarMap {
        &self.vars
    }

    pub fn vars_files(&self) -> &[String] {
        &self.vars_files
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    pub fn handlers_mut(&mut self) -> &mut [Handler] {
        &mut self.handlers
    }

    /// Resolves this play's `vars_files` for each host, templating the file
    /// paths against the host's facts, and merges the loaded variables into
    /// the fact cache. Existing cache entries are never overwritten, so
    /// facts keep priority over file-provided values.
    pub fn update_vars_files(
        &self,
        hosts: &[String],
        cache: &mut SetupCache,
        global_vars: &VarMap,
        templar: &Templar,
        basedir: &Path,
    ) -> Result<()> {
        for host in hosts {
            let mut template_vars = global_vars.clone();
            if let Some(host_cache) = cache.get(host) {
                combine(&mut template_vars, host_cache);
            }

            for vars_file in &self.vars_files {
                let rendered = templar.render(vars_file, &template_vars)?;

                let mut path = Path::new(&rendered).to_path_buf();
                if path.is_relative() {
                    path = basedir.join(path);
                }

                if !path.exists() {
                    return Err(ConfigError::MissingVarsFile(rendered).into());
                }

                debug!("loading vars file {} for host {host}", path.display());

                let file = std::fs::File::open(&path)
                    .with_context(|| format!("failed to open vars file ({})", path.display()))?;
                let data: serde_yaml::Value = serde_yaml::from_reader(file)
                    .with_context(|| format!("failed to parse vars file ({})", path.display()))?;
                let new_vars = yaml_to_var_map(&data)?;

                let entry = cache.entry(host.clone()).or_default();
                for (key, value) in new_vars {
                    if !entry.contains_key(&key) {
                        entry.insert(key, value);
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::variable::Variable;
    use std::io::Write;

    fn play_from_yaml(yaml: &str) -> Play {
        let ds: PlayDs = serde_yaml::from_str(yaml).unwrap();
        Play::parse(&ds, &VarMap::new()).unwrap()
    }

    #[test]
    fn play_name_defaults_to_the_host_pattern() {
        let play = play_from_yaml("hosts: webservers\n");
        assert_eq!(play.name(), "webservers");
    }

    #[test]
    fn extra_vars_take_precedence_in_task_vars() {
        let ds: PlayDs = serde_yaml::from_str(
            "hosts: all\nvars: {port: 80}\ntasks:\n  - {name: t, action: ping}\n",
        )
        .unwrap();

        let mut extra = VarMap::new();
        extra.insert("port".to_string(), Variable::Int(9090));

        let play = Play::parse(&ds, &extra).unwrap();
        assert_eq!(play.tasks()[0].module_vars()["port"], Variable::Int(9090));
        // play vars themselves stay as written
        assert_eq!(play.vars()["port"], Variable::Int(80));
    }

    #[test]
    fn vars_files_do_not_clobber_facts() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("linux.yml")).unwrap();
        write!(file, "port: 9999\nfrom_file: yes\n").unwrap();

        let ds: PlayDs =
            serde_yaml::from_str("hosts: all\nvars_files: ['{{ os }}.yml']\n").unwrap();
        let play = Play::parse(&ds, &VarMap::new()).unwrap();

        let mut cache = SetupCache::new();
        let mut facts = VarMap::new();
        facts.insert("os".to_string(), Variable::String("linux".to_string()));
        facts.insert("port".to_string(), Variable::Int(80));
        cache.insert("h1".to_string(), facts);

        play.update_vars_files(
            &["h1".to_string()],
            &mut cache,
            &VarMap::new(),
            &Templar::new(),
            dir.path(),
        )
        .unwrap();

        let host_cache = &cache["h1"];
        assert_eq!(host_cache["port"], Variable::Int(80));
        assert_eq!(host_cache["from_file"], Variable::Bool(true));
    }

    #[test]
    fn missing_vars_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let ds: PlayDs = serde_yaml::from_str("hosts: all\nvars_files: [nope.yml]\n").unwrap();
        let play = Play::parse(&ds, &VarMap::new()).unwrap();

        let mut cache = SetupCache::new();
        cache.insert("h1".to_string(), VarMap::new());

        let err = play
            .update_vars_files(
                &["h1".to_string()],
                &mut cache,
                &VarMap::new(),
                &Templar::new(),
                dir.path(),
            )
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingVarsFile(_))
        ));
    }
}
