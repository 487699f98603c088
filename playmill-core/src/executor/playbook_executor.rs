use crate::callbacks::CallbackRegistry;
use crate::constants;
use crate::error::ConfigError;
use crate::executor::runner::Runner;
use crate::executor::stats::{AggregateStats, HostSummary};
use crate::executor::task_result::{RunResults, TaskResult};
use crate::executor::SetupCache;
use crate::inventory::manager::InventoryManager;
use crate::playbook::handler::Handler;
use crate::playbook::loader;
use crate::playbook::play::Play;
use crate::playbook::task::{ModuleArgs, Task};
use crate::template::Templar;
use crate::vars::{combine, VarMap};
use anyhow::Result;
use indexmap::IndexMap;
use log::debug;
use playmill_plugins::callback::EventType;
use playmill_plugins::connection::{Connection, ConnectionContext};
use serde_json::json;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Connection and dispatch defaults for the whole run; plays override some
/// of them per play.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub forks: usize,
    pub timeout: u64,
    pub remote_user: Option<String>,
    pub remote_pass: Option<String>,
    pub remote_port: Option<u16>,
    pub transport: String,
    pub private_key_file: Option<PathBuf>,
    pub sudo: bool,
    pub sudo_user: Option<String>,
    pub sudo_pass: Option<String>,
    pub module_path: Vec<PathBuf>,
    pub basedir: PathBuf,
}

/// Drives a playbook to completion: plays in order, tasks of each play in
/// order, handlers after the tasks. Parallelism lives entirely inside the
/// per-task runner; this type itself never runs two things at once, which
/// is what makes the fact cache and ledger bookkeeping safe.
impl std::fmt::Debug for PlaybookExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybookExecutor").finish_non_exhaustive()
    }
}

pub struct PlaybookExecutor {
    plays: Vec<Play>,
    inventory: InventoryManager,
    setup_cache: SetupCache,
    global_vars: VarMap,
    extra_vars: VarMap,
    stats: AggregateStats,
    templar: Templar,
    callbacks: CallbackRegistry,
    runner_callbacks: Arc<CallbackRegistry>,
    connections: IndexMap<String, Arc<dyn Connection>>,
    options: RunOptions,
}

impl PlaybookExecutor {
    pub fn builder(playbook: impl Into<PathBuf>) -> PlaybookExecutorBuilder {
        PlaybookExecutorBuilder::new(playbook.into())
    }

    pub fn inventory(&self) -> &InventoryManager {
        &self.inventory
    }

    pub fn stats(&self) -> &AggregateStats {
        &self.stats
    }

    /// Runs every play and returns the per-host summary. Host failures are
    /// accounted, not raised; only configuration errors (bad playbook,
    /// unknown handler, unknown transport) abort the run.
    pub async fn run(&mut self) -> Result<IndexMap<String, HostSummary>> {
        self.callbacks.emit(EventType::PlaybookOnStart, None);

        let mut plays = mem::take(&mut self.plays);
        let mut outcome = Ok(());
        for play in plays.iter_mut() {
            // facts never leak across plays
            self.setup_cache.clear();
            outcome = self.run_play(play).await;
            if outcome.is_err() {
                break;
            }
        }
        self.plays = plays;
        outcome?;

        let mut results = IndexMap::new();
        for host in self.stats.processed_hosts() {
            let summary = self.stats.summarize(&host);
            results.insert(host, summary);
        }

        self.callbacks
            .emit(EventType::PlaybookOnStats, serde_json::to_value(&results).ok());

        Ok(results)
    }

    async fn run_play(&mut self, play: &mut Play) -> Result<()> {
        debug!("running play: {}", play.name());
        self.callbacks.emit(
            EventType::PlaybookOnPlayStart,
            Some(json!({"play": play.name()})),
        );

        self.do_setup_step(play, false).await?;

        // conditional variable file imports need the facts from the first
        // pass to resolve their templated paths
        if !play.vars_files().is_empty() {
            self.do_setup_step(play, true).await?;
        }

        for task in play.tasks().to_vec() {
            self.run_task(play, &task, false).await?;
        }

        for index in 0..play.handlers().len() {
            if !play.handlers()[index].has_notifications() {
                continue;
            }

            let notified = play.handlers()[index].notified_hosts();
            let handler_task = play.handlers()[index].task().clone();

            self.inventory.restrict_to(&notified);
            let outcome = self.run_task(play, &handler_task, true).await;
            self.inventory.lift_restriction();
            outcome?;

            play.handlers_mut()[index].reset_notifications();
        }

        Ok(())
    }

    /// Pushes play variables down to each target and pulls host facts back
    /// up. The primary pass replaces each host's cache entry wholesale; the
    /// secondary pass only resolves `vars_files` and never overwrites.
    async fn do_setup_step(&mut self, play: &Play, secondary: bool) -> Result<RunResults> {
        let host_list: Vec<String> = self
            .inventory
            .list_hosts(Some(play.hosts()))?
            .into_iter()
            .filter(|host| !self.stats.is_excluded(host))
            .collect();

        if secondary {
            self.callbacks.emit(EventType::PlaybookOnSetupSecondary, None);
            play.update_vars_files(
                &host_list,
                &mut self.setup_cache,
                &self.global_vars,
                &self.templar,
                &self.options.basedir,
            )?;
        } else {
            self.callbacks.emit(EventType::PlaybookOnSetupPrimary, None);
        }

        self.inventory.restrict_to(&host_list);
        let outcome = self.run_setup(play, &host_list).await;
        self.inventory.lift_restriction();
        let results = outcome?;

        self.stats.compute(&results, true);

        if !secondary {
            // first pass only or we'd erase what the tasks merged in
            for (host, result) in &results.contacted {
                if let Some(facts) = &result.facts {
                    self.setup_cache.insert(host.clone(), facts.clone());
                }
            }
        }

        Ok(results)
    }

    async fn run_setup(&self, play: &Play, targets: &[String]) -> Result<RunResults> {
        let mut module_vars = play.vars().clone();
        combine(&mut module_vars, &self.extra_vars);

        let runner = self.build_runner(
            play,
            "setup",
            ModuleArgs::Vars(play.vars().clone()),
            module_vars,
            None,
            targets,
        )?;
        Ok(runner.run().await)
    }

    async fn run_task(&mut self, play: &mut Play, task: &Task, is_handler: bool) -> Result<()> {
        let event = if is_handler {
            EventType::PlaybookOnHandlerTaskStart
        } else {
            EventType::PlaybookOnTaskStart
        };
        self.callbacks.emit(event, Some(json!({"task": task.name()})));

        let results = self.run_task_internal(play, task).await?;

        // fold facts into the cache for the tasks that follow
        for (host, result) in &results.contacted {
            if let Some(facts) = &result.facts {
                let entry = self.setup_cache.entry(host.clone()).or_default();
                for (key, value) in facts {
                    entry.insert(key.clone(), value.clone());
                }
            }
        }

        self.stats.compute(&results, false);

        if !task.notify().is_empty() {
            for (host, result) in &results.contacted {
                if result.changed {
                    for handler_name in task.notify() {
                        let name = self.templar.render(handler_name, task.module_vars())?;
                        Self::flag_handler(&self.callbacks, play.handlers_mut(), &name, host)?;
                    }
                }
            }
        }

        Ok(())
    }

    async fn run_task_internal(&mut self, play: &Play, task: &Task) -> Result<RunResults> {
        let working: Vec<String> = self
            .inventory
            .list_hosts(None)?
            .into_iter()
            .filter(|host| !self.stats.is_excluded(host))
            .collect();

        self.inventory.restrict_to(&working);
        let outcome = self.dispatch_task(play, task).await;
        self.inventory.lift_restriction();
        outcome
    }

    async fn dispatch_task(&mut self, play: &Play, task: &Task) -> Result<RunResults> {
        let targets = self.inventory.list_hosts(Some(play.hosts()))?;

        let runner = self.build_runner(
            play,
            task.module_name(),
            task.module_args().clone(),
            task.module_vars().clone(),
            task.only_if().map(str::to_string),
            &targets,
        )?;

        if task.async_seconds() == 0 {
            return Ok(runner.run().await);
        }

        let (initial, mut poller) = runner.run_async(task.async_seconds()).await;
        self.stats.compute(&initial, false);

        if task.poll_interval() == 0 {
            // fire and forget: the initial fold above is the only one
            return Ok(RunResults::default());
        }

        let mut results = poller.wait(task.async_seconds(), task.poll_interval()).await;

        // whatever is still pending missed its deadline
        for host in poller.hosts_to_poll() {
            let reason = TaskResult::timed_out();
            self.runner_callbacks.emit(
                EventType::RunnerOnFailed,
                Some(json!({"host": host, "result": reason.to_value()})),
            );
            results.contacted.insert(host, reason);
        }

        Ok(results)
    }

    fn flag_handler(
        callbacks: &CallbackRegistry,
        handlers: &mut [Handler],
        handler_name: &str,
        host: &str,
    ) -> Result<()> {
        let mut found = false;
        for handler in handlers.iter_mut() {
            if handler.name() == handler_name {
                found = true;
                callbacks.emit(
                    EventType::PlaybookOnNotify,
                    Some(json!({"host": host, "handler": handler_name})),
                );
                handler.notify(host);
            }
        }

        if !found {
            return Err(ConfigError::UndefinedHandler(handler_name.to_string()).into());
        }
        Ok(())
    }

    fn build_runner(
        &self,
        play: &Play,
        module_name: &str,
        module_args: ModuleArgs,
        module_vars: VarMap,
        conditional: Option<String>,
        targets: &[String],
    ) -> Result<Arc<Runner>> {
        let transport = play.transport().unwrap_or(&self.options.transport);
        let connection = self
            .connections
            .get(transport)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownTransport(transport.to_string()))?;

        let context = ConnectionContext {
            remote_user: play
                .remote_user()
                .map(str::to_string)
                .or_else(|| self.options.remote_user.clone()),
            remote_pass: self.options.remote_pass.clone(),
            remote_port: play.remote_port().or(self.options.remote_port),
            private_key_file: self.options.private_key_file.clone(),
            sudo: play.sudo().unwrap_or(self.options.sudo),
            sudo_user: play
                .sudo_user()
                .map(str::to_string)
                .or_else(|| self.options.sudo_user.clone()),
            sudo_pass: self.options.sudo_pass.clone(),
            module_path: self.options.module_path.clone(),
            timeout: self.options.timeout,
        };

        let host_vars: IndexMap<String, VarMap> = targets
            .iter()
            .filter_map(|name| {
                self.inventory
                    .get_host(name)
                    .map(|host| (name.clone(), host.get_vars().clone()))
            })
            .collect();

        let runner = Runner::builder(module_name, connection)
            .hosts(targets.to_vec())
            .module_args(module_args)
            .module_vars(module_vars)
            .global_vars(self.global_vars.clone())
            .host_vars(host_vars)
            .conditional(conditional)
            .forks(self.options.forks)
            .timeout(self.options.timeout)
            .context(context)
            .setup_cache(Arc::new(self.setup_cache.clone()))
            .callbacks(self.runner_callbacks.clone())
            .build();

        Ok(Arc::new(runner))
    }
}

pub struct PlaybookExecutorBuilder {
    playbook: PathBuf,
    inventory_sources: Vec<String>,
    extra_vars: VarMap,
    callbacks: CallbackRegistry,
    runner_callbacks: CallbackRegistry,
    connections: IndexMap<String, Arc<dyn Connection>>,
    forks: usize,
    timeout: u64,
    remote_user: Option<String>,
    remote_pass: Option<String>,
    remote_port: Option<u16>,
    transport: String,
    private_key_file: Option<PathBuf>,
    sudo: bool,
    sudo_user: Option<String>,
    sudo_pass: Option<String>,
    module_path: Vec<PathBuf>,
}

impl PlaybookExecutorBuilder {
    pub fn new(playbook: PathBuf) -> Self {
        PlaybookExecutorBuilder {
            playbook,
            inventory_sources: Vec::new(),
            extra_vars: VarMap::new(),
            callbacks: CallbackRegistry::new(),
            runner_callbacks: CallbackRegistry::new(),
            connections: IndexMap::new(),
            forks: constants::default_forks(),
            timeout: constants::default_timeout(),
            remote_user: None,
            remote_pass: None,
            remote_port: None,
            transport: constants::default_transport(),
            private_key_file: None,
            sudo: false,
            sudo_user: Some(constants::DEFAULT_SUDO_USER.to_string()),
            sudo_pass: None,
            module_path: Vec::new(),
        }
    }

    pub fn inventory_sources(mut self, sources: Vec<String>) -> Self {
        self.inventory_sources = sources;
        self
    }

    pub fn extra_vars(mut self, extra_vars: VarMap) -> Self {
        self.extra_vars = extra_vars;
        self
    }

    pub fn callbacks(mut self, callbacks: CallbackRegistry) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn runner_callbacks(mut self, runner_callbacks: CallbackRegistry) -> Self {
        self.runner_callbacks = runner_callbacks;
        self
    }

    /// Registers a transport backend under the given name. Plays select a
    /// backend with their `transport` key.
    pub fn connection(mut self, name: &str, connection: Arc<dyn Connection>) -> Self {
        self.connections.insert(name.to_string(), connection);
        self
    }

    pub fn forks(mut self, forks: usize) -> Self {
        self.forks = forks;
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn remote_user(mut self, remote_user: Option<String>) -> Self {
        self.remote_user = remote_user;
        self
    }

    pub fn remote_pass(mut self, remote_pass: Option<String>) -> Self {
        self.remote_pass = remote_pass;
        self
    }

    pub fn remote_port(mut self, remote_port: Option<u16>) -> Self {
        self.remote_port = remote_port;
        self
    }

    pub fn transport(mut self, transport: &str) -> Self {
        self.transport = transport.to_string();
        self
    }

    pub fn private_key_file(mut self, private_key_file: Option<PathBuf>) -> Self {
        self.private_key_file = private_key_file;
        self
    }

    pub fn sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    pub fn sudo_user(mut self, sudo_user: Option<String>) -> Self {
        self.sudo_user = sudo_user;
        self
    }

    pub fn sudo_pass(mut self, sudo_pass: Option<String>) -> Self {
        self.sudo_pass = sudo_pass;
        self
    }

    pub fn module_path(mut self, module_path: Vec<PathBuf>) -> Self {
        self.module_path = module_path;
        self
    }

    pub fn build(self) -> Result<PlaybookExecutor> {
        let mut inventory = InventoryManager::new();
        inventory.parse_sources(&self.inventory_sources)?;

        // dynamic inventories resolve group variables themselves
        let global_vars = if inventory.is_script() {
            VarMap::new()
        } else {
            inventory.get_group_variables("all")
        };

        let basedir = self
            .playbook
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let plays = loader::load_playbook(&self.playbook)?
            .iter()
            .map(|ds| Play::parse(ds, &self.extra_vars))
            .collect::<Result<Vec<Play>>>()?;

        let mut module_path = self.module_path;
        module_path.push(basedir.join("library"));

        if !self.connections.contains_key(&self.transport) {
            return Err(ConfigError::UnknownTransport(self.transport).into());
        }

        Ok(PlaybookExecutor {
            plays,
            inventory,
            setup_cache: SetupCache::new(),
            global_vars,
            extra_vars: self.extra_vars,
            stats: AggregateStats::new(),
            templar: Templar::new(),
            callbacks: self.callbacks,
            runner_callbacks: Arc::new(self.runner_callbacks),
            connections: self.connections,
            options: RunOptions {
                forks: self.forks,
                timeout: self.timeout,
                remote_user: self.remote_user,
                remote_pass: self.remote_pass,
                remote_port: self.remote_port,
                transport: self.transport,
                private_key_file: self.private_key_file,
                sudo: self.sudo,
                sudo_user: self.sudo_user,
                sudo_pass: self.sudo_pass,
                module_path,
                basedir,
            },
        })
    }
}
