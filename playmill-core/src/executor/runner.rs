use crate::callbacks::CallbackRegistry;
use crate::executor::poller::AsyncPoller;
use crate::executor::task_result::{RunResults, TaskResult};
use crate::executor::SetupCache;
use crate::playbook::task::ModuleArgs;
use crate::template::Templar;
use crate::vars::variable::Variable;
use crate::vars::{combine, VarMap};
use anyhow::Result;
use indexmap::IndexMap;
use log::debug;
use playmill_plugins::callback::EventType;
use playmill_plugins::connection::{Connection, ConnectionContext};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Duration};

static JOB_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_job_id() -> String {
    let count = JOB_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}.{}", std::process::id(), count)
}

/// Executes one module invocation against a host set, fanning out up to
/// `forks` hosts at a time. Built fresh for every task by the playbook
/// executor; per-host errors are classified into the results, never raised.
pub struct Runner {
    hosts: Vec<String>,
    module_name: String,
    module_args: ModuleArgs,
    module_vars: VarMap,
    global_vars: VarMap,
    host_vars: IndexMap<String, VarMap>,
    conditional: Option<String>,
    forks: usize,
    timeout: u64,
    context: ConnectionContext,
    setup_cache: Arc<SetupCache>,
    connection: Arc<dyn Connection>,
    callbacks: Arc<CallbackRegistry>,
    templar: Templar,
}

impl Runner {
    pub fn builder(module_name: &str, connection: Arc<dyn Connection>) -> RunnerBuilder {
        RunnerBuilder::new(module_name, connection)
    }

    /// Runs the module on every host and blocks until all workers have
    /// reported.
    pub async fn run(self: Arc<Self>) -> RunResults {
        let semaphore = Arc::new(Semaphore::new(self.forks.max(1)));
        let mut handles = Vec::with_capacity(self.hosts.len());

        for host in &self.hosts {
            let this = self.clone();
            let semaphore = semaphore.clone();
            let host = host.clone();
            handles.push((
                host.clone(),
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    this.execute_host(&host, true).await
                }),
            ));
        }

        let mut results = RunResults::default();
        for (host, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => TaskResult::dark(format!("worker failed: {err}")),
            };
            self.record(&mut results, host, result);
        }
        results
    }

    /// Launches the module on every host as a background job and returns
    /// immediately with the initial dispatch results plus a poller over the
    /// pending jobs. Deadline enforcement happens in the poller.
    pub async fn run_async(self: Arc<Self>, seconds: u64) -> (RunResults, AsyncPoller) {
        debug!(
            "launching async jobs for module {} ({seconds}s budget)",
            self.module_name
        );

        let semaphore = Arc::new(Semaphore::new(self.forks.max(1)));
        let mut initial = RunResults::default();
        let mut jobs = IndexMap::new();

        for host in &self.hosts {
            let this = self.clone();
            let semaphore = semaphore.clone();
            let host = host.clone();
            let worker_host = host.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                this.execute_host(&worker_host, false).await
            });

            initial
                .contacted
                .insert(host.clone(), TaskResult::started(&next_job_id()));
            jobs.insert(host, handle);
        }

        (initial, AsyncPoller::new(jobs))
    }

    fn record(&self, results: &mut RunResults, host: String, result: TaskResult) {
        let event = if result.unreachable {
            EventType::RunnerOnUnreachable
        } else if result.is_failure() {
            EventType::RunnerOnFailed
        } else if result.skipped {
            EventType::RunnerOnSkipped
        } else {
            EventType::RunnerOnOk
        };
        self.callbacks.emit(
            event,
            Some(json!({"host": host, "result": result.to_value()})),
        );

        if result.unreachable {
            results.dark.insert(host, result);
        } else {
            results.contacted.insert(host, result);
        }
    }

    async fn execute_host(&self, host: &str, apply_timeout: bool) -> TaskResult {
        let vars = self.vars_for(host);

        if let Some(conditional) = &self.conditional {
            match self.templar.evaluate(conditional, &vars) {
                Ok(true) => {}
                Ok(false) => return TaskResult::skipped(),
                Err(err) => return TaskResult::failure(err.to_string()),
            }
        }

        let args = match self.build_args(&vars) {
            Ok(args) => args,
            Err(err) => return TaskResult::failure(err.to_string()),
        };

        debug!("running {} on {host}", self.module_name);

        let invocation =
            self.connection
                .exec_module(host, &self.context, &self.module_name, &args);

        let output = if apply_timeout {
            match timeout(Duration::from_secs(self.timeout.max(1)), invocation).await {
                Ok(output) => output,
                Err(_) => {
                    return TaskResult::dark(format!(
                        "timed out talking to {host} after {}s",
                        self.timeout
                    ))
                }
            }
        } else {
            invocation.await
        };

        match output {
            Ok(value) => TaskResult::from_value(&value),
            Err(err) => TaskResult::dark(err.to_string()),
        }
    }

    /// The variable view one host gets: inventory group vars, then host
    /// vars, then harvested facts, then task vars, later sources winning.
    fn vars_for(&self, host: &str) -> VarMap {
        let mut vars = self.global_vars.clone();
        if let Some(host_vars) = self.host_vars.get(host) {
            combine(&mut vars, host_vars);
        }
        if let Some(facts) = self.setup_cache.get(host) {
            combine(&mut vars, facts);
        }
        combine(&mut vars, &self.module_vars);
        vars
    }

    fn build_args(&self, vars: &VarMap) -> Result<Value> {
        match &self.module_args {
            ModuleArgs::Params(text) => {
                let rendered = self.templar.render(text, vars)?;
                Ok(parse_params(&rendered))
            }
            ModuleArgs::Vars(map) => {
                let templated = self.template_map(map, vars)?;
                Ok(Variable::Map(templated).to_json())
            }
        }
    }

    fn template_map(&self, map: &VarMap, vars: &VarMap) -> Result<VarMap> {
        map.iter()
            .map(|(key, value)| self.template_variable(value, vars).map(|v| (key.clone(), v)))
            .collect()
    }

    fn template_variable(&self, value: &Variable, vars: &VarMap) -> Result<Variable> {
        Ok(match value {
            Variable::String(text) => Variable::String(self.templar.render(text, vars)?),
            Variable::List(items) => Variable::List(
                items
                    .iter()
                    .map(|item| self.template_variable(item, vars))
                    .collect::<Result<Vec<Variable>>>()?,
            ),
            Variable::Map(inner) => Variable::Map(self.template_map(inner, vars)?),
            other => other.clone(),
        })
    }
}

fn is_param_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Splits a rendered argument string into a JSON object: `key=value`
/// tokens become fields, everything else stays as `_raw_params`. A string
/// with no `key=value` tokens passes through verbatim so shell quoting
/// survives.
pub fn parse_params(text: &str) -> Value {
    let trimmed = text.trim();
    let mut object = serde_json::Map::new();

    let tokens = shlex::split(trimmed).unwrap_or_default();
    let mut raw: Vec<String> = Vec::new();

    for token in tokens {
        match token.split_once('=') {
            Some((key, value)) if is_param_key(key) => {
                object.insert(key.to_string(), Value::String(value.to_string()));
            }
            _ => raw.push(token),
        }
    }

    if object.is_empty() {
        if !trimmed.is_empty() {
            object.insert(
                "_raw_params".to_string(),
                Value::String(trimmed.to_string()),
            );
        }
    } else if !raw.is_empty() {
        let joined = shlex::try_join(raw.iter().map(String::as_str))
            .unwrap_or_else(|_| raw.join(" "));
        object.insert("_raw_params".to_string(), Value::String(joined));
    }

    Value::Object(object)
}

pub struct RunnerBuilder {
    module_name: String,
    connection: Arc<dyn Connection>,
    hosts: Vec<String>,
    module_args: ModuleArgs,
    module_vars: VarMap,
    global_vars: VarMap,
    host_vars: IndexMap<String, VarMap>,
    conditional: Option<String>,
    forks: usize,
    timeout: u64,
    context: ConnectionContext,
    setup_cache: Arc<SetupCache>,
    callbacks: Arc<CallbackRegistry>,
}

impl RunnerBuilder {
    pub fn new(module_name: &str, connection: Arc<dyn Connection>) -> Self {
        RunnerBuilder {
            module_name: module_name.to_string(),
            connection,
            hosts: Vec::new(),
            module_args: ModuleArgs::Params(String::new()),
            module_vars: VarMap::new(),
            global_vars: VarMap::new(),
            host_vars: IndexMap::new(),
            conditional: None,
            forks: crate::constants::DEFAULT_FORKS,
            timeout: crate::constants::DEFAULT_TIMEOUT,
            context: ConnectionContext::default(),
            setup_cache: Arc::new(SetupCache::new()),
            callbacks: Arc::new(CallbackRegistry::new()),
        }
    }

    pub fn hosts(mut self, hosts: Vec<String>) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn module_args(mut self, module_args: ModuleArgs) -> Self {
        self.module_args = module_args;
        self
    }

    pub fn module_vars(mut self, module_vars: VarMap) -> Self {
        self.module_vars = module_vars;
        self
    }

    pub fn global_vars(mut self, global_vars: VarMap) -> Self {
        self.global_vars = global_vars;
        self
    }

    pub fn host_vars(mut self, host_vars: IndexMap<String, VarMap>) -> Self {
        self.host_vars = host_vars;
        self
    }

    pub fn conditional(mut self, conditional: Option<String>) -> Self {
        self.conditional = conditional;
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

    pub fn context(mut self, context: ConnectionContext) -> Self {
        self.context = context;
        self
    }

    pub fn setup_cache(mut self, setup_cache: Arc<SetupCache>) -> Self {
        self.setup_cache = setup_cache;
        self
    }

    pub fn callbacks(mut self, callbacks: Arc<CallbackRegistry>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn build(self) -> Runner {
        Runner {
            module_name: self.module_name,
            connection: self.connection,
            hosts: self.hosts,
            module_args: self.module_args,
            module_vars: self.module_vars,
            global_vars: self.global_vars,
            host_vars: self.host_vars,
            conditional: self.conditional,
            forks: self.forks,
            timeout: self.timeout,
            context: self.context,
            setup_cache: self.setup_cache,
            callbacks: self.callbacks,
            templar: Templar::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_tokens_become_fields() {
        let args = parse_params("chdir=/tmp creates=/tmp/done /bin/touch /tmp/done");
        assert_eq!(args["chdir"], json!("/tmp"));
        assert_eq!(args["creates"], json!("/tmp/done"));
        assert_eq!(args["_raw_params"], json!("/bin/touch /tmp/done"));
    }

    #[test]
    fn plain_command_lines_pass_through_verbatim() {
        let args = parse_params("echo \"a b\" c");
        assert_eq!(args["_raw_params"], json!("echo \"a b\" c"));
    }

    #[test]
    fn tokens_with_odd_keys_stay_raw() {
        let args = parse_params("dd if=/dev/zero of=/dev/null");
        // `if` and `of` are valid keys, dd itself is not key=value
        assert_eq!(args["if"], json!("/dev/zero"));
        assert_eq!(args["_raw_params"], json!("dd"));
    }

    #[test]
    fn empty_args_give_an_empty_object() {
        assert_eq!(parse_params("   "), json!({}));
    }
}
