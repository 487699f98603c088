mod cli;
mod console;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use console::ConsoleOutput;
use playmill_core::callbacks::CallbackRegistry;
use playmill_core::executor::playbook_executor::PlaybookExecutor;
use playmill_core::vars::variable::Variable;
use playmill_core::vars::VarMap;
use playmill_modules::local::LocalConnection;
use std::sync::Arc;

fn parse_extra_vars(pairs: &[String]) -> VarMap {
    let mut vars = VarMap::new();
    for pair in pairs {
        match pair.split_once('=') {
            Some((key, value)) => {
                vars.insert(key.to_string(), Variable::String(value.to_string()));
            }
            None => {
                log::warn!("ignoring extra var without '=': {pair}");
            }
        }
    }
    vars
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    run().await
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let console = Arc::new(ConsoleOutput);
    let mut callbacks = CallbackRegistry::new();
    callbacks.register(console.clone());
    let mut runner_callbacks = CallbackRegistry::new();
    runner_callbacks.register(console);

    let mut executor = PlaybookExecutor::builder(&cli.playbook)
        .inventory_sources(cli.inventory.clone())
        .extra_vars(parse_extra_vars(&cli.extra_vars))
        .callbacks(callbacks)
        .runner_callbacks(runner_callbacks)
        .connection("local", Arc::new(LocalConnection))
        .forks(cli.forks)
        .timeout(cli.timeout)
        .remote_user(cli.remote_user.clone())
        .remote_port(cli.remote_port)
        .transport(&cli.connection)
        .private_key_file(cli.private_key_file.clone())
        .sudo(cli.sudo)
        .sudo_user(cli.sudo_user.clone())
        .module_path(cli.module_path.clone())
        .build()?;

    let results = executor.run().await?;

    let had_errors = results
        .values()
        .any(|summary| summary.failures > 0 || summary.unreachable > 0);
    if had_errors {
        std::process::exit(2);
    }

    Ok(())
}
