use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::command::Command;
use crate::ping::Ping;
use crate::setup::Setup;
use crate::shell::Shell;

/// The core trait for all built-in modules.
///
/// Modules receive their arguments as a JSON object and report back a JSON
/// document. A module signals its own failure through the `failed` or `rc`
/// keys of that document; `Err` is reserved for errors the module could not
/// turn into a report at all.
#[async_trait]
pub trait Module: Send + Sync {
    async fn run(&self, args: &Value) -> Result<Value>;
}

static SETUP: Setup = Setup;
static COMMAND: Command = Command;
static SHELL: Shell = Shell;
static PING: Ping = Ping;

/// Looks up a built-in module by name.
pub fn find_module(name: &str) -> Option<&'static dyn Module> {
    match name {
        "setup" => Some(&SETUP),
        "command" => Some(&COMMAND),
        "shell" => Some(&SHELL),
        "ping" => Some(&PING),
        _ => None,
    }
}

/// Returns the free-form part of a module argument object, i.e. whatever
/// was left after `key=value` parsing.
pub fn raw_params(args: &Value) -> Option<&str> {
    args.get("_raw_params").and_then(Value::as_str)
}
