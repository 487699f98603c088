use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

/// Consolidated connection/authentication information for the hosts of a
/// play. Task dispatch hands one of these to the connection backend along
/// with every module invocation.
#[derive(Clone, Debug, Default)]
pub struct ConnectionContext {
    pub remote_user: Option<String>,
    pub remote_pass: Option<String>,
    pub remote_port: Option<u16>,
    pub private_key_file: Option<PathBuf>,
    pub sudo: bool,
    pub sudo_user: Option<String>,
    pub sudo_pass: Option<String>,
    pub module_path: Vec<PathBuf>,
    pub timeout: u64,
}

/// A transport backend. One instance serves every host of a run; the host
/// name is passed per invocation so backends can pool sessions internally.
///
/// An `Err` from `exec_module` means the host could not be reached at the
/// transport layer. Module-level failures are reported inside the returned
/// JSON document (`failed` / `rc` keys), never as `Err`.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Executes a module on the given host and returns its JSON output.
    async fn exec_module(
        &self,
        host: &str,
        context: &ConnectionContext,
        module_name: &str,
        args: &Value,
    ) -> Result<Value>;
}
