use thiserror::Error;

/// Errors of the configuration plane. These abort the whole run, unlike
/// per-host operational failures, which are folded into the stats ledger.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("change handler ({0}) is not defined")]
    UndefinedHandler(String),

    #[error("could not parse playbook ({path}): {reason}")]
    InvalidPlaybook { path: String, reason: String },

    #[error("transport ({0}) is not registered")]
    UnknownTransport(String),

    #[error("no variables file matching ({0}) found")]
    MissingVarsFile(String),
}
