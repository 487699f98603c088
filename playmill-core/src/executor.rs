pub mod playbook_executor;
pub mod poller;
pub mod runner;
pub mod stats;
pub mod task_result;

use crate::vars::VarMap;
use indexmap::IndexMap;

/// The per-run fact cache: host name to the variables harvested from that
/// host. Owned by the playbook executor; runners get read-only snapshots.
pub type SetupCache = IndexMap<String, VarMap>;
