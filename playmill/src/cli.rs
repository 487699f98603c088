use clap::Parser;
use playmill_core::constants;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "run a playbook against an inventory of hosts", long_about = None)]
pub struct Cli {
    /// playbook to run
    pub playbook: PathBuf,

    #[arg(short, long)]
    /// inventory source: a YAML file, an executable script, or a comma
    /// separated host list
    pub inventory: Vec<String>,

    #[arg(short, long, default_value_t = constants::DEFAULT_FORKS)]
    /// number of parallel processes to use per task
    pub forks: usize,

    #[arg(short = 'T', long, default_value_t = constants::DEFAULT_TIMEOUT)]
    /// connection timeout in seconds
    pub timeout: u64,

    #[arg(short = 'u', long)]
    /// connect as this user unless a play overrides it
    pub remote_user: Option<String>,

    #[arg(long, value_name = "PORT")]
    /// default remote port
    pub remote_port: Option<u16>,

    #[arg(short = 'c', long, default_value_t = constants::default_transport())]
    /// connection type to use for plays that don't specify one
    pub connection: String,

    #[arg(long = "private-key", value_name = "PRIVATE_KEY_FILE")]
    /// use this file to authenticate the connection
    pub private_key_file: Option<PathBuf>,

    #[arg(long, action)]
    /// run operations through sudo unless a play overrides it
    pub sudo: bool,

    #[arg(long, value_name = "USER")]
    /// desired sudo user
    pub sudo_user: Option<String>,

    #[arg(short = 'M', long, value_name = "PATH")]
    /// additional module search paths
    pub module_path: Vec<PathBuf>,

    #[arg(short = 'e', long = "extra-vars", value_name = "KEY=VALUE")]
    /// set additional variables with the highest precedence
    pub extra_vars: Vec<String>,
}
