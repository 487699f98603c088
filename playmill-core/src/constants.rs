use std::env;
use std::str::FromStr;

pub const DEFAULT_FORKS: usize = 5;
pub const DEFAULT_TIMEOUT: u64 = 10;
pub const DEFAULT_TRANSPORT: &str = "local";
pub const DEFAULT_REMOTE_PORT: u16 = 22;
pub const DEFAULT_SUDO_USER: &str = "root";
pub const DEFAULT_POLL_INTERVAL: u64 = 10;

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

pub fn default_forks() -> usize {
    env_or("PLAYMILL_FORKS", DEFAULT_FORKS)
}

pub fn default_timeout() -> u64 {
    env_or("PLAYMILL_TIMEOUT", DEFAULT_TIMEOUT)
}

pub fn default_transport() -> String {
    env::var("PLAYMILL_TRANSPORT").unwrap_or_else(|_| DEFAULT_TRANSPORT.to_string())
}
