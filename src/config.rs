//! Configuration loaded from environment variables.
//!
//! Every setting has a default so the CLI runs against a local MongoDB with
//! no configuration at all.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    /// Env: `MONGO_URI`
    /// Default: `mongodb://localhost:27017/growspaces`
    pub mongo_uri: String,

    /// Env: `GROW_SPACES_DB`
    /// Default: `growspaces`
    pub database: String,

    /// File the signed-in identity is cached in between runs.
    /// Env: `GROW_SPACES_SESSION`
    /// Default: `.grow-spaces-session.json`
    pub session_cache: PathBuf,

    /// Env: `MONGO_TIMEOUT_SECS`
    /// Default: 10 seconds.
    pub server_selection_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongo_uri: "mongodb://localhost:27017/growspaces".to_string(),
            database: "growspaces".to_string(),
            session_cache: PathBuf::from(".grow-spaces-session.json"),
            server_selection_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let timeout = match lookup("MONGO_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    warn!(value = %raw, "ignoring invalid MONGO_TIMEOUT_SECS");
                    defaults.server_selection_timeout
                }
            },
            None => defaults.server_selection_timeout,
        };

        Self {
            mongo_uri: lookup("MONGO_URI").unwrap_or(defaults.mongo_uri),
            database: lookup("GROW_SPACES_DB").unwrap_or(defaults.database),
            session_cache: lookup("GROW_SPACES_SESSION")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_cache),
            server_selection_timeout: timeout,
        }
    }
}
