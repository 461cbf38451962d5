//! Hook settings read from the process environment.
use std::path::PathBuf;

use crate::activation::DEFAULT_PROC_PATH;
use crate::config::DEFAULT_CONFIG_DIR;

/// Overrides the feature config directory.
pub const CONFIG_DIR_VAR: &str = "OCI_INJECTOR_CONFIG_DIR";
/// Overrides the procfs mount point used to read container environments.
pub const PROC_PATH_VAR: &str = "OCI_INJECTOR_PROC_PATH";
/// `true` enables debug logging.
pub const DEBUG_VAR: &str = "DEBUG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config_dir: PathBuf,
    pub proc_path: PathBuf,
    pub debug: bool,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config_dir = lookup(CONFIG_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));
        let proc_path = lookup(PROC_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_PATH));
        let debug = lookup(DEBUG_VAR).is_some_and(|value| value == "true");

        Self {
            config_dir,
            proc_path,
            debug,
        }
    }

    /// Default `env_logger` filter; `RUST_LOG` takes precedence.
    pub fn log_filter(&self) -> &'static str {
        if self.debug { "debug" } else { "error" }
    }
}
