//! Activation decisions for feature configs.
//!
//! A feature is active for a container if the container's process environment
//! defines the feature's activation flag. The environment belongs to the
//! container process, not to the hook, and is supplied by an
//! [`EnvironmentSource`].
use std::path::{Path, PathBuf};

use crate::config::ActivationFlag;

mod error;

pub use error::{Error, Result};

/// Default mount point of procfs.
pub const DEFAULT_PROC_PATH: &str = "/proc";

/// Produces the environment of a process as raw `NAME=VALUE` tokens.
pub trait EnvironmentSource {
    fn environment(&self, pid: u32) -> Result<Vec<String>>;
}

/// Reads process environments from `<proc_root>/<pid>/environ`.
#[derive(Debug, Clone)]
pub struct ProcEnvironment {
    proc_root: PathBuf,
}

impl ProcEnvironment {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }
}

impl Default for ProcEnvironment {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_PATH)
    }
}

impl EnvironmentSource for ProcEnvironment {
    /// # Errors
    ///
    /// Returns [`Error::Read`] if the `environ` file cannot be read, most
    /// likely because the process is gone.
    fn environment(&self, pid: u32) -> Result<Vec<String>> {
        let path = self.proc_root.join(format!("{pid}/environ"));
        let buf = std::fs::read(&path).map_err(|source| Error::Read { path, source })?;

        Ok(parse_environ(&buf))
    }
}

/// Splits a NUL separated `environ` buffer into tokens, dropping empty ones.
fn parse_environ(buf: &[u8]) -> Vec<String> {
    buf.split(|b| *b == 0)
        .filter(|token| !token.is_empty())
        .map(|token| String::from_utf8_lossy(token).into_owned())
        .collect()
}

/// Returns true if `env` defines the variable named by `flag`.
///
/// A token matches if the text before its first `=` equals the flag exactly, so
/// `FOO` matches `FOO=` and `FOO=1` but neither `FOOBAR=1` nor a bare `FOO`.
/// A missing flag never matches.
///
/// # Examples
///
/// ```
/// # use oci_injector_hook::activation::is_active;
/// # use oci_injector_hook::config::ActivationFlag;
/// let flag = ActivationFlag::new("ENABLE_GPU").unwrap();
/// assert!(is_active(Some(&flag), &["PATH=/bin", "ENABLE_GPU=1"]));
/// assert!(!is_active(Some(&flag), &["ENABLE_GPU_X=1"]));
/// assert!(!is_active(None, &["ENABLE_GPU=1"]));
/// ```
pub fn is_active(flag: Option<&ActivationFlag>, env: &[impl AsRef<str>]) -> bool {
    let Some(flag) = flag else {
        return false;
    };
    env.iter().any(|token| {
        token
            .as_ref()
            .split_once('=')
            .is_some_and(|(name, _)| name == flag.as_ref())
    })
}
