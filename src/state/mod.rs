//! Container state decoding.
//!
//! The container runtime writes one OCI state document to the hook's stdin.
//! See the [OCI runtime spec](https://github.com/opencontainers/runtime-spec/blob/main/runtime.md#state)
//! for the structure.
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

mod error;

pub use error::{Error, Result};

/// Lifecycle status of the container at the time the hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Creating,
    Created,
    Running,
    Stopped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Creating => "creating",
            Status::Created => "created",
            Status::Running => "running",
            Status::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Snapshot of the container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContainerState {
    #[serde(rename = "ociVersion", alias = "version")]
    oci_version: String,
    id: String,
    status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,
    bundle: PathBuf,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    annotations: HashMap<String, String>,
}

impl ContainerState {
    /// Decodes a single state document from `reader`.
    ///
    /// # Errors
    ///
    /// - [`Error::Decode`] if the input is not valid JSON or does not match the state schema.
    /// - [`Error::RelativeBundle`] if the bundle path is not absolute.
    ///
    /// # Examples
    ///
    /// ```
    /// # use oci_injector_hook::state::{ContainerState, Status};
    /// let input = r#"{"ociVersion":"1.0.2","id":"abc","status":"creating","pid":42,"bundle":"/run/bundle"}"#;
    /// let state = ContainerState::from_reader(input.as_bytes()).unwrap();
    /// assert_eq!(state.id(), "abc");
    /// assert_eq!(state.status(), Status::Creating);
    /// assert_eq!(state.pid(), Some(42));
    /// ```
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let state: ContainerState = serde_json::from_reader(reader).map_err(Error::Decode)?;
        if !state.bundle.is_absolute() {
            return Err(Error::RelativeBundle {
                id: state.id,
                path: state.bundle,
            });
        }

        Ok(state)
    }

    pub fn oci_version(&self) -> &str {
        &self.oci_version
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns the process id of the container, or `None` if the runtime has not
    /// created the process yet (absent or `0`).
    pub fn pid(&self) -> Option<u32> {
        self.pid.filter(|pid| *pid != 0)
    }

    pub fn bundle(&self) -> &Path {
        &self.bundle
    }

    pub fn annotations(&self) -> &HashMap<String, String> {
        &self.annotations
    }
}
