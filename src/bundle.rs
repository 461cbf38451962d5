//! OCI bundle access.
//!
//! Only the root filesystem location is read from the bundle's `config.json`;
//! the rest of the runtime spec is left to the runtime.
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Name of the runtime spec inside a bundle.
const BUNDLE_CONFIG: &str = "config.json";

/// Root filesystem directory used when the runtime spec does not name one.
const DEFAULT_ROOT: &str = "rootfs";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open runtime spec `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode runtime spec `{path}`: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, serde::Deserialize)]
struct RuntimeSpec {
    #[serde(default)]
    root: Option<Root>,
}

#[derive(Debug, serde::Deserialize)]
struct Root {
    path: PathBuf,
}

/// A container bundle with its resolved root filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    path: PathBuf,
    rootfs: PathBuf,
}

impl Bundle {
    /// Opens the bundle at `path` and resolves its root filesystem.
    ///
    /// A relative `root.path` is resolved against the bundle directory. Without a
    /// `root` entry the root filesystem is `<bundle>/rootfs`.
    ///
    /// # Errors
    ///
    /// - [`Error::Open`] if `config.json` cannot be opened.
    /// - [`Error::Decode`] if `config.json` is not valid JSON.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_path = path.join(BUNDLE_CONFIG);
        let file = File::open(&config_path).map_err(|source| Error::Open {
            path: config_path.clone(),
            source,
        })?;
        let spec: RuntimeSpec =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Decode {
                path: config_path,
                source,
            })?;

        let root = spec
            .root
            .map(|root| root.path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));
        let rootfs = path.join(root);
        log::debug!("bundle `{}` uses rootfs `{}`", path.display(), rootfs.display());

        Ok(Self {
            path: path.to_path_buf(),
            rootfs,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rootfs(&self) -> &Path {
        &self.rootfs
    }
}
