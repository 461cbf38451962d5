use std::path::PathBuf;

/// Errors that may occur while reading the environment of the target process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read environment file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("container `{0}` has no process to read the environment from")]
    MissingPid(String),
}

pub type Result<T> = std::result::Result<T, Error>;
