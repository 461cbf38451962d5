use std::path::PathBuf;

/// Errors that may occur while injecting a single path.
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("invalid source path `{path}`: {reason}")]
    InvalidPath { path: PathBuf, reason: &'static str },
    #[error("failed to read metadata of `{path}`: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("`{path}` is a {found}, expected a {expected}")]
    UnexpectedType {
        path: PathBuf,
        expected: &'static str,
        found: &'static str,
    },
    #[error("`{path}` has no execute permission")]
    NotExecutable { path: PathBuf },
    #[error("cannot inject {kind} `{path}`")]
    Unsupported { path: PathBuf, kind: &'static str },
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to resolve symlink `{path}`: {source}")]
    ReadLink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("too many levels of symbolic links resolving `{path}`")]
    SymlinkLoop { path: PathBuf },
    #[error("failed to create directory `{path}`: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, InjectError>;
