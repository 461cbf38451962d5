use std::path::PathBuf;

/// Errors that may occur while discovering or decoding feature configs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to list config directory `{path}`: {source}")]
    ListDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read config file `{path}`: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file name `{path}` is not valid UTF-8")]
    InvalidName { path: PathBuf },
    #[error("failed to decode config `{name}`: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid activation flag `{flag}` in config `{name}`")]
    InvalidActivationFlag { name: String, flag: String },
    #[error("config name `{0}` is defined more than once")]
    DuplicateName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
