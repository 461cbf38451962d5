use std::path::PathBuf;

/// Errors that may occur while decoding the container state handed to the hook.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to decode container state: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("bundle path `{path}` of container `{id}` is not absolute")]
    RelativeBundle { id: String, path: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;
