use crate::{activation, bundle, config, state};

/// Errors that end a hook invocation.
///
/// All variants but [`Error::Injection`] are raised before anything is written
/// to the container.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    State(#[from] state::Error),
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error(transparent)]
    Bundle(#[from] bundle::Error),
    #[error("failed to read container environment: {0}")]
    Environment(#[from] activation::Error),
    #[error("{failed} of {total} resources could not be injected")]
    Injection { failed: usize, total: usize },
}

impl Error {
    /// Process exit code reported to the container runtime.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Injection { .. } => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let injection = Error::Injection { failed: 1, total: 3 };
        assert_eq!(injection.exit_code(), 2);
        assert_eq!(injection.to_string(), "1 of 3 resources could not be injected");

        let missing = Error::from(activation::Error::MissingPid("abc".to_owned()));
        assert_eq!(missing.exit_code(), 1);
    }
}
