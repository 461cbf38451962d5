use std::fmt;

/// An environment variable name gating a feature config.
///
/// Valid names are non-empty, consist of ASCII letters, digits and `_`, and do
/// not start with a digit.
///
/// # Examples
///
/// ```
/// # use oci_injector_hook::config::ActivationFlag;
/// assert!(ActivationFlag::new("ENABLE_GPU").is_some());
/// assert!(ActivationFlag::new("1GPU").is_none());
/// assert!(ActivationFlag::new("GPU=1").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivationFlag(String);

impl ActivationFlag {
    /// Returns `None` if `name` is not a valid environment variable name.
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if is_env_name(&name) {
            Some(Self(name))
        } else {
            None
        }
    }
}

impl AsRef<str> for ActivationFlag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivationFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_env_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
