use std::path::{Path, PathBuf};

use super::{Error, Result};

/// File extension of feature config files.
const CONFIG_EXTENSION: &str = "json";

/// An undecoded feature config together with its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConfig {
    pub name: String,
    pub contents: Vec<u8>,
}

/// Produces the raw feature configs known to the hook.
pub trait ConfigSource {
    /// Loads every raw config.
    ///
    /// # Errors
    ///
    /// Implementations fail as a whole; a source never returns a partial set.
    fn load(&self) -> Result<Vec<RawConfig>>;
}

/// Loads one config per `*.json` file in a directory.
///
/// The config name is the file name without its extension.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ConfigSource for DirectorySource {
    /// # Errors
    ///
    /// - [`Error::ListDirectory`] if the directory or one of its entries cannot be read.
    /// - [`Error::InvalidName`] if a config file name is not valid UTF-8.
    /// - [`Error::ReadFile`] if a config file cannot be read.
    fn load(&self) -> Result<Vec<RawConfig>> {
        let list_err = |source| Error::ListDirectory {
            path: self.dir.clone(),
            source,
        };

        let mut configs = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(list_err)? {
            let path = entry.map_err(list_err)?.path();
            if path.extension().is_none_or(|ext| ext != CONFIG_EXTENSION) {
                continue;
            }
            // follows symlinks; a dangling one is reported by the read below
            if path.is_dir() {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                return Err(Error::InvalidName { path });
            };

            let contents = std::fs::read(&path).map_err(|source| Error::ReadFile {
                path: path.clone(),
                source,
            })?;
            log::debug!("read config `{}` from {}", name, path.display());
            configs.push(RawConfig {
                name: name.to_owned(),
                contents,
            });
        }

        Ok(configs)
    }
}
