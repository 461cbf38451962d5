//! Feature config discovery and decoding.
//!
//! A feature config names an activation flag and the host paths to inject,
//! grouped by [`Category`]. Every config comes from one [`RawConfig`] produced
//! by a [`ConfigSource`], usually a [`DirectorySource`].
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

mod error;
mod flag;
mod source;

pub use error::{Error, Result};
pub use flag::ActivationFlag;
pub use source::{ConfigSource, DirectorySource, RawConfig};

/// Default directory holding the feature configs.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/oci-injector-hook";

/// Kind of resource a path is injected as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Devices,
    Binaries,
    Libraries,
    Directories,
    Miscellaneous,
}

impl Category {
    /// All categories in the order they are injected.
    pub const ALL: [Category; 5] = [
        Category::Devices,
        Category::Binaries,
        Category::Libraries,
        Category::Directories,
        Category::Miscellaneous,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Devices => "devices",
            Category::Binaries => "binaries",
            Category::Libraries => "libraries",
            Category::Directories => "directories",
            Category::Miscellaneous => "miscellaneous",
        };
        write!(f, "{name}")
    }
}

/// On-disk layout of a feature config. Unknown fields are ignored.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct FeatureFile {
    activation_flag: Option<String>,
    devices: Vec<PathBuf>,
    binaries: Vec<PathBuf>,
    libraries: Vec<PathBuf>,
    directories: Vec<PathBuf>,
    miscellaneous: Vec<PathBuf>,
}

/// A decoded and validated feature config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureConfig {
    name: String,
    activation_flag: Option<ActivationFlag>,
    devices: Vec<PathBuf>,
    binaries: Vec<PathBuf>,
    libraries: Vec<PathBuf>,
    directories: Vec<PathBuf>,
    miscellaneous: Vec<PathBuf>,
}

impl FeatureConfig {
    /// Decodes a feature config from its raw JSON representation.
    ///
    /// An empty `activation_flag` is treated the same as an absent one.
    ///
    /// # Errors
    ///
    /// - [`Error::Decode`] if the contents are not a valid feature config.
    /// - [`Error::InvalidActivationFlag`] if the flag is not an environment variable name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use oci_injector_hook::config::{Category, FeatureConfig, RawConfig};
    /// let raw = RawConfig {
    ///     name: "gpu".to_owned(),
    ///     contents: br#"{"activation_flag":"ENABLE_GPU","devices":["/dev/nvidia0"]}"#.to_vec(),
    /// };
    /// let config = FeatureConfig::decode(raw).unwrap();
    /// assert_eq!(config.name(), "gpu");
    /// assert_eq!(config.paths(Category::Devices).len(), 1);
    /// ```
    pub fn decode(raw: RawConfig) -> Result<Self> {
        let RawConfig { name, contents } = raw;
        let file: FeatureFile =
            serde_json::from_slice(&contents).map_err(|source| Error::Decode {
                name: name.clone(),
                source,
            })?;

        let activation_flag = match file.activation_flag {
            None => None,
            Some(flag) if flag.is_empty() => None,
            Some(flag) => Some(
                ActivationFlag::new(flag.as_str())
                    .ok_or_else(|| Error::InvalidActivationFlag {
                        name: name.clone(),
                        flag,
                    })?,
            ),
        };

        Ok(Self {
            name,
            activation_flag,
            devices: file.devices,
            binaries: file.binaries,
            libraries: file.libraries,
            directories: file.directories,
            miscellaneous: file.miscellaneous,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn activation_flag(&self) -> Option<&ActivationFlag> {
        self.activation_flag.as_ref()
    }

    /// Returns the declared paths of `category` in declaration order.
    pub fn paths(&self, category: Category) -> &[PathBuf] {
        match category {
            Category::Devices => &self.devices,
            Category::Binaries => &self.binaries,
            Category::Libraries => &self.libraries,
            Category::Directories => &self.directories,
            Category::Miscellaneous => &self.miscellaneous,
        }
    }

    /// Total number of declared paths across all categories.
    pub fn path_count(&self) -> usize {
        Category::ALL.iter().map(|c| self.paths(*c).len()).sum()
    }
}

/// The full set of feature configs for one hook invocation, ordered by name.
#[derive(Debug, Default)]
pub struct ConfigStore {
    configs: BTreeMap<String, FeatureConfig>,
}

impl ConfigStore {
    /// Loads and decodes every config of `source`.
    ///
    /// A single bad config fails the whole load; nothing is skipped.
    ///
    /// # Errors
    ///
    /// Returns errors of the source and of [`FeatureConfig::decode`], and
    /// [`Error::DuplicateName`] if two raw configs share a name.
    pub fn load(source: &impl ConfigSource) -> Result<Self> {
        let mut configs = BTreeMap::new();
        for raw in source.load()? {
            let config = FeatureConfig::decode(raw)?;
            if configs.contains_key(config.name()) {
                return Err(Error::DuplicateName(config.name().to_owned()));
            }
            configs.insert(config.name().to_owned(), config);
        }

        Ok(Self { configs })
    }

    /// Iterates the configs in lexicographic name order.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureConfig> {
        self.configs.values()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureConfig> {
        self.configs.get(name)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Returns true if any config needs the target environment to be evaluated.
    pub fn needs_environment(&self) -> bool {
        self.iter().any(|c| c.activation_flag().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticSource(Vec<(&'static str, &'static str)>);

    impl ConfigSource for StaticSource {
        fn load(&self) -> Result<Vec<RawConfig>> {
            Ok(self
                .0
                .iter()
                .map(|(name, contents)| RawConfig {
                    name: (*name).to_owned(),
                    contents: contents.as_bytes().to_vec(),
                })
                .collect())
        }
    }

    fn raw(name: &str, contents: &str) -> RawConfig {
        RawConfig {
            name: name.to_owned(),
            contents: contents.as_bytes().to_vec(),
        }
    }

    #[test]
    fn decodes_all_categories_in_declared_order() {
        let config = FeatureConfig::decode(raw(
            "full",
            r#"{
                "activation_flag": "WITH_TOOLS",
                "devices": ["/dev/fuse"],
                "binaries": ["/usr/bin/b", "/usr/bin/a"],
                "libraries": ["/usr/lib/libz.so.1"],
                "directories": ["/opt/tools"],
                "miscellaneous": ["/etc/tools.conf"],
                "unknown": {"ignored": true}
            }"#,
        ))
        .unwrap();

        assert_eq!(config.activation_flag().unwrap().as_ref(), "WITH_TOOLS");
        assert_eq!(
            config.paths(Category::Binaries),
            &[PathBuf::from("/usr/bin/b"), PathBuf::from("/usr/bin/a")]
        );
        assert_eq!(config.paths(Category::Devices).len(), 1);
        assert_eq!(config.paths(Category::Libraries).len(), 1);
        assert_eq!(config.paths(Category::Directories).len(), 1);
        assert_eq!(config.paths(Category::Miscellaneous).len(), 1);
        assert_eq!(config.path_count(), 6);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let config = FeatureConfig::decode(raw("empty", "{}")).unwrap();
        assert!(config.activation_flag().is_none());
        assert_eq!(config.path_count(), 0);
    }

    #[test]
    fn empty_activation_flag_is_absent() {
        let config = FeatureConfig::decode(raw("e", r#"{"activation_flag":""}"#)).unwrap();
        assert!(config.activation_flag().is_none());
    }

    #[test]
    fn error_on_invalid_activation_flag() {
        let err = FeatureConfig::decode(raw("bad", r#"{"activation_flag":"GPU.*"}"#)).unwrap_err();
        match err {
            Error::InvalidActivationFlag { name, flag } => {
                assert_eq!(name, "bad");
                assert_eq!(flag, "GPU.*");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn error_on_wrong_field_type() {
        let err = FeatureConfig::decode(raw("bad", r#"{"devices":"/dev/null"}"#)).unwrap_err();
        assert!(matches!(err, Error::Decode { name, .. } if name == "bad"));
    }

    #[test]
    fn store_orders_configs_by_name() {
        let source = StaticSource(vec![("zeta", "{}"), ("alpha", "{}"), ("mid", "{}")]);
        let store = ConfigStore::load(&source).unwrap();
        let names: Vec<&str> = store.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert_eq!(store.len(), 3);
        assert!(store.get("mid").is_some());
        assert!(!store.needs_environment());
    }

    #[test]
    fn store_fails_on_single_malformed_config() {
        let source = StaticSource(vec![("good", "{}"), ("broken", "{")]);
        let err = ConfigStore::load(&source).unwrap_err();
        assert!(matches!(err, Error::Decode { name, .. } if name == "broken"));
    }

    #[test]
    fn store_rejects_duplicate_names() {
        let source = StaticSource(vec![("gpu", "{}"), ("gpu", "{}")]);
        let err = ConfigStore::load(&source).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(name) if name == "gpu"));
    }

    #[test]
    fn store_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("gpu.json"),
            r#"{"activation_flag":"ENABLE_GPU","devices":["/dev/nvidia0"]}"#,
        )
        .unwrap();

        let store = ConfigStore::load(&DirectorySource::new(dir.path())).unwrap();
        let gpu = store.get("gpu").unwrap();
        assert_eq!(gpu.activation_flag().unwrap().as_ref(), "ENABLE_GPU");
        assert_eq!(gpu.paths(Category::Devices), &[PathBuf::from("/dev/nvidia0")]);
        assert!(store.needs_environment());
    }
}
