//! Resource injection into a container root filesystem.
//!
//! Every declared source path is placed at the same absolute path inside the
//! root filesystem. Categories differ only in which source types they accept
//! and whether they follow a top-level symlink; the copy itself is the shared
//! primitive in `copy`.
//!
//! | category      | accepted source                      | follows top-level symlink |
//! |---------------|--------------------------------------|---------------------------|
//! | devices       | character or block device            | yes                       |
//! | binaries      | regular file with an execute bit     | yes                       |
//! | libraries     | regular file, symlink chain recreated | no                        |
//! | directories   | directory, copied recursively        | yes                       |
//! | miscellaneous | anything but fifos and sockets       | no                        |
//!
//! Failures are collected per path in an [`InjectionReport`]; one failing path
//! never stops the others.
use std::fmt;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Component, Path, PathBuf};

use crate::config::{Category, FeatureConfig};

mod copy;
mod error;
mod path;

pub use error::{InjectError, Result};

/// Upper bound of links in a library symlink chain.
const MAX_LIBRARY_LINKS: usize = 40;

/// A path that was injected successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injected {
    pub category: Category,
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// A path that could not be injected.
#[derive(Debug)]
pub struct InjectionFailure {
    pub feature: String,
    pub category: Category,
    pub path: PathBuf,
    pub error: InjectError,
}

impl fmt::Display for InjectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "feature `{}`: failed to inject {} `{}`: {}",
            self.feature,
            self.category,
            self.path.display(),
            self.error
        )
    }
}

/// Outcome of injecting one or more features.
#[derive(Debug, Default)]
pub struct InjectionReport {
    injected: Vec<Injected>,
    failures: Vec<InjectionFailure>,
}

impl InjectionReport {
    pub fn injected(&self) -> &[Injected] {
        &self.injected
    }

    pub fn failures(&self) -> &[InjectionFailure] {
        &self.failures
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of attempted paths.
    pub fn total(&self) -> usize {
        self.injected.len() + self.failures.len()
    }

    /// Appends the outcomes of `other` to this report.
    pub fn merge(&mut self, other: InjectionReport) {
        self.injected.extend(other.injected);
        self.failures.extend(other.failures);
    }
}

/// Injects host resources into one container root filesystem.
#[derive(Debug, Clone)]
pub struct Injector {
    rootfs: PathBuf,
}

impl Injector {
    pub fn new(rootfs: impl Into<PathBuf>) -> Self {
        Self {
            rootfs: rootfs.into(),
        }
    }

    pub fn rootfs(&self) -> &Path {
        &self.rootfs
    }

    /// Injects every path of `feature`.
    ///
    /// Categories are processed in [`Category::ALL`] order and paths in
    /// declaration order, so a later path wins over an earlier one with the
    /// same destination.
    pub fn inject(&self, feature: &FeatureConfig) -> InjectionReport {
        let mut report = InjectionReport::default();
        for category in Category::ALL {
            for source in feature.paths(category) {
                match self.inject_path(category, source) {
                    Ok(destination) => {
                        log::debug!(
                            "feature `{}`: injected {} {} -> {}",
                            feature.name(),
                            category,
                            source.display(),
                            destination.display()
                        );
                        report.injected.push(Injected {
                            category,
                            source: source.clone(),
                            destination,
                        });
                    }
                    Err(error) => {
                        let failure = InjectionFailure {
                            feature: feature.name().to_owned(),
                            category,
                            path: source.clone(),
                            error,
                        };
                        log::warn!("{failure}");
                        report.failures.push(failure);
                    }
                }
            }
        }

        report
    }

    /// Injects a single `source` path as `category` and returns its destination.
    ///
    /// # Errors
    ///
    /// Returns an [`InjectError`] describing the first problem with this path.
    /// Nothing is created inside the root filesystem unless the source has the
    /// expected type. A failed copy leaves at most the parent directories.
    pub fn inject_path(&self, category: Category, source: &Path) -> Result<PathBuf> {
        let destination = self.destination(source)?;

        match category {
            Category::Devices => {
                let meta = metadata(source)?;
                expect_type(source, &meta, "device", copy::is_device)?;
                copy::create_parent_dirs(&destination)?;
                copy::copy_device(&destination, &meta)?;
            }
            Category::Binaries => {
                let meta = metadata(source)?;
                expect_type(source, &meta, "regular file", |t| t.is_file())?;
                if meta.mode() & 0o111 == 0 {
                    return Err(InjectError::NotExecutable {
                        path: source.to_path_buf(),
                    });
                }
                copy::create_parent_dirs(&destination)?;
                copy::copy_file(source, &destination, &meta)?;
            }
            Category::Libraries => self.inject_library(source, &destination)?,
            Category::Directories => {
                let meta = metadata(source)?;
                expect_type(source, &meta, "directory", |t| t.is_dir())?;
                copy::create_parent_dirs(&destination)?;
                copy::copy_dir(source, &destination, &meta)?;
            }
            Category::Miscellaneous => {
                let meta = symlink_metadata(source)?;
                copy::check_node(source, &meta)?;
                copy::create_parent_dirs(&destination)?;
                copy::copy_node(source, &destination, &meta)?;
            }
        }

        Ok(destination)
    }

    /// Returns where `source` lands inside the root filesystem.
    ///
    /// # Errors
    ///
    /// - [`InjectError::InvalidPath`] if `source` is relative or contains `..`.
    /// - Errors of resolving symlinks inside the root filesystem.
    pub fn destination(&self, source: &Path) -> Result<PathBuf> {
        path::check_source(source)?;
        path::resolve_in_root(&self.rootfs, source)
    }

    /// Copies a library, recreating every symlink between `source` and the
    /// library file at its own path so the loader resolves it the same way.
    ///
    /// Only the first link keeps the declared path. A relative target that
    /// climbs with `..` is resolved against the real parent directory, as the
    /// kernel does.
    fn inject_library(&self, source: &Path, destination: &Path) -> Result<()> {
        let mut current = source.to_path_buf();
        let mut current_dst = destination.to_path_buf();

        for _ in 0..MAX_LIBRARY_LINKS {
            let meta = symlink_metadata(&current)?;
            let file_type = meta.file_type();
            if !file_type.is_file() && !file_type.is_symlink() {
                return Err(InjectError::UnexpectedType {
                    path: current,
                    expected: "regular file",
                    found: copy::kind_of(&file_type),
                });
            }

            copy::create_parent_dirs(&current_dst)?;
            if file_type.is_file() {
                return copy::copy_file(&current, &current_dst, &meta);
            }

            copy::copy_symlink(&current, &current_dst)?;
            let target = fs::read_link(&current).map_err(|source| InjectError::ReadLink {
                path: current.clone(),
                source,
            })?;
            current = path::normalize(&link_target(&current, &target)?);
            current_dst = self.destination(&current)?;
        }

        Err(InjectError::SymlinkLoop {
            path: source.to_path_buf(),
        })
    }
}

/// Returns the path `target` of the symlink at `link` points to.
fn link_target(link: &Path, target: &Path) -> Result<PathBuf> {
    let Some(parent) = link.parent().filter(|_| target.is_relative()) else {
        return Ok(target.to_path_buf());
    };
    if !target.components().any(|c| matches!(c, Component::ParentDir)) {
        return Ok(parent.join(target));
    }

    let parent = fs::canonicalize(parent).map_err(|source| InjectError::Metadata {
        path: parent.to_path_buf(),
        source,
    })?;
    Ok(parent.join(target))
}

fn metadata(path: &Path) -> Result<fs::Metadata> {
    fs::metadata(path).map_err(|source| InjectError::Metadata {
        path: path.to_path_buf(),
        source,
    })
}

fn symlink_metadata(path: &Path) -> Result<fs::Metadata> {
    fs::symlink_metadata(path).map_err(|source| InjectError::Metadata {
        path: path.to_path_buf(),
        source,
    })
}

fn expect_type(
    path: &Path,
    meta: &fs::Metadata,
    expected: &'static str,
    accept: impl Fn(&fs::FileType) -> bool,
) -> Result<()> {
    let file_type = meta.file_type();
    if accept(&file_type) {
        Ok(())
    } else {
        Err(InjectError::UnexpectedType {
            path: path.to_path_buf(),
            expected,
            found: copy::kind_of(&file_type),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfig;
    use std::os::unix::fs::{PermissionsExt, symlink};

    struct Host {
        dir: tempfile::TempDir,
    }

    impl Host {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        fn file(&self, rel: &str, contents: &str, mode: u32) -> PathBuf {
            let path = self.path(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, contents).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
            path
        }
    }

    fn feature(name: &str, json: serde_json::Value) -> FeatureConfig {
        FeatureConfig::decode(RawConfig {
            name: name.to_owned(),
            contents: serde_json::to_vec(&json).unwrap(),
        })
        .unwrap()
    }

    fn inside(rootfs: &Path, host_path: &Path) -> PathBuf {
        rootfs.join(host_path.strip_prefix("/").unwrap())
    }

    fn snapshot(root: &Path) -> Vec<(PathBuf, u32, Option<Vec<u8>>)> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                let meta = fs::symlink_metadata(&path).unwrap();
                let contents = meta.is_file().then(|| fs::read(&path).unwrap());
                if meta.is_dir() {
                    stack.push(path.clone());
                }
                out.push((path, meta.mode(), contents));
            }
        }
        out.sort();
        out
    }

    #[test]
    fn injects_binary_at_same_absolute_path() {
        let host = Host::new();
        let rootfs = tempfile::tempdir().unwrap();
        let bin = host.file("usr/bin/tool", "binary", 0o755);

        let report = Injector::new(rootfs.path()).inject(&feature(
            "tools",
            serde_json::json!({ "binaries": [bin] }),
        ));

        assert!(report.is_success());
        let dst = inside(rootfs.path(), &bin);
        assert_eq!(report.injected()[0].destination, dst);
        assert_eq!(fs::read_to_string(&dst).unwrap(), "binary");
        assert_eq!(fs::metadata(&dst).unwrap().mode() & 0o777, 0o755);
    }

    #[test]
    fn binary_without_execute_bit_fails() {
        let host = Host::new();
        let rootfs = tempfile::tempdir().unwrap();
        let file = host.file("usr/bin/data", "data", 0o644);

        let err = Injector::new(rootfs.path())
            .inject_path(Category::Binaries, &file)
            .unwrap_err();
        assert!(matches!(err, InjectError::NotExecutable { .. }));
        assert!(!inside(rootfs.path(), &file).exists());
    }

    #[test]
    fn partial_failure_keeps_other_paths() {
        let host = Host::new();
        let rootfs = tempfile::tempdir().unwrap();
        let first = host.file("bin/first", "1", 0o755);
        let missing = host.path("bin/missing");
        let third = host.file("bin/third", "3", 0o755);

        let report = Injector::new(rootfs.path()).inject(&feature(
            "tools",
            serde_json::json!({ "binaries": [first, missing, third] }),
        ));

        assert!(!report.is_success());
        assert_eq!(report.total(), 3);
        assert_eq!(report.injected().len(), 2);
        let failure = &report.failures()[0];
        assert_eq!(failure.feature, "tools");
        assert_eq!(failure.category, Category::Binaries);
        assert_eq!(failure.path, missing);
        assert!(matches!(failure.error, InjectError::Metadata { .. }));
        assert!(failure.to_string().contains("feature `tools`"));

        assert_eq!(fs::read_to_string(inside(rootfs.path(), &first)).unwrap(), "1");
        assert_eq!(fs::read_to_string(inside(rootfs.path(), &third)).unwrap(), "3");
        assert!(!inside(rootfs.path(), &missing).exists());
    }

    #[test]
    fn later_declaration_wins_on_collision() {
        let host = Host::new();
        let rootfs = tempfile::tempdir().unwrap();
        let a = host.file("opt/a.conf", "first", 0o644);
        let injector = Injector::new(rootfs.path());

        injector.inject_path(Category::Miscellaneous, &a).unwrap();
        fs::write(&a, "second").unwrap();
        injector.inject_path(Category::Miscellaneous, &a).unwrap();

        assert_eq!(fs::read_to_string(inside(rootfs.path(), &a)).unwrap(), "second");
    }

    #[test]
    fn library_symlink_chain_is_recreated() {
        let host = Host::new();
        let rootfs = tempfile::tempdir().unwrap();
        let real = host.file("usr/lib/libfoo.so.1.2.3", "elf", 0o644);
        let mid = host.path("usr/lib/libfoo.so.1.2");
        let link = host.path("usr/lib/libfoo.so.1");
        symlink("libfoo.so.1.2.3", &mid).unwrap();
        symlink("libfoo.so.1.2", &link).unwrap();

        Injector::new(rootfs.path())
            .inject_path(Category::Libraries, &link)
            .unwrap();

        assert_eq!(
            fs::read_link(inside(rootfs.path(), &link)).unwrap(),
            Path::new("libfoo.so.1.2")
        );
        assert_eq!(
            fs::read_link(inside(rootfs.path(), &mid)).unwrap(),
            Path::new("libfoo.so.1.2.3")
        );
        assert_eq!(fs::read_to_string(inside(rootfs.path(), &real)).unwrap(), "elf");
        assert_eq!(
            fs::read_to_string(inside(rootfs.path(), &link)).unwrap(),
            "elf"
        );
    }

    #[test]
    fn library_link_climbing_through_directory_symlink() {
        let host = Host::new();
        let rootfs = tempfile::tempdir().unwrap();
        let host_root = fs::canonicalize(host.dir.path()).unwrap();
        let real = host_root.join("usr/share/libfoo.so.1");
        fs::create_dir_all(real.parent().unwrap()).unwrap();
        fs::create_dir_all(host_root.join("usr/lib")).unwrap();
        fs::write(&real, "elf").unwrap();
        symlink("../share/libfoo.so.1", host_root.join("usr/lib/libfoo.so")).unwrap();
        symlink("usr/lib", host_root.join("lib")).unwrap();
        let link = host_root.join("lib/libfoo.so");
        assert_eq!(fs::read_to_string(&link).unwrap(), "elf");

        // merged /usr inside the container as well
        fs::create_dir_all(inside(rootfs.path(), &host_root.join("usr/lib"))).unwrap();
        symlink("usr/lib", inside(rootfs.path(), &host_root.join("lib"))).unwrap();

        Injector::new(rootfs.path())
            .inject_path(Category::Libraries, &link)
            .unwrap();

        assert_eq!(fs::read_to_string(inside(rootfs.path(), &real)).unwrap(), "elf");
        assert_eq!(fs::read_to_string(inside(rootfs.path(), &link)).unwrap(), "elf");
    }

    #[test]
    fn rejected_source_creates_no_directories() {
        let host = Host::new();
        let rootfs = tempfile::tempdir().unwrap();
        let injector = Injector::new(rootfs.path());
        let data = host.file("opt/tool/data", "data", 0o644);

        for (category, source) in [
            (Category::Devices, host.path("dev/missing")),
            (Category::Binaries, host.path("usr/bin/missing")),
            (Category::Binaries, data),
            (Category::Libraries, host.path("usr/lib/libmissing.so")),
            (Category::Directories, host.path("opt/missing")),
            (Category::Miscellaneous, host.path("etc/missing")),
        ] {
            assert!(injector.inject_path(category, &source).is_err());
        }
        assert!(fs::read_dir(rootfs.path()).unwrap().next().is_none());
    }

    #[test]
    fn library_must_be_a_file() {
        let host = Host::new();
        let rootfs = tempfile::tempdir().unwrap();
        fs::create_dir_all(host.path("usr/lib/dir.so")).unwrap();

        let err = Injector::new(rootfs.path())
            .inject_path(Category::Libraries, &host.path("usr/lib/dir.so"))
            .unwrap_err();
        assert!(matches!(err, InjectError::UnexpectedType { found: "directory", .. }));
    }

    #[test]
    fn injects_directory_tree() {
        let host = Host::new();
        let rootfs = tempfile::tempdir().unwrap();
        host.file("opt/suite/bin/run", "run", 0o755);
        host.file("opt/suite/share/data", "data", 0o600);

        let dir = host.path("opt/suite");
        Injector::new(rootfs.path())
            .inject_path(Category::Directories, &dir)
            .unwrap();

        let dst = inside(rootfs.path(), &dir);
        assert_eq!(fs::read_to_string(dst.join("bin/run")).unwrap(), "run");
        assert_eq!(fs::metadata(dst.join("share/data")).unwrap().mode() & 0o777, 0o600);
    }

    #[test]
    fn directories_reject_files() {
        let host = Host::new();
        let rootfs = tempfile::tempdir().unwrap();
        let file = host.file("etc/file", "", 0o644);

        let err = Injector::new(rootfs.path())
            .inject_path(Category::Directories, &file)
            .unwrap_err();
        assert!(matches!(err, InjectError::UnexpectedType { expected: "directory", .. }));
    }

    #[test]
    fn miscellaneous_keeps_symlinks() {
        let host = Host::new();
        let rootfs = tempfile::tempdir().unwrap();
        let link = host.path("etc/alternatives/editor");
        fs::create_dir_all(link.parent().unwrap()).unwrap();
        symlink("/usr/bin/vim", &link).unwrap();

        Injector::new(rootfs.path())
            .inject_path(Category::Miscellaneous, &link)
            .unwrap();

        assert_eq!(
            fs::read_link(inside(rootfs.path(), &link)).unwrap(),
            Path::new("/usr/bin/vim")
        );
    }

    #[test]
    fn devices_reject_regular_files() {
        let host = Host::new();
        let rootfs = tempfile::tempdir().unwrap();
        let file = host.file("dev/fake", "", 0o644);

        let err = Injector::new(rootfs.path())
            .inject_path(Category::Devices, &file)
            .unwrap_err();
        assert!(matches!(err, InjectError::UnexpectedType { expected: "device", .. }));
    }

    #[test]
    fn relative_source_is_rejected() {
        let rootfs = tempfile::tempdir().unwrap();
        let err = Injector::new(rootfs.path())
            .inject_path(Category::Miscellaneous, Path::new("etc/hosts"))
            .unwrap_err();
        assert!(matches!(err, InjectError::InvalidPath { .. }));
    }

    #[test]
    fn destination_follows_rootfs_symlinks_inside_root() {
        let host = Host::new();
        let rootfs = tempfile::tempdir().unwrap();
        let lib = host.file("lib/libbar.so", "bar", 0o644);

        let host_root = host.dir.path().strip_prefix("/").unwrap();
        let real_dir = rootfs.path().join("usr").join(host_root).join("lib");
        fs::create_dir_all(&real_dir).unwrap();
        fs::create_dir_all(inside(rootfs.path(), host.dir.path())).unwrap();
        symlink(
            Path::new("/usr").join(host_root).join("lib"),
            inside(rootfs.path(), &host.path("lib")),
        )
        .unwrap();

        let dst = Injector::new(rootfs.path())
            .inject_path(Category::Libraries, &lib)
            .unwrap();

        assert_eq!(dst, real_dir.join("libbar.so"));
        assert_eq!(fs::read_to_string(real_dir.join("libbar.so")).unwrap(), "bar");
    }

    #[test]
    fn injection_is_idempotent() {
        let host = Host::new();
        let bin = host.file("usr/bin/tool", "tool", 0o755);
        let lib = host.file("usr/lib/libx.so.1.0", "lib", 0o644);
        let link = host.path("usr/lib/libx.so.1");
        symlink("libx.so.1.0", &link).unwrap();
        host.file("opt/tree/a/b", "b", 0o640);
        let conf = host.file("etc/tool.conf", "conf", 0o644);

        let config = feature(
            "tools",
            serde_json::json!({
                "binaries": [bin],
                "libraries": [link, lib],
                "directories": [host.path("opt/tree")],
                "miscellaneous": [conf],
            }),
        );

        let once = tempfile::tempdir().unwrap();
        let report = Injector::new(once.path()).inject(&config);
        assert!(report.is_success(), "{:?}", report.failures());

        let twice = tempfile::tempdir().unwrap();
        let injector = Injector::new(twice.path());
        assert!(injector.inject(&config).is_success());
        assert!(injector.inject(&config).is_success());

        let strip = |root: &Path, entries: Vec<(PathBuf, u32, Option<Vec<u8>>)>| {
            entries
                .into_iter()
                .map(|(p, m, c)| (p.strip_prefix(root).unwrap().to_path_buf(), m, c))
                .collect::<Vec<_>>()
        };
        assert_eq!(
            strip(once.path(), snapshot(once.path())),
            strip(twice.path(), snapshot(twice.path()))
        );
    }

    #[test]
    fn report_merge_accumulates() {
        let host = Host::new();
        let rootfs = tempfile::tempdir().unwrap();
        let bin = host.file("bin/ok", "", 0o755);
        let injector = Injector::new(rootfs.path());

        let mut report = injector.inject(&feature("a", serde_json::json!({ "binaries": [bin] })));
        report.merge(injector.inject(&feature(
            "b",
            serde_json::json!({ "binaries": [host.path("bin/nope")] }),
        )));

        assert_eq!(report.total(), 2);
        assert_eq!(report.injected().len(), 1);
        assert_eq!(report.failures()[0].feature, "b");
    }
}
