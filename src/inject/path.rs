//! Path handling for injection targets.
//!
//! Destinations live inside a container root filesystem that the hook does not
//! trust. Symlinks found there are resolved as if the root filesystem were `/`,
//! so no destination ever resolves outside of it.
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use super::{InjectError, Result};

/// Upper bound of symlinks followed while resolving one path, as in Linux `MAXSYMLINKS`.
const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Parent,
    Name(OsString),
}

fn parts_of(path: &Path) -> VecDeque<Part> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(Part::Name(name.to_os_string())),
            Component::ParentDir => Some(Part::Parent),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => None,
        })
        .collect()
}

/// Checks that a declared source path is absolute and free of `..` components.
pub(super) fn check_source(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(InjectError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path is not absolute",
        });
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(InjectError::InvalidPath {
            path: path.to_path_buf(),
            reason: "path contains `..`",
        });
    }

    Ok(())
}

/// Lexically normalizes an absolute path, dropping `.` and applying `..`.
pub(super) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::from("/");
    for part in parts_of(path) {
        match part {
            Part::Parent => {
                out.pop();
            }
            Part::Name(name) => out.push(name),
        }
    }
    out
}

/// Resolves `path` below `root`, treating `root` as `/`.
///
/// Symlinks in every component but the last are followed; absolute link targets
/// restart at `root` and `..` never climbs above it. The last component is left
/// as is, since it is the entry about to be replaced.
///
/// # Errors
///
/// - [`InjectError::ReadLink`] if a symlink on the way cannot be read.
/// - [`InjectError::SymlinkLoop`] if more than [`MAX_SYMLINK_HOPS`] symlinks are followed.
pub(super) fn resolve_in_root(root: &Path, path: &Path) -> Result<PathBuf> {
    let mut pending = parts_of(path);
    let mut resolved = PathBuf::new();
    let mut hops = 0;

    while let Some(part) = pending.pop_front() {
        let name = match part {
            Part::Parent => {
                resolved.pop();
                continue;
            }
            Part::Name(name) => name,
        };

        let candidate = resolved.join(&name);
        if pending.is_empty() {
            resolved = candidate;
            break;
        }

        let full = root.join(&candidate);
        match std::fs::symlink_metadata(&full) {
            Ok(meta) if meta.file_type().is_symlink() => {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(InjectError::SymlinkLoop {
                        path: path.to_path_buf(),
                    });
                }
                let target = std::fs::read_link(&full).map_err(|source| InjectError::ReadLink {
                    path: full.clone(),
                    source,
                })?;
                if target.is_absolute() {
                    resolved = PathBuf::new();
                }
                for part in parts_of(&target).into_iter().rev() {
                    pending.push_front(part);
                }
            }
            _ => resolved = candidate,
        }
    }

    Ok(root.join(resolved))
}
