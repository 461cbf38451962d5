//! The copy primitive shared by all categories.
//!
//! Every leaf (regular file, symlink, device node) is first created under a
//! temporary name next to its destination and then renamed into place. A failed
//! copy therefore never leaves a partial entry at the destination, and running
//! the same copy twice yields the same tree.
use std::fs::{self, FileType, Metadata, Permissions};
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::Path;

use nix::sys::stat::{Mode, SFlag, mknod};

use super::{InjectError, Result};

/// Permission bits carried over from the source, including setuid, setgid and sticky.
const MODE_MASK: u32 = 0o7777;

/// Prefix of temporary entries created next to a destination.
const TEMP_PREFIX: &str = ".oci-injector.";

/// Returns a human readable name of the file type.
pub(super) fn kind_of(file_type: &FileType) -> &'static str {
    if file_type.is_dir() {
        "directory"
    } else if file_type.is_file() {
        "regular file"
    } else if file_type.is_symlink() {
        "symlink"
    } else if file_type.is_char_device() {
        "character device"
    } else if file_type.is_block_device() {
        "block device"
    } else if file_type.is_fifo() {
        "fifo"
    } else if file_type.is_socket() {
        "socket"
    } else {
        "unknown file"
    }
}

pub(super) fn is_device(file_type: &FileType) -> bool {
    file_type.is_char_device() || file_type.is_block_device()
}

fn permissions_of(meta: &Metadata) -> Permissions {
    Permissions::from_mode(meta.mode() & MODE_MASK)
}

fn write_err(path: &Path) -> impl FnOnce(io::Error) -> InjectError + '_ {
    move |source| InjectError::Write {
        path: path.to_path_buf(),
        source,
    }
}

fn temp_builder() -> tempfile::Builder<'static, 'static> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_PREFIX);
    builder
}

fn parent_of(dst: &Path) -> Result<&Path> {
    dst.parent().ok_or_else(|| InjectError::InvalidPath {
        path: dst.to_path_buf(),
        reason: "destination has no parent directory",
    })
}

/// Creates all missing parent directories of `dst`.
pub(super) fn create_parent_dirs(dst: &Path) -> Result<()> {
    let parent = parent_of(dst)?;
    fs::create_dir_all(parent).map_err(|source| InjectError::CreateDir {
        path: parent.to_path_buf(),
        source,
    })
}

/// Fails with [`InjectError::Unsupported`] for file types that cannot be copied.
pub(super) fn check_node(src: &Path, meta: &Metadata) -> Result<()> {
    let file_type = meta.file_type();
    if file_type.is_dir() || file_type.is_file() || file_type.is_symlink() || is_device(&file_type)
    {
        Ok(())
    } else {
        Err(InjectError::Unsupported {
            path: src.to_path_buf(),
            kind: kind_of(&file_type),
        })
    }
}

/// Copies `src` to `dst` according to the file type in `meta`.
///
/// `meta` decides whether `src` is treated as a symlink, so callers choose
/// between following and not following the top-level link.
pub(super) fn copy_node(src: &Path, dst: &Path, meta: &Metadata) -> Result<()> {
    check_node(src, meta)?;
    let file_type = meta.file_type();
    if file_type.is_dir() {
        copy_dir(src, dst, meta)
    } else if file_type.is_file() {
        copy_file(src, dst, meta)
    } else if file_type.is_symlink() {
        copy_symlink(src, dst)
    } else {
        copy_device(dst, meta)
    }
}

/// Copies the contents and permission bits of a regular file.
pub(super) fn copy_file(src: &Path, dst: &Path, meta: &Metadata) -> Result<()> {
    let mut input = fs::File::open(src).map_err(|source| InjectError::Read {
        path: src.to_path_buf(),
        source,
    })?;

    let mut tmp = temp_builder()
        .tempfile_in(parent_of(dst)?)
        .map_err(write_err(dst))?;
    io::copy(&mut input, tmp.as_file_mut()).map_err(write_err(dst))?;
    tmp.as_file()
        .set_permissions(permissions_of(meta))
        .map_err(write_err(dst))?;
    tmp.as_file().sync_all().map_err(write_err(dst))?;
    tmp.persist(dst).map_err(|err| InjectError::Write {
        path: dst.to_path_buf(),
        source: err.error,
    })?;

    log::debug!("copied file {} -> {}", src.display(), dst.display());
    Ok(())
}

/// Recreates the symlink `src` at `dst` with the same link text.
pub(super) fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = fs::read_link(src).map_err(|source| InjectError::ReadLink {
        path: src.to_path_buf(),
        source,
    })?;

    let tmp = temp_builder()
        .make_in(parent_of(dst)?, |path| {
            std::os::unix::fs::symlink(&target, path)
        })
        .map_err(write_err(dst))?;
    tmp.persist(dst).map_err(|err| InjectError::Write {
        path: dst.to_path_buf(),
        source: err.error,
    })?;

    log::debug!(
        "linked {} -> {} (from {})",
        dst.display(),
        target.display(),
        src.display()
    );
    Ok(())
}

/// Creates a device node with the type, device number and permission bits of `meta`.
pub(super) fn copy_device(dst: &Path, meta: &Metadata) -> Result<()> {
    let file_type = meta.file_type();
    let kind = if file_type.is_char_device() {
        SFlag::S_IFCHR
    } else {
        SFlag::S_IFBLK
    };
    let mode = meta.mode() & MODE_MASK;
    let perm = Mode::from_bits_truncate(mode as nix::libc::mode_t);
    let rdev = meta.rdev() as nix::libc::dev_t;

    let tmp = temp_builder()
        .make_in(parent_of(dst)?, |path| {
            mknod(path, kind, perm, rdev).map_err(io::Error::from)?;
            // mknod applies the umask
            if let Err(err) = fs::set_permissions(path, Permissions::from_mode(mode)) {
                let _ = fs::remove_file(path);
                return Err(err);
            }
            Ok(())
        })
        .map_err(write_err(dst))?;
    tmp.persist(dst).map_err(|err| InjectError::Write {
        path: dst.to_path_buf(),
        source: err.error,
    })?;

    log::debug!(
        "created {} {} ({}:{})",
        kind_of(&file_type),
        dst.display(),
        nix::sys::stat::major(rdev),
        nix::sys::stat::minor(rdev)
    );
    Ok(())
}

/// Merges the directory tree `src` into `dst`.
///
/// Existing entries at `dst` that are not in `src` are kept. Fifos and sockets
/// inside the tree are skipped.
pub(super) fn copy_dir(src: &Path, dst: &Path, meta: &Metadata) -> Result<()> {
    match fs::symlink_metadata(dst) {
        // read-only from an earlier run
        Ok(existing) if existing.is_dir() && existing.mode() & 0o300 != 0o300 => {
            fs::set_permissions(dst, Permissions::from_mode((existing.mode() & MODE_MASK) | 0o300))
                .map_err(write_err(dst))?;
        }
        Ok(existing) if existing.is_dir() => {}
        Ok(existing) => {
            return Err(InjectError::UnexpectedType {
                path: dst.to_path_buf(),
                expected: "directory",
                found: kind_of(&existing.file_type()),
            });
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir(dst).map_err(|source| InjectError::CreateDir {
                path: dst.to_path_buf(),
                source,
            })?;
        }
        Err(source) => {
            return Err(InjectError::Metadata {
                path: dst.to_path_buf(),
                source,
            });
        }
    }

    let read_err = |source| InjectError::Read {
        path: src.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(src).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let entry_src = entry.path();
        let entry_meta =
            fs::symlink_metadata(&entry_src).map_err(|source| InjectError::Metadata {
                path: entry_src.clone(),
                source,
            })?;

        let file_type = entry_meta.file_type();
        if file_type.is_fifo() || file_type.is_socket() {
            log::warn!(
                "skipping {} {} in directory {}",
                kind_of(&file_type),
                entry_src.display(),
                src.display()
            );
            continue;
        }

        copy_node(&entry_src, &dst.join(entry.file_name()), &entry_meta)?;
    }

    // last, so read-only directories are still filled
    fs::set_permissions(dst, permissions_of(meta)).map_err(write_err(dst))?;
    log::debug!("copied directory {} -> {}", src.display(), dst.display());
    Ok(())
}
