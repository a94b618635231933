//! Filesystem helpers for staging and delivery.

use std::fs::{self, File, OpenOptions, Permissions};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::PackError;

/// Recursively copy the contents of `src` into the existing directory `dst`.
///
/// File permission bits and directory structure are preserved. Directory
/// permissions are applied after their contents are copied and always keep
/// the owner's write bit, so the staged tree can still be cleaned and
/// removed. Symlinks are followed. If `dst` lies inside `src` it is not
/// descended into.
///
/// # Errors
///
/// Returns [`PackError::Io`] naming the first path that failed; nothing
/// after it is copied.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<usize, PackError> {
    let mut dir_modes: Vec<(PathBuf, Permissions)> = Vec::new();
    let mut files = 0;

    let dst_real = fs::canonicalize(dst).map_err(|e| PackError::from_io(dst, e))?;
    let walker = WalkDir::new(src)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && is_same_dir(e.path(), &dst_real)));

    for entry in walker {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| PackError::io(entry.path(), io::Error::other(e)))?;
        let target = dst.join(rel);
        let meta = entry.metadata().map_err(|e| walk_error(src, e))?;

        if meta.is_dir() {
            fs::create_dir_all(&target).map_err(|e| PackError::io(&target, e))?;
            dir_modes.push((target, meta.permissions()));
        } else {
            fs::copy(entry.path(), &target).map_err(|e| PackError::io(entry.path(), e))?;
            files += 1;
        }
    }

    for (dir, perms) in dir_modes.into_iter().rev() {
        fs::set_permissions(&dir, owner_writable(perms)).map_err(|e| PackError::io(&dir, e))?;
    }

    Ok(files)
}

/// Delete every file called `name` anywhere under `root`.
///
/// Returns how many were removed.
///
/// # Errors
///
/// Returns [`PackError::Io`] if the tree cannot be walked or a match cannot
/// be deleted.
pub fn remove_named(root: &Path, name: &str) -> Result<usize, PackError> {
    let mut matches = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !entry.file_type().is_dir() && entry.file_name() == name {
            matches.push(entry.into_path());
        }
    }

    for path in &matches {
        fs::remove_file(path).map_err(|e| PackError::io(path, e))?;
    }
    Ok(matches.len())
}

/// Copy `src` to `dst`, refusing to replace an existing `dst`.
///
/// Permission bits follow the source. A partially written `dst` is removed
/// before the error is returned.
///
/// # Errors
///
/// [`PackError::OutputExists`] if `dst` is already present,
/// [`PackError::Io`] for any other failure.
pub fn copy_file_exclusive(src: &Path, dst: &Path) -> Result<u64, PackError> {
    let mut reader = File::open(src).map_err(|e| PackError::from_io(src, e))?;
    let perms = reader
        .metadata()
        .map_err(|e| PackError::io(src, e))?
        .permissions();

    let mut writer = match OpenOptions::new().write(true).create_new(true).open(dst) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(PackError::OutputExists {
                path: dst.to_path_buf(),
            });
        }
        Err(e) => return Err(PackError::io(dst, e)),
    };

    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|n| writer.sync_all().map(|()| n))
        .and_then(|n| fs::set_permissions(dst, perms).map(|()| n));
    match copied {
        Ok(n) => Ok(n),
        Err(e) => {
            drop(writer);
            let _ = fs::remove_file(dst);
            Err(PackError::io(dst, e))
        }
    }
}

fn is_same_dir(path: &Path, real: &Path) -> bool {
    fs::canonicalize(path).is_ok_and(|p| p == real)
}

#[cfg(unix)]
fn owner_writable(perms: Permissions) -> Permissions {
    use std::os::unix::fs::PermissionsExt;
    Permissions::from_mode(perms.mode() | 0o700)
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn owner_writable(mut perms: Permissions) -> Permissions {
    perms.set_readonly(false);
    perms
}

fn walk_error(root: &Path, err: walkdir::Error) -> PackError {
    let path = err.path().unwrap_or(root).to_path_buf();
    PackError::io(path, err.into())
}
