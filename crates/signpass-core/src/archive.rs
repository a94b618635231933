//! `.pkpass` container writer.
//!
//! Members are the top-level files of the workspace, stored flat under
//! their base names with deflate compression. Each member carries its
//! source file's modification time and, on unix, its permission bits.
//! Member order follows the directory listing.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local, Timelike};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::PackError;
use crate::manifest::utf8_name;
use crate::{PKPASS_EXT, pkpass_name};

/// Write `<identifier>.pkpass` inside `dir` and return its path.
///
/// Files already ending in `.pkpass` are left out, including the archive
/// being written. Subdirectories are skipped. On failure the partially
/// written archive stays on disk for the caller to deal with.
///
/// # Errors
///
/// [`PackError::Io`] if a member cannot be opened or read,
/// [`PackError::InvalidName`] if a member name is not UTF-8,
/// [`PackError::Archive`] if the container itself cannot be written.
pub fn create_archive(dir: &Path, identifier: &str) -> Result<PathBuf, PackError> {
    let archive_path = dir.join(pkpass_name(identifier));
    let file = File::create(&archive_path).map_err(|e| PackError::io(&archive_path, e))?;
    let mut zip = ZipWriter::new(file);
    let zip_err = |source: zip::result::ZipError| PackError::Archive {
        path: archive_path.clone(),
        source,
    };

    let mut members = 0usize;
    let listing = fs::read_dir(dir).map_err(|e| PackError::io(dir, e))?;
    for entry in listing {
        let entry = entry.map_err(|e| PackError::io(dir, e))?;
        let path = entry.path();
        if has_archive_extension(&path) {
            continue;
        }

        let meta = fs::metadata(&path).map_err(|e| PackError::io(&path, e))?;
        if meta.is_dir() {
            warn!(dir = %path.display(), "subdirectory not archived");
            continue;
        }

        let name = utf8_name(&entry)?;
        let mut source = File::open(&path).map_err(|e| PackError::io(&path, e))?;

        zip.start_file(name.as_str(), member_options(&meta))
            .map_err(zip_err)?;
        io::copy(&mut source, &mut zip).map_err(|e| PackError::io(&path, e))?;

        debug!(member = %name, bytes = meta.len(), "archived");
        members += 1;
    }

    zip.finish().map_err(zip_err)?;
    debug!(archive = %archive_path.display(), members, "archive written");
    Ok(archive_path)
}

fn has_archive_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == PKPASS_EXT)
}

fn member_options(meta: &fs::Metadata) -> SimpleFileOptions {
    let mut options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(modified_time(meta));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        options = options.unix_permissions(meta.permissions().mode() & 0o7777);
    }

    options
}

/// MS-DOS timestamp of the file's mtime; 1980-01-01 when out of range.
fn modified_time(meta: &fs::Metadata) -> DateTime {
    let Ok(modified) = meta.modified() else {
        return DateTime::default();
    };
    let local: chrono::DateTime<Local> = modified.into();

    let (Ok(year), Ok(month), Ok(day), Ok(hour), Ok(minute), Ok(second)) = (
        u16::try_from(local.year()),
        u8::try_from(local.month()),
        u8::try_from(local.day()),
        u8::try_from(local.hour()),
        u8::try_from(local.minute()),
        u8::try_from(local.second()),
    ) else {
        return DateTime::default();
    };

    DateTime::from_date_and_time(year, month, day, hour, minute, second).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn members(archive: &Path) -> Vec<(String, Vec<u8>)> {
        let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
        let mut out = Vec::new();
        for i in 0..zip.len() {
            let mut member = zip.by_index(i).unwrap();
            let mut data = Vec::new();
            member.read_to_end(&mut data).unwrap();
            out.push((member.name().to_string(), data));
        }
        out.sort();
        out
    }

    #[test]
    fn archives_top_level_files_flat() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pass.json"), b"{\"a\":1}").unwrap();
        fs::write(dir.path().join("icon.png"), [0u8, 1, 2, 3]).unwrap();
        fs::create_dir(dir.path().join("en.lproj")).unwrap();
        fs::write(dir.path().join("en.lproj/pass.strings"), b"x").unwrap();

        let path = create_archive(dir.path(), "abc").unwrap();
        assert_eq!(path, dir.path().join("abc.pkpass"));
        assert_eq!(
            members(&path),
            vec![
                ("icon.png".to_string(), vec![0u8, 1, 2, 3]),
                ("pass.json".to_string(), b"{\"a\":1}".to_vec()),
            ]
        );
    }

    #[test]
    fn skips_existing_archives() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pass.json"), b"{}").unwrap();
        fs::write(dir.path().join("old.pkpass"), b"stale").unwrap();

        let path = create_archive(dir.path(), "new").unwrap();
        let names: Vec<String> = members(&path).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["pass.json".to_string()]);
    }

    // Filesystems on macOS refuse non-UTF-8 names.
    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_member_name_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"a\xff.png")), b"1").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"a\xfe.png")), b"2").unwrap();

        let err = create_archive(dir.path(), "id").unwrap_err();
        assert!(matches!(err, PackError::InvalidName { .. }));
    }

    #[test]
    fn members_are_deflated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pass.json"), b"{}").unwrap();

        let path = create_archive(dir.path(), "id").unwrap();
        let mut zip = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let member = zip.by_name("pass.json").unwrap();
        assert_eq!(member.compression(), CompressionMethod::Deflated);
    }
}
