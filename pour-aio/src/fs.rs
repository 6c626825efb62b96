/*
File: pour-aio/src/fs.rs
Purpose: Destination filesystem primitives used by installs.
*/
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use pour_common::error::InstallError;
use tempfile::NamedTempFile;
#[cfg(not(unix))]
use tracing::warn;
use tracing::{debug, error};

/// rwxr-xr-x
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Creates a directory and its parents. Succeeds if it already exists.
pub fn ensure_dir(path: &Path) -> Result<(), InstallError> {
    if path.is_dir() {
        return Ok(());
    }
    debug!("Creating directory recursively: {}", path.display());
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        InstallError::io(path, e)
    })
}

/// Copies `src` to `dest` and sets `mode`. The data lands in a temporary file
/// next to `dest` first and is renamed into place, so `dest` is never observed
/// half-written and nothing is left behind on failure.
pub fn copy_with_mode(src: &Path, dest: &Path, mode: u32) -> Result<u64, InstallError> {
    let dir = dest.parent().ok_or_else(|| {
        InstallError::io(
            dest,
            io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent directory"),
        )
    })?;

    let mut reader = BufReader::new(File::open(src).map_err(|e| InstallError::io(src, e))?);
    let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| InstallError::io(dir, e))?;
    let temp_path = temp_file.path().to_path_buf();

    debug!(
        "Copying {} to {} via temp file {}",
        src.display(),
        dest.display(),
        temp_path.display()
    );

    let bytes = io::copy(&mut reader, &mut temp_file).map_err(|e| InstallError::io(&temp_path, e))?;
    temp_file
        .flush()
        .and_then(|_| temp_file.as_file().sync_all())
        .map_err(|e| InstallError::io(&temp_path, e))?;
    set_permissions(&temp_path, mode)?;

    temp_file.persist(dest).map_err(|e| {
        error!(
            "Failed to persist temporary file {} over {}: {}",
            temp_path.display(),
            dest.display(),
            e.error
        );
        InstallError::io(dest, e.error)
    })?;
    Ok(bytes)
}

/// Sets file permissions. Mode is standard Unix octal mode.
#[cfg(unix)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<(), InstallError> {
    debug!("Setting permissions on {}: {:o}", path.display(), mode);
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| {
        error!("Failed set permissions on {}: {}", path.display(), e);
        InstallError::io(path, e)
    })
}

#[cfg(not(unix))]
pub fn set_permissions(path: &Path, _mode: u32) -> Result<(), InstallError> {
    warn!(
        "Setting permissions not supported on this platform: {}",
        path.display()
    );
    Ok(())
}

/// Permission bits of `path`, if the platform has them.
#[cfg(unix)]
pub fn file_mode(path: &Path) -> Option<u32> {
    fs::metadata(path).ok().map(|m| m.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
pub fn file_mode(_path: &Path) -> Option<u32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/bin");
        ensure_dir(&target).unwrap();
        ensure_dir(&target).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn ensure_dir_over_a_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("bin");
        fs::write(&target, b"not a dir").unwrap();
        assert!(matches!(ensure_dir(&target), Err(InstallError::Io { .. })));
    }

    #[test]
    fn copy_sets_mode_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        fs::write(&src, b"#!/bin/sh\necho hi\n").unwrap();

        let n = copy_with_mode(&src, &dest, EXECUTABLE_MODE).unwrap();
        assert_eq!(n, 18);
        assert_eq!(fs::read(&dest).unwrap(), fs::read(&src).unwrap());
        #[cfg(unix)]
        assert_eq!(file_mode(&dest), Some(0o755));
    }

    #[test]
    fn copy_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        fs::write(&src, b"new").unwrap();
        fs::write(&dest, b"old contents").unwrap();

        copy_with_mode(&src, &dest, EXECUTABLE_MODE).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn failed_copy_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("dest");
        let err = copy_with_mode(&dir.path().join("missing"), &dest, EXECUTABLE_MODE);
        assert!(err.is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
