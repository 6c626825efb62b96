// pour-core/src/lock.rs
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs4::FileExt;
use pour_common::config::lock_path_for;
use pour_common::error::{PourError, Result};
use tracing::debug;

/// Exclusive advisory lock on a destination prefix, held until dropped.
#[derive(Debug)]
pub struct PrefixLock {
    _file: File,
    path: PathBuf,
}

impl PrefixLock {
    /// Blocks until the lock on `prefix` is available.
    pub fn acquire(prefix: &Path) -> Result<Self> {
        let (file, path) = open_lock_file(prefix)?;
        debug!("Waiting for prefix lock {}", path.display());
        file.lock_exclusive().map_err(|e| {
            PourError::Lock(format!("failed to lock {}: {e}", path.display()))
        })?;
        debug!("Acquired prefix lock {}", path.display());
        Ok(Self { _file: file, path })
    }

    /// `None` when another holder already has the lock.
    pub fn try_acquire(prefix: &Path) -> Result<Option<Self>> {
        let (file, path) = open_lock_file(prefix)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { _file: file, path })),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            #[cfg(windows)]
            Err(err) if matches!(err.raw_os_error(), Some(32 | 33)) => Ok(None),
            Err(err) => Err(PourError::Lock(format!(
                "failed to lock {}: {err}",
                path.display()
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_lock_file(prefix: &Path) -> Result<(File, PathBuf)> {
    let path = lock_path_for(prefix);
    fs::create_dir_all(prefix)
        .map_err(|e| PourError::Lock(format!("failed to create {}: {e}", prefix.display())))?;
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| PourError::Lock(format!("failed to open {}: {e}", path.display())))?;
    Ok((file, path))
}
