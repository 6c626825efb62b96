// pour-core/src/install/copy.rs
use std::path::Path;

use pour_aio::fs::{copy_with_mode, ensure_dir, EXECUTABLE_MODE};
use pour_common::config::bin_dir_for;
use pour_common::error::InstallError;
use pour_common::model::InstalledArtifact;
use tracing::{debug, error};

/// Copies one executable from the unpacked archive into `<prefix>/bin`.
///
/// The source is checked before anything under `prefix` is touched, so a
/// missing file leaves the destination exactly as it was.
pub fn install_binary(
    unpacked_root: &Path,
    source: &Path,
    target_name: Option<&str>,
    prefix: &Path,
) -> Result<InstalledArtifact, InstallError> {
    let src = unpacked_root.join(source);
    if !src.is_file() {
        error!("Source {} not found in unpacked archive", src.display());
        return Err(InstallError::SourceMissing { path: src });
    }

    let file_name = match target_name {
        Some(name) => name.to_string(),
        None => source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| InstallError::SourceMissing { path: src.clone() })?,
    };

    let bin_dir = bin_dir_for(prefix);
    ensure_dir(&bin_dir)?;
    let dest = bin_dir.join(&file_name);
    let bytes = copy_with_mode(&src, &dest, EXECUTABLE_MODE)?;
    debug!(
        "Copied {} ({} bytes) to {} with mode {:o}",
        src.display(),
        bytes,
        dest.display(),
        EXECUTABLE_MODE
    );

    Ok(InstalledArtifact::Binary { path: dest })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pour_aio::fs::file_mode;

    use super::*;

    fn unpacked_with(path: &str, content: &[u8]) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let full = root.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
        root
    }

    #[test]
    fn copies_byte_identical_with_exec_mode() {
        let root = unpacked_with("bin/instaunit", b"\x7fELF fake binary");
        let prefix = tempfile::tempdir().unwrap();

        let artifact =
            install_binary(root.path(), Path::new("bin/instaunit"), None, prefix.path()).unwrap();
        let dest = prefix.path().join("bin/instaunit");
        assert_eq!(artifact, InstalledArtifact::Binary { path: dest.clone() });
        assert_eq!(fs::read(&dest).unwrap(), b"\x7fELF fake binary");
        #[cfg(unix)]
        assert_eq!(file_mode(&dest), Some(0o755));
    }

    #[test]
    fn honours_target_name() {
        let root = unpacked_with("instaunit-darwin-amd64", b"bin");
        let prefix = tempfile::tempdir().unwrap();

        install_binary(
            root.path(),
            Path::new("instaunit-darwin-amd64"),
            Some("instaunit"),
            prefix.path(),
        )
        .unwrap();
        assert!(prefix.path().join("bin/instaunit").is_file());
    }

    #[test]
    fn existing_bin_dir_is_fine() {
        let root = unpacked_with("bin/tool", b"v2");
        let prefix = tempfile::tempdir().unwrap();
        fs::create_dir_all(prefix.path().join("bin")).unwrap();
        fs::write(prefix.path().join("bin/tool"), b"v1").unwrap();

        install_binary(root.path(), Path::new("bin/tool"), None, prefix.path()).unwrap();
        assert_eq!(fs::read(prefix.path().join("bin/tool")).unwrap(), b"v2");
    }

    #[test]
    fn directory_is_not_a_source() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("bin/tool")).unwrap();
        let prefix = tempfile::tempdir().unwrap();

        let err = install_binary(root.path(), Path::new("bin/tool"), None, prefix.path()).unwrap_err();
        assert!(matches!(err, InstallError::SourceMissing { .. }));
        assert_eq!(fs::read_dir(prefix.path()).unwrap().count(), 0);
    }
}
