// pour-aio/src/extract.rs
// Unpacks fetched archives into a staging directory.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use pour_common::error::UnpackError;
use tar::{Archive, EntryType};
use tracing::{debug, error};
use xz2::read::XzDecoder;
use zip::ZipArchive;

/// Turns fetched archive bytes into a directory tree.
pub trait Unpacker {
    fn unpack(&self, archive_name: &str, bytes: &[u8], dest: &Path) -> Result<(), UnpackError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarBz2,
    TarXz,
    Tar,
    Zip,
}

impl ArchiveFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") || name.ends_with(".tbz") {
            Some(ArchiveFormat::TarBz2)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(ArchiveFormat::TarXz)
        } else if name.ends_with(".tar") {
            Some(ArchiveFormat::Tar)
        } else if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else {
            None
        }
    }

    /// Guesses the format from magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        let kind = infer::get(bytes)?;
        match kind.mime_type() {
            "application/gzip" => Some(ArchiveFormat::TarGz),
            "application/x-bzip2" => Some(ArchiveFormat::TarBz2),
            "application/x-xz" => Some(ArchiveFormat::TarXz),
            "application/x-tar" => Some(ArchiveFormat::Tar),
            "application/zip" => Some(ArchiveFormat::Zip),
            _ => None,
        }
    }
}

/// Native tar/gzip/bzip2/xz/zip unpacker. Entries that would land outside the
/// destination are refused.
#[derive(Debug, Clone, Default)]
pub struct ArchiveUnpacker {
    strip_components: usize,
}

impl ArchiveUnpacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop this many leading path components from every entry.
    pub fn strip_components(mut self, n: usize) -> Self {
        self.strip_components = n;
        self
    }
}

impl Unpacker for ArchiveUnpacker {
    fn unpack(&self, archive_name: &str, bytes: &[u8], dest: &Path) -> Result<(), UnpackError> {
        let format = ArchiveFormat::from_name(archive_name)
            .or_else(|| ArchiveFormat::sniff(bytes))
            .ok_or_else(|| UnpackError::UnsupportedFormat(archive_name.to_string()))?;

        debug!(
            "Extracting archive '{}' ({:?}) to '{}' (strip_components={})",
            archive_name,
            format,
            dest.display(),
            self.strip_components
        );
        fs::create_dir_all(dest)?;

        match format {
            ArchiveFormat::TarGz => self.unpack_tar(GzDecoder::new(bytes), archive_name, dest),
            ArchiveFormat::TarBz2 => self.unpack_tar(BzDecoder::new(bytes), archive_name, dest),
            ArchiveFormat::TarXz => self.unpack_tar(XzDecoder::new(bytes), archive_name, dest),
            ArchiveFormat::Tar => self.unpack_tar(bytes, archive_name, dest),
            ArchiveFormat::Zip => self.unpack_zip(bytes, archive_name, dest),
        }
    }
}

impl ArchiveUnpacker {
    fn unpack_tar<R: Read>(&self, reader: R, archive: &str, dest: &Path) -> Result<(), UnpackError> {
        let mut tar = Archive::new(reader);
        tar.set_preserve_permissions(true);
        tar.set_overwrite(true);

        let corrupt = |e: std::io::Error| UnpackError::Corrupt {
            archive: archive.to_string(),
            message: e.to_string(),
        };

        for entry_result in tar.entries().map_err(corrupt)? {
            let mut entry = entry_result.map_err(corrupt)?;
            let original: PathBuf = entry.path().map_err(corrupt)?.into_owned();

            let Some(target) = self.target_path(dest, &original, archive)? else {
                debug!("Skipping entry due to strip_components: {:?}", original);
                continue;
            };

            let entry_type = entry.header().entry_type();
            if matches!(entry_type, EntryType::Symlink | EntryType::Link) {
                let link = entry.link_name().map_err(corrupt)?.ok_or_else(|| {
                    UnpackError::UnsafeEntry {
                        archive: archive.to_string(),
                        entry: original.display().to_string(),
                    }
                })?;
                if !is_contained_relative(&link) {
                    error!(
                        "Link {} -> {} in {} points outside the archive",
                        original.display(),
                        link.display(),
                        archive
                    );
                    return Err(UnpackError::UnsafeEntry {
                        archive: archive.to_string(),
                        entry: original.display().to_string(),
                    });
                }
                if entry_type == EntryType::Link {
                    self.link_entry(dest, &original, &link, &target, archive)?;
                    continue;
                }
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            entry.unpack(&target).map_err(corrupt)?;
            debug!("Unpacked TAR entry to: {}", target.display());
        }
        Ok(())
    }

    // Hard links name another archive path, so the target goes through the same
    // stripping and containment checks. It must already have been unpacked.
    fn link_entry(
        &self,
        dest: &Path,
        original: &Path,
        link: &Path,
        target: &Path,
        archive: &str,
    ) -> Result<(), UnpackError> {
        let unsafe_entry = || UnpackError::UnsafeEntry {
            archive: archive.to_string(),
            entry: original.display().to_string(),
        };
        let source = self.target_path(dest, link, archive)?.ok_or_else(unsafe_entry)?;
        if !source.is_file() {
            error!(
                "Hard link {} -> {} in {} names a file not unpacked before it",
                original.display(),
                link.display(),
                archive
            );
            return Err(UnpackError::Corrupt {
                archive: archive.to_string(),
                message: format!(
                    "hard link '{}' points at missing entry '{}'",
                    original.display(),
                    link.display()
                ),
            });
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if target.exists() {
            fs::remove_file(target)?;
        }
        if fs::hard_link(&source, target).is_err() {
            fs::copy(&source, target)?;
        }
        debug!("Linked TAR entry {} -> {}", target.display(), source.display());
        Ok(())
    }

    fn unpack_zip(&self, bytes: &[u8], archive: &str, dest: &Path) -> Result<(), UnpackError> {
        let corrupt = |e: zip::result::ZipError| UnpackError::Corrupt {
            archive: archive.to_string(),
            message: e.to_string(),
        };
        let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)?;

        for i in 0..zip.len() {
            let mut file = zip.by_index(i).map_err(corrupt)?;
            let original = file.enclosed_name().ok_or_else(|| UnpackError::UnsafeEntry {
                archive: archive.to_string(),
                entry: file.name().to_string(),
            })?;

            let Some(target) = self.target_path(dest, &original, archive)? else {
                continue;
            };

            if file.is_dir() {
                fs::create_dir_all(&target)?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&target)?;
            std::io::copy(&mut file, &mut out)?;

            #[cfg(unix)]
            if let Some(mode) = file.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))?;
            }
            debug!("Extracted ZIP entry to: {}", target.display());
        }
        Ok(())
    }

    /// Maps an entry path into `dest`. `None` when stripping consumes the whole path.
    fn target_path(
        &self,
        dest: &Path,
        original: &Path,
        archive: &str,
    ) -> Result<Option<PathBuf>, UnpackError> {
        let stripped: Vec<Component<'_>> =
            original.components().skip(self.strip_components).collect();
        if stripped.is_empty() {
            return Ok(None);
        }

        let mut target = dest.to_path_buf();
        for comp in stripped {
            match comp {
                Component::Normal(p) => target.push(p),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    error!(
                        "Disallowed component {:?} in path {} within {}",
                        comp,
                        original.display(),
                        archive
                    );
                    return Err(UnpackError::UnsafeEntry {
                        archive: archive.to_string(),
                        entry: original.display().to_string(),
                    });
                }
            }
        }
        if target == dest {
            return Ok(None);
        }
        Ok(Some(target))
    }
}

fn is_contained_relative(link: &Path) -> bool {
    let mut depth: i64 = 0;
    for comp in link.components() {
        match comp {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => depth -= 1,
            Component::RootDir | Component::Prefix(_) => return false,
        }
        if depth < 0 {
            return false;
        }
    }
    true
}
