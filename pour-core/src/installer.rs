// pour-core/src/installer.rs
// Fetch -> verify -> unpack -> install, for one record at a time.

use std::fs;
use std::path::Path;

use pour_aio::extract::Unpacker;
use pour_common::config::Config;
use pour_common::error::{PourError, Result};
use pour_common::model::{FormulaRecord, InstalledArtifact};
use pour_net::http::Fetcher;
use pour_net::validation::verify;
use tracing::{debug, error, info};

use crate::install::{install_with, InstallOptions};
use crate::lock::PrefixLock;

/// What a successful install put in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub name: String,
    pub version: Option<String>,
    pub artifacts: Vec<InstalledArtifact>,
}

pub struct Installer<F, U> {
    config: Config,
    fetcher: F,
    unpacker: U,
}

impl<F: Fetcher, U: Unpacker> Installer<F, U> {
    pub fn new(config: Config, fetcher: F, unpacker: U) -> Self {
        Self {
            config,
            fetcher,
            unpacker,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Installs `record` into `prefix`. Every step must succeed before the
    /// next runs; a checksum mismatch stops before anything is unpacked.
    pub fn install(&self, record: &FormulaRecord, prefix: &Path) -> Result<InstallReport> {
        let id = record.display_id();
        let _lock = PrefixLock::acquire(prefix)?;

        info!("==> Fetching {} from {}", id, record.archive_url());
        let bytes = self.fetcher.fetch(record.archive_url())?;
        debug!("Fetched {} bytes for {}", bytes.len(), id);

        verify(record, &bytes).map_err(|e| {
            error!("Checksum verification failed for {}: {}", id, e);
            PourError::from(e)
        })?;
        info!("Verified {} checksum for {}", record.checksum().algorithm(), id);

        let staging_root = self.config.tmp_dir();
        fs::create_dir_all(&staging_root)?;
        let staging = tempfile::Builder::new()
            .prefix(&format!("{}-", record.name()))
            .tempdir_in(&staging_root)?;
        self.unpacker
            .unpack(&record.archive_file_name(), &bytes, staging.path())?;
        info!("Unpacked {} into {}", id, staging.path().display());

        let options = InstallOptions {
            delegate_timeout: self.config.delegate_timeout,
        };
        let artifacts = install_with(record, staging.path(), prefix, &options)?;

        Ok(InstallReport {
            name: record.name().to_string(),
            version: record.effective_version(),
            artifacts,
        })
    }
}
