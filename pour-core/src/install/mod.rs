// pour-core/src/install/mod.rs
// Carries out a record's install directive against an unpacked archive.

use std::path::Path;
use std::time::Duration;

use pour_common::error::InstallError;
use pour_common::model::{FormulaRecord, InstallDirective, InstalledArtifact};
use tracing::{debug, info};

pub mod copy;
pub mod delegate;

const DEFAULT_DELEGATE_TIMEOUT: Duration = Duration::from_secs(1800);

#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Upper bound on a delegated build's run time.
    pub delegate_timeout: Duration,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            delegate_timeout: DEFAULT_DELEGATE_TIMEOUT,
        }
    }
}

/// Installs `record` from `unpacked_root` into `prefix` with default options.
pub fn install(
    record: &FormulaRecord,
    unpacked_root: &Path,
    prefix: &Path,
) -> Result<Vec<InstalledArtifact>, InstallError> {
    install_with(record, unpacked_root, prefix, &InstallOptions::default())
}

pub fn install_with(
    record: &FormulaRecord,
    unpacked_root: &Path,
    prefix: &Path,
    options: &InstallOptions,
) -> Result<Vec<InstalledArtifact>, InstallError> {
    debug!(
        "Installing {} ({}) from {} into {}",
        record.display_id(),
        record.install_directive().kind(),
        unpacked_root.display(),
        prefix.display()
    );

    let artifact = match record.install_directive() {
        InstallDirective::DirectCopy {
            source,
            target_name,
        } => copy::install_binary(unpacked_root, source, target_name.as_deref(), prefix)?,
        InstallDirective::DelegatedBuild {
            program,
            args,
            prefix_arg,
        } => delegate::run_delegated_build(
            unpacked_root,
            program,
            args,
            prefix_arg,
            prefix,
            options.delegate_timeout,
        )?,
    };

    info!("Installed {}", record.display_id());
    Ok(vec![artifact])
}
