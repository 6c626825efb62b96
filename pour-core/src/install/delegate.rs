// pour-core/src/install/delegate.rs
use std::path::Path;
use std::time::Duration;

use pour_aio::process::{run_command, CommandSpec};
use pour_common::error::InstallError;
use pour_common::model::InstalledArtifact;
use tracing::{error, info};

/// Runs `program args... <prefix_arg>=<prefix>` inside the unpacked archive.
/// Whatever the procedure writes under `prefix` is its own business; a non-zero
/// exit stops here.
pub fn run_delegated_build(
    unpacked_root: &Path,
    program: &str,
    args: &[String],
    prefix_arg: &str,
    prefix: &Path,
    timeout: Duration,
) -> Result<InstalledArtifact, InstallError> {
    let spec = CommandSpec::new(program)
        .args(args.iter().cloned())
        .args([format!("{}={}", prefix_arg, prefix.display())])
        .cwd(unpacked_root);

    info!(
        "==> Running {} {} {}={}",
        program,
        args.join(" "),
        prefix_arg,
        prefix.display()
    );
    let output = run_command(&spec, timeout)?;

    if !output.status.success() {
        let status = output.code();
        error!("{} failed with status: {}", program, output.status);
        if !output.stdout.trim().is_empty() {
            error!("{} stdout:\n{}", program, output.stdout.trim());
        }
        if !output.stderr.trim().is_empty() {
            error!("{} stderr:\n{}", program, output.stderr.trim());
        }
        return Err(InstallError::DelegateFailed { status });
    }

    info!("{} completed successfully.", program);
    Ok(InstalledArtifact::DelegatedPrefix {
        prefix: prefix.to_path_buf(),
    })
}
