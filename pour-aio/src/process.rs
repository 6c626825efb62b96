// pour-aio/src/process.rs
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use pour_common::error::InstallError;
use tracing::{debug, error};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// An external command to run.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: HashMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Exit code, or `128 + signal` when the process was killed by a signal.
    pub fn code(&self) -> i32 {
        if let Some(code) = self.status.code() {
            return code;
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = self.status.signal() {
                return 128 + signal;
            }
        }
        -1
    }
}

/// Runs a command to completion, capturing stdout and stderr. A non-zero exit
/// is returned as output, not as an error; interpreting it is the caller's
/// business.
///
/// On unix the command leads its own process group. When it outlives `timeout`
/// the whole group is killed, and whatever it left running in the background is
/// killed once it exits, so nothing it started keeps writing after we return.
pub fn run_command(spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput, InstallError> {
    debug!(
        "Running command: {} {:?} (cwd: {:?}, envs: {:?})",
        spec.program,
        spec.args,
        spec.cwd,
        spec.envs.keys().collect::<Vec<_>>()
    );

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args);
    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }
    cmd.envs(&spec.envs);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|e| {
        error!("Failed to execute command {}: {}", spec.program, e);
        InstallError::Spawn {
            program: spec.program.clone(),
            source: e.into(),
        }
    })?;

    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let status = match wait_with_deadline(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            error!(
                "Command {} exceeded {:?}, killing its process group",
                spec.program, timeout
            );
            kill_tree(&mut child);
            let _ = child.wait();
            return Err(InstallError::DelegateTimedOut {
                program: spec.program.clone(),
                timeout,
            });
        }
        Err(e) => {
            kill_tree(&mut child);
            let _ = child.wait();
            return Err(InstallError::Spawn {
                program: spec.program.clone(),
                source: e.into(),
            });
        }
    };
    // Stragglers would hold the output pipes open and outlive the caller's lock.
    kill_group(child.id());

    let output = CommandOutput {
        status,
        stdout: stdout_reader.join().unwrap_or_default(),
        stderr: stderr_reader.join().unwrap_or_default(),
    };

    if output.status.success() {
        debug!("Command {} finished successfully.", spec.program);
    } else {
        debug!("Command {} failed with status: {}", spec.program, output.status);
        if !output.stdout.trim().is_empty() {
            debug!("Stdout:\n{}", output.stdout.trim());
        }
        if !output.stderr.trim().is_empty() {
            debug!("Stderr:\n{}", output.stderr.trim());
        }
    }
    Ok(output)
}

fn kill_tree(child: &mut Child) {
    kill_group(child.id());
    let _ = child.kill();
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: plain syscall; ESRCH just means the group is already gone.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc == 0 {
        debug!("Killed process group {}", pgid);
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

// Pipes are read on their own threads so a chatty child cannot block on a full pipe.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("/bin/sh").args(["-c", script])
    }

    #[test]
    fn captures_output_and_status() {
        let out = run_command(&sh("echo out; echo err >&2; exit 3"), Duration::from_secs(10)).unwrap();
        assert_eq!(out.code(), 3);
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[test]
    fn passes_cwd_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let spec = sh("pwd; echo $POUR_TEST_VALUE")
            .cwd(dir.path())
            .env("POUR_TEST_VALUE", "42");
        let out = run_command(&spec, Duration::from_secs(10)).unwrap();
        assert!(out.status.success());
        let lines: Vec<&str> = out.stdout.lines().collect();
        assert_eq!(
            std::fs::canonicalize(lines[0]).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
        assert_eq!(lines[1], "42");
    }

    #[test]
    fn timeout_kills_child() {
        let err = run_command(&sh("sleep 5"), Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, InstallError::DelegateTimedOut { .. }));
    }

    #[test]
    fn timeout_reports_subsecond_duration() {
        let err = run_command(&sh("sleep 5"), Duration::from_millis(250)).unwrap_err();
        match err {
            InstallError::DelegateTimedOut { timeout, .. } => {
                assert_eq!(timeout, Duration::from_millis(250))
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn timeout_kills_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("written_late");
        let spec = CommandSpec::new("/bin/sh").args([
            "-c".to_string(),
            "(sleep 1; touch \"$1\") & wait".to_string(),
            "sh".to_string(),
            marker.display().to_string(),
        ]);

        let err = run_command(&spec, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, InstallError::DelegateTimedOut { .. }));
        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists(), "background job survived the timeout");
    }

    #[test]
    fn background_children_do_not_outlive_success() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("written_late");
        let spec = CommandSpec::new("/bin/sh").args([
            "-c".to_string(),
            "(sleep 1; touch \"$1\") >/dev/null 2>&1 & exit 0".to_string(),
            "sh".to_string(),
            marker.display().to_string(),
        ]);

        let out = run_command(&spec, Duration::from_secs(10)).unwrap();
        assert!(out.status.success());
        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists());
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = run_command(
            &CommandSpec::new("/definitely/not/a/program"),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, InstallError::Spawn { .. }));
    }
}
