// pour-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::error::{PourError, Result};

// Used when neither POUR_PREFIX nor HOMEBREW_PREFIX is set.
const DEFAULT_FALLBACK_PREFIX: &str = "/opt/homebrew";
const LOCK_FILENAME: &str = ".pour.lock";

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DELEGATE_TIMEOUT_SECS: u64 = 1800;

#[derive(Debug, Clone)]
pub struct Config {
    pub prefix: PathBuf,
    pub fetch_timeout: Duration,
    pub connect_timeout: Duration,
    pub delegate_timeout: Duration,
    pub github_api_token: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading pour configuration");

        let prefix_str = env::var("POUR_PREFIX")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| env::var("HOMEBREW_PREFIX").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| {
                debug!(
                    "POUR_PREFIX and HOMEBREW_PREFIX not set, falling back to default: {}",
                    DEFAULT_FALLBACK_PREFIX
                );
                DEFAULT_FALLBACK_PREFIX.to_string()
            });

        let mut config = Self::with_prefix(prefix_str);
        config.fetch_timeout = secs_from_env("POUR_FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS)?;
        config.delegate_timeout =
            secs_from_env("POUR_DELEGATE_TIMEOUT_SECS", DEFAULT_DELEGATE_TIMEOUT_SECS)?;
        config.github_api_token = env::var("HOMEBREW_GITHUB_API_TOKEN").ok();

        debug!("Effective prefix set to: {}", config.prefix.display());
        Ok(config)
    }

    /// A configuration rooted at `prefix` with default timeouts, ignoring the environment.
    pub fn with_prefix(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            delegate_timeout: Duration::from_secs(DEFAULT_DELEGATE_TIMEOUT_SECS),
            github_api_token: None,
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn bin_dir(&self) -> PathBuf {
        bin_dir_for(&self.prefix)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.prefix.join("tmp")
    }

    pub fn lock_path(&self) -> PathBuf {
        lock_path_for(&self.prefix)
    }
}

/// `<prefix>/bin`, the directory DirectCopy installs into.
pub fn bin_dir_for(prefix: &Path) -> PathBuf {
    prefix.join("bin")
}

pub fn lock_path_for(prefix: &Path) -> PathBuf {
    prefix.join(LOCK_FILENAME)
}

fn secs_from_env(var: &str, default: u64) -> Result<Duration> {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| PourError::Config(format!("{var}='{raw}' is not a number of seconds: {e}"))),
        _ => Ok(Duration::from_secs(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_derive_from_prefix() {
        let config = Config::with_prefix("/tmp/pour-prefix");
        assert_eq!(config.bin_dir(), PathBuf::from("/tmp/pour-prefix/bin"));
        assert_eq!(config.tmp_dir(), PathBuf::from("/tmp/pour-prefix/tmp"));
        assert_eq!(config.lock_path(), PathBuf::from("/tmp/pour-prefix/.pour.lock"));
        assert_eq!(config.fetch_timeout, Duration::from_secs(300));
    }

    #[test]
    fn unset_timeout_falls_back() {
        let d = secs_from_env("POUR_TEST_SURELY_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(d, Duration::from_secs(7));
    }
}
