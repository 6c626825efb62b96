// pour-common/src/model/artifact.rs
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Something an install placed (or handed off placing) under a destination prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstalledArtifact {
    /// An executable copied into the prefix's bin dir.
    Binary { path: PathBuf },
    /// A delegated build procedure that completed against this prefix.
    /// Its individual files are not tracked.
    DelegatedPrefix { prefix: PathBuf },
}
