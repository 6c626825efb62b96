// pour-core/src/lib.rs

pub mod install;
pub mod installer;
pub mod lock;

pub use install::{install, install_with, InstallOptions};
pub use installer::{InstallReport, Installer};
pub use lock::PrefixLock;
