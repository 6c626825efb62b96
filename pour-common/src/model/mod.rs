// pour-common/src/model/mod.rs
pub mod artifact;
pub mod checksum;
pub mod directive;
pub mod formula;

// Re-export
pub use artifact::InstalledArtifact;
pub use checksum::{Checksum, HashAlgorithm};
pub use directive::InstallDirective;
pub use formula::FormulaRecord;
