// pour-common/src/lib.rs
pub mod config;
pub mod declaration;
pub mod error;
pub mod formulary;
pub mod model;

// Re-export key types
pub use config::Config;
pub use declaration::{load_record, parse, parse_formula_dsl, serialize, DeclarationFormat};
pub use error::{
    ChecksumMismatch, FetchError, InstallError, ParseError, PourError, Result, UnpackError,
};
pub use formulary::{FormulaConflict, Formulary};
pub use model::{Checksum, FormulaRecord, HashAlgorithm, InstallDirective, InstalledArtifact};
