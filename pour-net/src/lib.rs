// pour-net/src/lib.rs
pub mod http;
pub mod validation;

pub use http::{Fetcher, HttpFetcher};
pub use pour_common::{
    error::{ChecksumMismatch, FetchError, PourError, Result},
    Config, FormulaRecord,
};
pub use validation::{validate_url, verify, verify_file};
