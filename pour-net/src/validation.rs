// pour-net/src/validation.rs
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use pour_common::error::{ChecksumMismatch, FetchError, Result};
use pour_common::model::FormulaRecord;
use url::Url;

/// Checks fetched bytes against the record's declared digest.
pub fn verify(record: &FormulaRecord, fetched: &[u8]) -> std::result::Result<(), ChecksumMismatch> {
    let expected = record.checksum();
    let actual = expected.algorithm().digest(fetched);
    tracing::debug!(
        "Calculated {}: {} ({} bytes) for {}",
        expected.algorithm(),
        actual,
        fetched.len(),
        record.display_id()
    );
    tracing::debug!("Expected {}:   {}", expected.algorithm(), expected.digest());
    if expected.matches(&actual) {
        Ok(())
    } else {
        Err(ChecksumMismatch {
            expected: expected.digest().to_string(),
            actual,
        })
    }
}

/// Same as [`verify`] for an archive already on disk.
pub fn verify_file(record: &FormulaRecord, path: &Path) -> Result<()> {
    tracing::debug!("Verifying checksum for: {}", path.display());
    let mut reader = BufReader::new(File::open(path)?);
    let expected = record.checksum();
    let (actual, bytes_read) = expected.algorithm().digest_reader(&mut reader)?;
    tracing::debug!(
        "Calculated {}: {} ({} bytes read)",
        expected.algorithm(),
        actual,
        bytes_read
    );
    if expected.matches(&actual) {
        Ok(())
    } else {
        Err(ChecksumMismatch {
            expected: expected.digest().to_string(),
            actual,
        }
        .into())
    }
}

/// Validates a fetch URL: `https`, or `file` for local archives.
pub fn validate_url(url_str: &str) -> std::result::Result<Url, FetchError> {
    let url = Url::parse(url_str).map_err(|e| FetchError::InvalidUrl {
        url: url_str.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "https" | "file" => Ok(url),
        other => Err(FetchError::InvalidUrl {
            url: url_str.to_string(),
            reason: format!("scheme must be https or file, got '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pour_common::error::PourError;
    use pour_common::model::{Checksum, HashAlgorithm, InstallDirective};

    fn record_for(content: &[u8]) -> FormulaRecord {
        FormulaRecord::new(
            "instaunit",
            "https://github.com/instaunit/instaunit",
            "https://github.com/instaunit/instaunit/releases/download/v1.0.3/instaunit-v1.0.3-darwin-amd64.tgz",
            Checksum::of_bytes(HashAlgorithm::Sha256, content),
            None,
            InstallDirective::direct_copy("bin/instaunit", None).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn verify_accepts_matching_bytes() {
        let record = record_for(b"archive bytes");
        assert!(verify(&record, b"archive bytes").is_ok());
    }

    #[test]
    fn verify_rejects_corrupted_bytes() {
        let record = record_for(b"archive bytes");
        let err = verify(&record, b"archive bytez").unwrap_err();
        assert_eq!(err.expected, record.checksum().digest());
        assert_eq!(err.actual, HashAlgorithm::Sha256.digest(b"archive bytez"));
        assert_ne!(err.expected, err.actual);
    }

    #[test]
    fn verify_file_matches_verify() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tgz");
        std::fs::write(&path, b"archive bytes").unwrap();

        assert!(verify_file(&record_for(b"archive bytes"), &path).is_ok());
        let err = verify_file(&record_for(b"other"), &path).unwrap_err();
        assert!(matches!(err, PourError::ChecksumMismatch(_)));
    }

    #[test]
    fn url_schemes() {
        assert!(validate_url("https://example.com/a.tgz").is_ok());
        assert!(validate_url("file:///tmp/a.tgz").is_ok());
        assert!(validate_url("http://example.com/a.tgz").is_err());
        assert!(validate_url("nope").is_err());
    }
}
