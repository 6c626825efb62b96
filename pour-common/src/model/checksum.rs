// pour-common/src/model/checksum.rs
use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::error::ParseError;

/// Digest algorithm a formula declares for its archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Length of a digest in hex characters.
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha512 => 128,
        }
    }

    pub fn digest(&self, bytes: &[u8]) -> String {
        match self {
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
            HashAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
        }
    }

    /// Hashes everything `reader` yields. Returns the hex digest and the byte count.
    pub fn digest_reader<R: Read>(&self, reader: &mut R) -> io::Result<(String, u64)> {
        match self {
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                let n = io::copy(reader, &mut hasher)?;
                Ok((hex::encode(hasher.finalize()), n))
            }
            HashAlgorithm::Sha512 => {
                let mut hasher = Sha512::new();
                let n = io::copy(reader, &mut hasher)?;
                Ok((hex::encode(hasher.finalize()), n))
            }
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            "" => Err(ParseError::malformed(
                "checksum",
                "hash algorithm must be declared explicitly",
            )),
            other => Err(ParseError::malformed(
                "checksum",
                format!("unsupported hash algorithm '{other}'"),
            )),
        }
    }
}

/// A declared content digest. The digest is stored as lowercase hex and always
/// matches the algorithm's length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    algorithm: HashAlgorithm,
    digest: String,
}

impl Checksum {
    pub fn new(algorithm: HashAlgorithm, digest: &str) -> Result<Self, ParseError> {
        let digest = digest.trim();
        if digest.is_empty() {
            return Err(ParseError::malformed("checksum", "digest is empty"));
        }
        if let Some(bad) = digest.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ParseError::malformed(
                "checksum",
                format!("digest contains non-hex character '{bad}'"),
            ));
        }
        if digest.len() != algorithm.hex_len() {
            return Err(ParseError::malformed(
                "checksum",
                format!(
                    "{} digest must be {} hex characters, got {}",
                    algorithm,
                    algorithm.hex_len(),
                    digest.len()
                ),
            ));
        }
        Ok(Self {
            algorithm,
            digest: digest.to_ascii_lowercase(),
        })
    }

    pub fn sha256(digest: &str) -> Result<Self, ParseError> {
        Self::new(HashAlgorithm::Sha256, digest)
    }

    /// Digest of `bytes` under `algorithm`; always well-formed.
    pub fn of_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            digest: algorithm.digest(bytes),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn matches(&self, actual_hex: &str) -> bool {
        self.digest.eq_ignore_ascii_case(actual_hex)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}
