// pour-common/src/declaration/mod.rs
//! Textual forms of a formula record.
//!
//! JSON is the canonical format, TOML is accepted and emitted as well, and
//! Homebrew-style Ruby formulae can be imported (read only).

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::{ParseError, Result};
use crate::model::directive::DEFAULT_PREFIX_ARG;
use crate::model::{Checksum, FormulaRecord, InstallDirective};

pub mod dsl;

pub use dsl::parse_formula_dsl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationFormat {
    Json,
    Toml,
    /// Ruby formula DSL (`class Foo < Formula ... end`).
    FormulaDsl,
}

impl DeclarationFormat {
    pub fn name(&self) -> &'static str {
        match self {
            DeclarationFormat::Json => "json",
            DeclarationFormat::Toml => "toml",
            DeclarationFormat::FormulaDsl => "formula-dsl",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Some(DeclarationFormat::Json),
            Some("toml") => Some(DeclarationFormat::Toml),
            Some("rb") => Some(DeclarationFormat::FormulaDsl),
            _ => None,
        }
    }
}

impl fmt::Display for DeclarationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unvalidated, serde-facing shape of a record. Every field defaults so that a
/// missing field is reported as a malformed field rather than a syntax error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaDeclaration {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub archive_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub checksum: ChecksumDeclaration,
    #[serde(default)]
    pub install_directive: DirectiveDeclaration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumDeclaration {
    #[serde(default)]
    pub algorithm: String,
    #[serde(default)]
    pub digest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveDeclaration {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_arg: Option<String>,
}

impl TryFrom<ChecksumDeclaration> for Checksum {
    type Error = ParseError;

    fn try_from(decl: ChecksumDeclaration) -> std::result::Result<Self, Self::Error> {
        let algorithm = decl.algorithm.parse()?;
        Checksum::new(algorithm, &decl.digest)
    }
}

impl TryFrom<DirectiveDeclaration> for InstallDirective {
    type Error = ParseError;

    fn try_from(decl: DirectiveDeclaration) -> std::result::Result<Self, Self::Error> {
        match decl.kind.as_str() {
            "direct_copy" => {
                let source = decl.source.ok_or_else(|| {
                    ParseError::malformed("install_directive", "direct_copy requires 'source'")
                })?;
                InstallDirective::direct_copy(source, decl.target_name)
            }
            "delegated_build" => {
                let program = decl.program.ok_or_else(|| {
                    ParseError::malformed(
                        "install_directive",
                        "delegated_build requires 'program'",
                    )
                })?;
                InstallDirective::delegated_build(
                    program,
                    decl.args.unwrap_or_default(),
                    decl.prefix_arg
                        .unwrap_or_else(|| DEFAULT_PREFIX_ARG.to_string()),
                )
            }
            "" => Err(ParseError::malformed(
                "install_directive",
                "missing install directive type",
            )),
            other => Err(ParseError::malformed(
                "install_directive",
                format!("unknown install directive type '{other}'"),
            )),
        }
    }
}

impl TryFrom<FormulaDeclaration> for FormulaRecord {
    type Error = ParseError;

    fn try_from(decl: FormulaDeclaration) -> std::result::Result<Self, Self::Error> {
        let checksum = Checksum::try_from(decl.checksum)?;
        let directive = InstallDirective::try_from(decl.install_directive)?;
        FormulaRecord::new(
            &decl.name,
            &decl.homepage,
            &decl.archive_url,
            checksum,
            decl.version.as_deref(),
            directive,
        )
    }
}

impl From<&InstallDirective> for DirectiveDeclaration {
    fn from(directive: &InstallDirective) -> Self {
        match directive {
            InstallDirective::DirectCopy {
                source,
                target_name,
            } => DirectiveDeclaration {
                kind: directive.kind().to_string(),
                source: Some(source.to_string_lossy().into_owned()),
                target_name: target_name.clone(),
                ..Default::default()
            },
            InstallDirective::DelegatedBuild {
                program,
                args,
                prefix_arg,
            } => DirectiveDeclaration {
                kind: directive.kind().to_string(),
                program: Some(program.clone()),
                args: Some(args.clone()),
                prefix_arg: Some(prefix_arg.clone()),
                ..Default::default()
            },
        }
    }
}

impl From<&FormulaRecord> for FormulaDeclaration {
    fn from(record: &FormulaRecord) -> Self {
        FormulaDeclaration {
            name: record.name().to_string(),
            homepage: record.homepage().to_string(),
            archive_url: record.archive_url().to_string(),
            version: record.version().map(str::to_string),
            checksum: ChecksumDeclaration {
                algorithm: record.checksum().algorithm().to_string(),
                digest: record.checksum().digest().to_string(),
            },
            install_directive: DirectiveDeclaration::from(record.install_directive()),
        }
    }
}

impl Serialize for FormulaRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        FormulaDeclaration::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FormulaRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let decl = FormulaDeclaration::deserialize(deserializer)?;
        FormulaRecord::try_from(decl).map_err(de::Error::custom)
    }
}

/// Parses and validates a declaration.
pub fn parse(raw: &str, format: DeclarationFormat) -> std::result::Result<FormulaRecord, ParseError> {
    let decl = match format {
        DeclarationFormat::Json => {
            serde_json::from_str::<FormulaDeclaration>(raw).map_err(|e| ParseError::Syntax {
                format: format.name(),
                message: e.to_string(),
            })?
        }
        DeclarationFormat::Toml => {
            toml::from_str::<FormulaDeclaration>(raw).map_err(|e| ParseError::Syntax {
                format: format.name(),
                message: e.to_string(),
            })?
        }
        DeclarationFormat::FormulaDsl => dsl::declaration_from_dsl(raw)?,
    };
    let record = FormulaRecord::try_from(decl)?;
    debug!("Parsed {} declaration for '{}'", format, record.display_id());
    Ok(record)
}

/// Renders a record. The formula DSL is import only.
pub fn serialize(
    record: &FormulaRecord,
    format: DeclarationFormat,
) -> std::result::Result<String, ParseError> {
    let decl = FormulaDeclaration::from(record);
    match format {
        DeclarationFormat::Json => {
            serde_json::to_string_pretty(&decl).map_err(|e| ParseError::Syntax {
                format: format.name(),
                message: e.to_string(),
            })
        }
        DeclarationFormat::Toml => toml::to_string(&decl).map_err(|e| ParseError::Syntax {
            format: format.name(),
            message: e.to_string(),
        }),
        DeclarationFormat::FormulaDsl => Err(ParseError::Syntax {
            format: format.name(),
            message: "the formula DSL can be read but not written".to_string(),
        }),
    }
}

/// Reads a declaration file, picking the format from its extension.
pub fn load_record(path: &Path) -> Result<FormulaRecord> {
    let format = DeclarationFormat::from_path(path).ok_or_else(|| ParseError::Syntax {
        format: "unknown",
        message: format!(
            "cannot determine declaration format of {} (expected .json, .toml or .rb)",
            path.display()
        ),
    })?;
    debug!("Loading {} declaration from {}", format, path.display());
    let raw = fs::read_to_string(path)?;
    Ok(parse(&raw, format)?)
}
