// pour-common/src/model/directive.rs
use std::path::{Component, Path, PathBuf};

use crate::error::ParseError;

pub const DEFAULT_PREFIX_ARG: &str = "PREFIX";

/// How a formula places its files under a destination prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstallDirective {
    /// Copy one executable from the unpacked archive into `<prefix>/bin`.
    DirectCopy {
        /// Path relative to the unpacked archive root.
        source: PathBuf,
        /// File name under `bin`; defaults to the source's file name.
        target_name: Option<String>,
    },
    /// Run an external build-and-install procedure inside the unpacked archive,
    /// passing the destination as `<prefix_arg>=<prefix>`.
    DelegatedBuild {
        program: String,
        args: Vec<String>,
        prefix_arg: String,
    },
}

impl InstallDirective {
    pub fn direct_copy(
        source: impl Into<PathBuf>,
        target_name: Option<String>,
    ) -> Result<Self, ParseError> {
        let source = source.into();
        validate_relative(&source)?;
        let target_name = match target_name {
            Some(name) => Some(validate_file_name(&name)?),
            None => None,
        };
        if target_name.is_none() && source.file_name().is_none() {
            return Err(ParseError::malformed(
                "install_directive",
                format!("source '{}' has no file name", source.display()),
            ));
        }
        Ok(InstallDirective::DirectCopy {
            source,
            target_name,
        })
    }

    pub fn delegated_build(
        program: impl Into<String>,
        args: Vec<String>,
        prefix_arg: impl Into<String>,
    ) -> Result<Self, ParseError> {
        let program = program.into();
        let prefix_arg = prefix_arg.into();
        if program.trim().is_empty() {
            return Err(ParseError::malformed(
                "install_directive",
                "delegated build program is empty",
            ));
        }
        if prefix_arg.is_empty()
            || !prefix_arg
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ParseError::malformed(
                "install_directive",
                format!("invalid prefix argument name '{prefix_arg}'"),
            ));
        }
        Ok(InstallDirective::DelegatedBuild {
            program,
            args,
            prefix_arg,
        })
    }

    /// `make install PREFIX=<prefix>`.
    pub fn make_install() -> Self {
        InstallDirective::DelegatedBuild {
            program: "make".to_string(),
            args: vec!["install".to_string()],
            prefix_arg: DEFAULT_PREFIX_ARG.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InstallDirective::DirectCopy { .. } => "direct_copy",
            InstallDirective::DelegatedBuild { .. } => "delegated_build",
        }
    }

    /// The file name a DirectCopy lands under in the bin directory.
    pub fn binary_name(&self) -> Option<String> {
        match self {
            InstallDirective::DirectCopy {
                source,
                target_name,
            } => target_name.clone().or_else(|| {
                source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            }),
            InstallDirective::DelegatedBuild { .. } => None,
        }
    }
}

fn validate_relative(source: &Path) -> Result<(), ParseError> {
    if source.as_os_str().is_empty() {
        return Err(ParseError::malformed("install_directive", "source is empty"));
    }
    for comp in source.components() {
        match comp {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(ParseError::malformed(
                    "install_directive",
                    format!("source '{}' escapes the archive root", source.display()),
                ))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ParseError::malformed(
                    "install_directive",
                    format!("source '{}' must be relative", source.display()),
                ))
            }
        }
    }
    Ok(())
}

fn validate_file_name(name: &str) -> Result<String, ParseError> {
    let name = name.trim();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ParseError::malformed(
            "install_directive",
            format!("target name '{name}' is not a plain file name"),
        ));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_copy_defaults_binary_name_to_source_file() {
        let d = InstallDirective::direct_copy("bin/instaunit", None).unwrap();
        assert_eq!(d.binary_name().as_deref(), Some("instaunit"));
        assert_eq!(d.kind(), "direct_copy");

        let d = InstallDirective::direct_copy("bin/instaunit", Some("iu".into())).unwrap();
        assert_eq!(d.binary_name().as_deref(), Some("iu"));
    }

    #[test]
    fn direct_copy_source_must_stay_inside_archive() {
        for bad in ["", "/usr/bin/ls", "../outside", "bin/../../x"] {
            let err = InstallDirective::direct_copy(bad, None).unwrap_err();
            assert_eq!(err.field(), Some("install_directive"), "{bad}");
        }
    }

    #[test]
    fn target_name_must_be_plain() {
        assert!(InstallDirective::direct_copy("bin/a", Some("x/y".into())).is_err());
        assert!(InstallDirective::direct_copy("bin/a", Some("..".into())).is_err());
    }

    #[test]
    fn delegated_build_validation() {
        assert!(InstallDirective::delegated_build("", vec![], "PREFIX").is_err());
        assert!(InstallDirective::delegated_build("make", vec![], "PRE FIX").is_err());
        assert_eq!(
            InstallDirective::delegated_build("make", vec!["install".into()], "PREFIX").unwrap(),
            InstallDirective::make_install()
        );
    }
}
