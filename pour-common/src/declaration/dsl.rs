// pour-common/src/declaration/dsl.rs
// Import of Homebrew-style Ruby formulae.
//
// Only the subset a binary-release formula uses is understood: the class
// header, string stanzas and a `def install` body built from `system` calls or
// `bin.install`. Anything else inside `install` is rejected rather than guessed at.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{ChecksumDeclaration, DirectiveDeclaration, FormulaDeclaration};
use crate::error::ParseError;
use crate::model::FormulaRecord;

static CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*class\s+([A-Z][A-Za-z0-9_]*)\s*<\s*Formula\b").unwrap());
static STANZA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*([a-z0-9_]+)\s*\(?\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).unwrap());
static PREFIX_ASSIGN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_-]*)=#\{prefix\}$").unwrap());
static BIN_TARGET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#\{bin\}/([^/]+)$").unwrap());

/// Parses a Ruby formula into a validated record.
pub fn parse_formula_dsl(raw: &str) -> Result<FormulaRecord, ParseError> {
    FormulaRecord::try_from(declaration_from_dsl(raw)?)
}

pub(crate) fn declaration_from_dsl(raw: &str) -> Result<FormulaDeclaration, ParseError> {
    let mut decl = FormulaDeclaration::default();
    let mut class_name: Option<String> = None;
    let mut install_body: Option<Vec<String>> = None;
    let mut in_install = false;

    for line in raw.lines() {
        let trimmed = strip_comment(line).trim();
        if trimmed.is_empty() {
            continue;
        }

        if in_install {
            if trimmed == "end" {
                in_install = false;
            } else if let Some(body) = install_body.as_mut() {
                body.push(trimmed.to_string());
            }
            continue;
        }

        if let Some(caps) = CLASS_RE.captures(trimmed) {
            class_name = Some(caps[1].to_string());
            continue;
        }
        if trimmed == "def install" || trimmed == "def install()" {
            if install_body.is_some() {
                return Err(ParseError::malformed(
                    "install_directive",
                    "install is defined more than once",
                ));
            }
            install_body = Some(Vec::new());
            in_install = true;
            continue;
        }
        if let Some(caps) = STANZA_RE.captures(trimmed) {
            let value = unescape(&caps[2]);
            match &caps[1] {
                "homepage" => decl.homepage = value,
                "url" => decl.archive_url = value,
                "version" => decl.version = Some(value),
                algorithm @ ("sha256" | "sha512") => {
                    if !decl.checksum.algorithm.is_empty() {
                        return Err(ParseError::malformed(
                            "checksum",
                            "more than one checksum declared",
                        ));
                    }
                    decl.checksum = ChecksumDeclaration {
                        algorithm: algorithm.to_string(),
                        digest: value,
                    };
                }
                other => debug!("Ignoring formula stanza '{}'", other),
            }
        }
    }

    if in_install {
        return Err(ParseError::Syntax {
            format: "formula-dsl",
            message: "unterminated 'def install' block".to_string(),
        });
    }

    decl.name = class_name
        .map(|c| class_to_formula_name(&c))
        .ok_or_else(|| ParseError::malformed("name", "no 'class <Name> < Formula' header"))?;

    if decl.checksum.algorithm.is_empty() {
        return Err(ParseError::malformed("checksum", "no sha256 or sha512 stanza"));
    }

    if decl.archive_url.contains("#{version}") {
        let version = decl.version.clone().ok_or_else(|| {
            ParseError::malformed(
                "archive_url",
                "URL interpolates #{version} but no version is declared",
            )
        })?;
        decl.archive_url = decl.archive_url.replace("#{version}", &version);
    }

    let body = install_body.ok_or_else(|| {
        ParseError::malformed("install_directive", "no 'def install' block")
    })?;
    decl.install_directive = directive_from_install_body(&body)?;
    Ok(decl)
}

fn directive_from_install_body(body: &[String]) -> Result<DirectiveDeclaration, ParseError> {
    let mut found: Option<DirectiveDeclaration> = None;

    for stmt in body {
        let step = if let Some(rest) = stmt.strip_prefix("bin.install") {
            let args = quoted_args(rest);
            bin_install_step(&args, stmt)?
        } else if let Some(rest) = stmt.strip_prefix("system") {
            let args = quoted_args(rest);
            system_step(&args, stmt)?
        } else {
            return Err(ParseError::malformed(
                "install_directive",
                format!("unsupported install statement '{stmt}'"),
            ));
        };

        if let Some(step) = step {
            if found.is_some() {
                return Err(ParseError::malformed(
                    "install_directive",
                    "more than one install step; a record carries exactly one directive",
                ));
            }
            found = Some(step);
        }
    }

    found.ok_or_else(|| ParseError::malformed("install_directive", "install block is empty"))
}

// `bin.install "src"` or `bin.install "src" => "name"`
fn bin_install_step(
    args: &[String],
    stmt: &str,
) -> Result<Option<DirectiveDeclaration>, ParseError> {
    match args {
        [source] => Ok(Some(copy_step(source, None))),
        [source, target] => Ok(Some(copy_step(source, Some(target.clone())))),
        _ => Err(ParseError::malformed(
            "install_directive",
            format!("cannot read bin.install arguments in '{stmt}'"),
        )),
    }
}

fn system_step(args: &[String], stmt: &str) -> Result<Option<DirectiveDeclaration>, ParseError> {
    let Some((program, rest)) = args.split_first() else {
        return Err(ParseError::malformed(
            "install_directive",
            format!("system call without a command in '{stmt}'"),
        ));
    };

    if program == "install" {
        // `install -d #{bin}` only prepares the directory, which a copy does anyway.
        if rest.iter().any(|a| a == "-d") {
            return Ok(None);
        }
        let mut operands = Vec::new();
        let mut iter = rest.iter();
        while let Some(arg) = iter.next() {
            if arg == "-m" {
                iter.next();
            } else if !arg.starts_with('-') {
                operands.push(arg.clone());
            }
        }
        let [source, target] = operands.as_slice() else {
            return Err(ParseError::malformed(
                "install_directive",
                format!("expected 'install <source> #{{bin}}/<name>' in '{stmt}'"),
            ));
        };
        let target_name = BIN_TARGET_RE
            .captures(target)
            .map(|c| c[1].to_string())
            .or_else(|| (target == "#{bin}").then(String::new))
            .ok_or_else(|| {
                ParseError::malformed(
                    "install_directive",
                    format!("install target '{target}' is not under #{{bin}}"),
                )
            })?;
        let target_name = (!target_name.is_empty()).then_some(target_name);
        return Ok(Some(copy_step(source, target_name)));
    }

    let mut prefix_arg = None;
    let mut plain_args = Vec::new();
    for arg in rest {
        if let Some(caps) = PREFIX_ASSIGN_RE.captures(arg) {
            prefix_arg = Some(caps[1].to_string());
        } else if arg.contains("#{") {
            return Err(ParseError::malformed(
                "install_directive",
                format!("unsupported interpolation in argument '{arg}'"),
            ));
        } else {
            plain_args.push(arg.clone());
        }
    }
    let prefix_arg = prefix_arg.ok_or_else(|| {
        ParseError::malformed(
            "install_directive",
            format!("'{program}' does not receive the destination prefix"),
        )
    })?;

    Ok(Some(DirectiveDeclaration {
        kind: "delegated_build".to_string(),
        program: Some(program.clone()),
        args: Some(plain_args),
        prefix_arg: Some(prefix_arg),
        ..Default::default()
    }))
}

fn copy_step(source: &str, target_name: Option<String>) -> DirectiveDeclaration {
    let default_name = source.rsplit('/').next().unwrap_or(source);
    DirectiveDeclaration {
        kind: "direct_copy".to_string(),
        source: Some(source.to_string()),
        target_name: target_name.filter(|t| t != default_name),
        ..Default::default()
    }
}

fn quoted_args(s: &str) -> Vec<String> {
    QUOTED_RE
        .captures_iter(s)
        .map(|c| unescape(&c[1]))
        .collect()
}

fn unescape(s: &str) -> String {
    s.replace("\\\"", "\"").replace("\\\\", "\\")
}

fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut prev = '\0';
    for (i, c) in line.char_indices() {
        match c {
            '"' if prev != '\\' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
        prev = c;
    }
    line
}

/// `FooBar` -> `foo-bar`.
fn class_to_formula_name(class: &str) -> String {
    let mut out = String::with_capacity(class.len() + 4);
    for (i, c) in class.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HashAlgorithm, InstallDirective};

    const INSTAUNIT_RB: &str = r##"
class Instaunit < Formula
  homepage "https://github.com/instaunit/instaunit"
  url "https://github.com/instaunit/instaunit/releases/download/1.1/instaunit-1.1-darwin-amd64.tgz"
  sha256 "c7c59ab63089fa07db7c45caab3d3b40a53c3ecb49de9c2613f19e78f5b3c1be"
  version "1.1"

  def install
    system "install", "-d", "#{bin}"
    system "install", "-m", "0755", "bin/instaunit", "#{bin}/instaunit"
  end
end
"##;

    #[test]
    fn reads_binary_release_formula() {
        let record = parse_formula_dsl(INSTAUNIT_RB).unwrap();
        assert_eq!(record.name(), "instaunit");
        assert_eq!(record.version(), Some("1.1"));
        assert_eq!(record.checksum().algorithm(), HashAlgorithm::Sha256);
        assert_eq!(
            record.install_directive(),
            &InstallDirective::direct_copy("bin/instaunit", None).unwrap()
        );
    }

    #[test]
    fn reads_delegated_make_install() {
        let raw = r##"
class Instaunit < Formula
  homepage "https://github.com/instaunit/instaunit"
  url "https://github.com/instaunit/instaunit/archive/v#{version}.tar.gz"
  version "1.0.3"
  sha256 "ad42ac11bd2d9f1a7a2d8b0f79f1f2ad2f6da0d8bbd3b8de1f3f9b0c0a8e02ce"

  def install
    system "make", "install", "PREFIX=#{prefix}" # delegated
  end
end
"##;
        let record = parse_formula_dsl(raw).unwrap();
        assert_eq!(record.install_directive(), &InstallDirective::make_install());
        assert_eq!(
            record.archive_url().as_str(),
            "https://github.com/instaunit/instaunit/archive/v1.0.3.tar.gz"
        );
    }

    #[test]
    fn bin_install_with_rename() {
        let raw = r#"
class FooBar < Formula
  homepage "https://example.com"
  url "https://example.com/foo-bar-2.0.tgz"
  sha256 "ad42ac11bd2d9f1a7a2d8b0f79f1f2ad2f6da0d8bbd3b8de1f3f9b0c0a8e02ce"
  def install
    bin.install "dist/foo" => "foo-bar"
  end
end
"#;
        let record = parse_formula_dsl(raw).unwrap();
        assert_eq!(record.name(), "foo-bar");
        assert_eq!(record.effective_version().as_deref(), Some("2.0"));
        assert_eq!(
            record.install_directive().binary_name().as_deref(),
            Some("foo-bar")
        );
    }

    #[test]
    fn irregular_checksum_length_is_rejected() {
        let raw = INSTAUNIT_RB.replace(
            "c7c59ab63089fa07db7c45caab3d3b40a53c3ecb49de9c2613f19e78f5b3c1be",
            "c7c59ab63089fa07db7c45caab3d3b40a53c3ecb49de9c2613f19e78f5b3c1beef",
        );
        let err = parse_formula_dsl(&raw).unwrap_err();
        assert_eq!(err.field(), Some("checksum"));
    }

    #[test]
    fn unknown_install_statement_is_rejected() {
        let raw = INSTAUNIT_RB.replace(
            r##"system "install", "-d", "#{bin}""##,
            r#"prefix.install Dir["*"]"#,
        );
        let err = parse_formula_dsl(&raw).unwrap_err();
        assert_eq!(err.field(), Some("install_directive"));
    }

    #[test]
    fn two_copy_steps_are_rejected() {
        let raw = INSTAUNIT_RB.replace(
            r##"system "install", "-d", "#{bin}""##,
            r#"bin.install "bin/other""#,
        );
        let err = parse_formula_dsl(&raw).unwrap_err();
        assert_eq!(err.field(), Some("install_directive"));
    }

    #[test]
    fn missing_pieces_are_named() {
        let no_class = INSTAUNIT_RB.replace("class Instaunit < Formula", "");
        assert_eq!(parse_formula_dsl(&no_class).unwrap_err().field(), Some("name"));

        let no_sum = INSTAUNIT_RB.replace(
            "sha256 \"c7c59ab63089fa07db7c45caab3d3b40a53c3ecb49de9c2613f19e78f5b3c1be\"",
            "",
        );
        assert_eq!(parse_formula_dsl(&no_sum).unwrap_err().field(), Some("checksum"));
    }

    #[test]
    fn class_names_become_kebab_case() {
        assert_eq!(class_to_formula_name("Instaunit"), "instaunit");
        assert_eq!(class_to_formula_name("GitLfs"), "git-lfs");
    }
}
