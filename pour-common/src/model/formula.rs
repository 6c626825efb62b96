// pour-common/src/model/formula.rs
// A formula record: one package release's fetch-and-install contract.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::checksum::Checksum;
use super::directive::InstallDirective;
use crate::error::ParseError;

const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar.gz", ".tar.bz2", ".tar.xz", ".tgz", ".tbz2", ".tbz", ".txz", ".tar", ".zip", ".gz",
];

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[-_./])v?(\d+(?:\.\d+)+(?:[-.]?(?:alpha|beta|rc)\.?\d*)?)").unwrap());

/// Immutable once built. A new release is a new record with the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormulaRecord {
    name: String,
    homepage: Url,
    archive_url: Url,
    checksum: Checksum,
    version: Option<String>,
    install_directive: InstallDirective,
}

impl FormulaRecord {
    pub fn new(
        name: &str,
        homepage: &str,
        archive_url: &str,
        checksum: Checksum,
        version: Option<&str>,
        install_directive: InstallDirective,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            name: validate_name(name)?,
            homepage: parse_url("homepage", homepage, &["http", "https"])?,
            // Plain http is well-formed; whether to fetch it is the fetcher's call.
            archive_url: parse_url("archive_url", archive_url, &["http", "https", "file"])?,
            checksum,
            version: validate_version(version)?,
            install_directive,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn homepage(&self) -> &Url {
        &self.homepage
    }

    pub fn archive_url(&self) -> &Url {
        &self.archive_url
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// The explicitly declared version, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn install_directive(&self) -> &InstallDirective {
        &self.install_directive
    }

    /// Declared version, else the one implied by the archive URL.
    pub fn effective_version(&self) -> Option<String> {
        self.version
            .clone()
            .or_else(|| infer_version_from_url(&self.name, &self.archive_url))
    }

    /// File name of the archive as it appears in the URL.
    pub fn archive_file_name(&self) -> String {
        self.archive_url
            .path_segments()
            .and_then(|mut segs| segs.next_back())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("{}-download", self.name))
    }

    /// `name@version`, or just the name when no version can be determined.
    pub fn display_id(&self) -> String {
        match self.effective_version() {
            Some(v) => format!("{}@{}", self.name, v),
            None => self.name.clone(),
        }
    }
}

fn validate_name(name: &str) -> Result<String, ParseError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ParseError::malformed("name", "name is empty"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '+' | '-')))
    {
        return Err(ParseError::malformed(
            "name",
            format!("invalid character '{bad}' in '{name}'"),
        ));
    }
    Ok(name.to_string())
}

fn validate_version(version: Option<&str>) -> Result<Option<String>, ParseError> {
    match version.map(str::trim) {
        None => Ok(None),
        Some("") => Err(ParseError::malformed("version", "version is empty")),
        Some(v) if v.chars().any(char::is_whitespace) => Err(ParseError::malformed(
            "version",
            format!("version '{v}' contains whitespace"),
        )),
        Some(v) => Ok(Some(v.to_string())),
    }
}

fn parse_url(field: &'static str, raw: &str, schemes: &[&str]) -> Result<Url, ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ParseError::malformed(field, "URL is empty"));
    }
    let url = Url::parse(raw)
        .map_err(|e| ParseError::malformed(field, format!("invalid URL '{raw}': {e}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(ParseError::malformed(
            field,
            format!(
                "unsupported scheme '{}' in '{raw}' (expected one of: {})",
                url.scheme(),
                schemes.join(", ")
            ),
        ));
    }
    if url.scheme() != "file" && url.host_str().map_or(true, str::is_empty) {
        return Err(ParseError::malformed(field, format!("URL '{raw}' has no host")));
    }
    Ok(url)
}

/// Looks for a dotted version in the archive file name, then in its parent
/// path segment (`.../download/1.1/tool-darwin.tgz`).
pub fn infer_version_from_url(name: &str, url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let (file, parents) = segments.split_last()?;

    let mut stem = *file;
    for suffix in ARCHIVE_SUFFIXES {
        if let Some(s) = stem.strip_suffix(suffix) {
            stem = s;
            break;
        }
    }
    let stem = stem
        .strip_prefix(name)
        .map(|s| s.trim_start_matches(['-', '_']))
        .unwrap_or(stem);

    if let Some(v) = first_version(stem) {
        return Some(v);
    }
    parents.last().and_then(|parent| first_version(parent))
}

fn first_version(s: &str) -> Option<String> {
    VERSION_RE
        .captures(s)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "c7c59ab63089fa07db7c45caab3d3b40a53c3ecb49de9c2613f19e78f5b3c1be";

    fn record(url: &str, version: Option<&str>) -> Result<FormulaRecord, ParseError> {
        FormulaRecord::new(
            "instaunit",
            "https://github.com/instaunit/instaunit",
            url,
            Checksum::sha256(DIGEST).unwrap(),
            version,
            InstallDirective::direct_copy("bin/instaunit", None).unwrap(),
        )
    }

    #[test]
    fn explicit_version_wins() {
        let r = record(
            "https://github.com/instaunit/instaunit/releases/download/1.1/instaunit-1.1-darwin-amd64.tgz",
            Some("1.1"),
        )
        .unwrap();
        assert_eq!(r.effective_version().as_deref(), Some("1.1"));
        assert_eq!(r.display_id(), "instaunit@1.1");
        assert_eq!(r.archive_file_name(), "instaunit-1.1-darwin-amd64.tgz");
    }

    #[test]
    fn version_inferred_from_file_name() {
        let r = record(
            "https://github.com/instaunit/instaunit/releases/download/v1.0.3/instaunit-v1.0.3-darwin-amd64.tgz",
            None,
        )
        .unwrap();
        assert_eq!(r.version(), None);
        assert_eq!(r.effective_version().as_deref(), Some("1.0.3"));
    }

    #[test]
    fn version_inferred_from_parent_segment() {
        let r = record(
            "https://example.com/releases/download/2.4/instaunit-darwin-amd64.tgz",
            None,
        )
        .unwrap();
        assert_eq!(r.effective_version().as_deref(), Some("2.4"));
    }

    #[test]
    fn no_version_anywhere() {
        let r = record("https://example.com/latest/instaunit.tgz", None).unwrap();
        assert_eq!(r.effective_version(), None);
        assert_eq!(r.display_id(), "instaunit");
    }

    #[test]
    fn accepts_plain_http_archive_url() {
        let r = record("http://mirror.example.com/instaunit-1.1.tgz", None).unwrap();
        assert_eq!(r.archive_url().scheme(), "http");
        assert_eq!(r.effective_version().as_deref(), Some("1.1"));
    }

    #[test]
    fn rejects_bad_urls_by_field() {
        let err = record("ftp://example.com/a.tgz", None).unwrap_err();
        assert_eq!(err.field(), Some("archive_url"));
        let err = record("not a url", None).unwrap_err();
        assert_eq!(err.field(), Some("archive_url"));

        let err = FormulaRecord::new(
            "instaunit",
            "github.com/instaunit",
            "https://example.com/a-1.0.tgz",
            Checksum::sha256(DIGEST).unwrap(),
            None,
            InstallDirective::make_install(),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("homepage"));
    }

    #[test]
    fn rejects_bad_name_and_version() {
        let make = |name: &str, version: Option<&str>| {
            FormulaRecord::new(
                name,
                "https://example.com",
                "https://example.com/a-1.0.tgz",
                Checksum::sha256(DIGEST).unwrap(),
                version,
                InstallDirective::make_install(),
            )
        };
        assert_eq!(make("", None).unwrap_err().field(), Some("name"));
        assert_eq!(make("a b", None).unwrap_err().field(), Some("name"));
        assert_eq!(make("ok", Some(" ")).unwrap_err().field(), Some("version"));
        assert_eq!(make("ok", Some("1 .0")).unwrap_err().field(), Some("version"));
        assert!(make("python@3.12", Some("3.12.1")).is_ok());
    }
}
