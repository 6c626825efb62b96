// pour-net/src/http.rs
use std::fs;

use pour_common::config::Config;
use pour_common::error::FetchError;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use tracing::{debug, error};
use url::Url;

use crate::validation::validate_url;

const USER_AGENT_STRING: &str = "pour formula installer (Rust)";
const MAX_REDIRECTS: usize = 10;
// Hosts that may see the GitHub API token.
const GITHUB_HOSTS: &[&str] = &["github.com", "api.github.com"];

/// Source of archive bytes. The install pipeline only needs "bytes in";
/// integrity is checked by the caller.
pub trait Fetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTPS fetcher with connect and overall timeouts. `file://` URLs are
/// read straight from disk.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    allow_plain_http: bool,
    github_token: Option<String>,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = build_http_client(config)?;
        Ok(Self {
            client,
            allow_plain_http: false,
            github_token: config.github_api_token.clone(),
        })
    }

    /// Permit `http://` URLs, e.g. for a mirror on a trusted local network.
    pub fn allow_plain_http(mut self, allow: bool) -> Self {
        self.allow_plain_http = allow;
        self
    }

    fn fetch_file(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let path = url.to_file_path().map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: "not a local file path".to_string(),
        })?;
        debug!("Reading local archive {}", path.display());
        fs::read(&path).map_err(|e| FetchError::Io {
            url: url.to_string(),
            source: e.into(),
        })
    }

    fn fetch_http(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        debug!("Attempting download from: {}", url);
        let mut request = self.client.get(url.clone());
        if let Some(token) = self.github_token.as_deref().filter(|_| is_github_host(url)) {
            debug!("Attaching GitHub token for {}", url.host_str().unwrap_or_default());
            request = request.bearer_auth(token);
        }
        let response = request.send().map_err(|e| {
            debug!("HTTP request failed for {url}: {e}");
            FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        debug!("Received HTTP status: {} for {}", status, url);
        if !status.is_success() {
            error!("HTTP error {} for URL {}", status, url);
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: format!("failed to read response body: {e}"),
        })?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        if self.allow_plain_http && url.scheme() == "http" {
            return self.fetch_http(url);
        }
        let url = validate_url(url.as_str())?;
        match url.scheme() {
            "file" => self.fetch_file(&url),
            _ => self.fetch_http(&url),
        }
    }
}

fn build_http_client(config: &Config) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(config.fetch_timeout)
        .connect_timeout(config.connect_timeout)
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(|e| FetchError::Transport {
            url: String::new(),
            message: format!("failed to build HTTP client: {e}"),
        })
}

fn is_github_host(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|host| GITHUB_HOSTS.iter().any(|gh| host.eq_ignore_ascii_case(gh)))
}
