use crate::{UrlError, UrlResult};
use url::Url;

/// Scheme plus `host[:port]` of a page, the unit a transport connects to
///
/// The port is only part of `host_port` when the URL spells out a
/// non-default one, so `http://example.com:80/` and `http://example.com/`
/// share an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    scheme: String,
    host_port: String,
}

impl Endpoint {
    /// Extracts the endpoint of an absolute http(s) URL
    ///
    /// # Examples
    ///
    /// ```
    /// use webgrep::url::Endpoint;
    ///
    /// let ep = Endpoint::from_url("https://Example.com:8443/a?b=c").unwrap();
    /// assert_eq!(ep.host_port(), "example.com:8443");
    /// assert_eq!(ep.base(), "https://example.com:8443");
    /// ```
    pub fn from_url(url_str: &str) -> UrlResult<Self> {
        let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UrlError::InvalidScheme(url.scheme().to_string()));
        }

        let host = url
            .host_str()
            .ok_or_else(|| UrlError::MissingHost(url_str.to_string()))?;

        let host_port = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            scheme: url.scheme().to_string(),
            host_port,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host_port(&self) -> &str {
        &self.host_port
    }

    /// `scheme://host[:port]` without a trailing slash
    pub fn base(&self) -> String {
        format!("{}://{}", self.scheme, self.host_port)
    }
}

/// Returns the request target (path plus query) of an absolute URL
pub fn request_path(url_str: &str) -> UrlResult<String> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    Ok(match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    })
}

/// Prefixes of link texts that never point at a crawlable page
const SKIPPED_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:", "data:"];

/// Resolves a matched link text against the page endpoint
///
/// Texts starting with `http://` or `https://` are used as-is.
/// Protocol-relative `//host/x` texts take the page scheme. Everything else
/// is treated as a path under the endpoint root, so `a/b.html` and
/// `/a/b.html` resolve to the same URL whatever the page path was.
///
/// # Returns
///
/// * `Some(String)` - Absolute URL
/// * `None` - Empty text, fragment-only, non-http scheme, or a pseudo link
pub fn resolve_link(endpoint: &Endpoint, text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let lower = text.to_ascii_lowercase();
    if SKIPPED_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return None;
    }

    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(text.to_string());
    }

    if text.starts_with("//") {
        return Some(format!("{}:{}", endpoint.scheme, text));
    }

    // Some other scheme, e.g. ftp://
    if lower.contains("://") {
        return None;
    }

    let mut relative = text;
    while let Some(rest) = relative.strip_prefix("./") {
        relative = rest;
    }
    let relative = relative.trim_start_matches('/');

    Some(format!("{}/{}", endpoint.base(), relative))
}
