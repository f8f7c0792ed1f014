use serde::Deserialize;

/// Main configuration structure for webgrep
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// Crawl engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Link budget shared by every page of one crawl
    #[serde(rename = "max-links")]
    pub max_links: usize,

    /// Number of worker threads
    pub threads: usize,

    /// Maximum number of 301/302 hops followed for one page
    #[serde(rename = "max-redirects")]
    pub max_redirects: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_links: 4096,
            threads: 4,
            max_redirects: 5,
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("webgrep/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Link extension policy
///
/// A candidate link without an extension is treated as a directory and accepted.
/// A link with an extension is accepted only when the extension is allowed;
/// everything else, including unknown extensions, is rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Extensions of pages worth downloading (lowercase, no dot)
    #[serde(rename = "allowed-extensions")]
    pub allowed_extensions: Vec<String>,

    /// Known non-text extensions (lowercase, no dot)
    #[serde(rename = "rejected-extensions")]
    pub rejected_extensions: Vec<String>,
}

const DEFAULT_ALLOWED: &[&str] = &[
    "html", "htm", "shtml", "xhtml", "php", "jsp", "asp", "aspx", "py", "rb", "pl", "cgi", "txt",
];

const DEFAULT_REJECTED: &[&str] = &[
    "js", "css", "jpg", "jpeg", "png", "gif", "svg", "ico", "bmp", "webp", "mp3", "mp4", "avi",
    "mov", "wmv", "flv", "pdf", "zip", "gz", "tar", "rar", "7z", "exe", "woff", "woff2", "ttf",
];

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_ALLOWED.iter().map(|s| s.to_string()).collect(),
            rejected_extensions: DEFAULT_REJECTED.iter().map(|s| s.to_string()).collect(),
        }
    }
}
