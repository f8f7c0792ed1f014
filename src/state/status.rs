/// Page status definitions for tracking crawl progress
///
/// A page moves through `New → Downloading → Ready → Parsing → Parsed`.
/// `Failed` is reached from `Downloading` on any transport failure or
/// unexpected status code.
use std::fmt;

/// Represents the current status of a page in the crawl pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageStatus {
    // ===== Active States =====
    /// Node exists but nothing has been fetched yet
    #[default]
    New,

    /// A worker is fetching the page
    Downloading,

    /// Content is downloaded but not yet matched
    Ready,

    /// Patterns are being run against the content
    Parsing,

    // ===== Terminal States =====
    /// Extraction completed
    Parsed,

    /// Transport failure or a status other than 200/301/302
    Failed,
}

impl PageStatus {
    /// Returns true once the page content has been downloaded
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready | Self::Parsing | Self::Parsed)
    }

    /// Returns true once extraction has completed
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed)
    }

    /// Returns true if no further processing is expected for this page
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Parsed | Self::Failed)
    }

    /// Returns true if a worker currently holds the page
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Downloading | Self::Parsing)
    }

    /// Short label used by the page listing
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Downloading => "downloading",
            Self::Ready => "ready",
            Self::Parsing => "parsing",
            Self::Parsed => "parsed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
