use crate::config::ExtractionConfig;
use std::collections::HashSet;

/// Extension classification of a candidate link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionClass {
    /// Last path segment has no extension; treated as a directory
    Directory,
    /// Extension is on the allow-list
    Allowed,
    /// Extension is a known non-text type
    Rejected,
    /// Extension is on neither list
    Unknown,
}

impl ExtensionClass {
    /// Returns true if links of this class are worth downloading
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Directory | Self::Allowed)
    }
}

/// Allow/deny lists applied to candidate links
#[derive(Debug, Clone)]
pub struct ExtensionPolicy {
    allowed: HashSet<String>,
    rejected: HashSet<String>,
}

impl ExtensionPolicy {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            allowed: config.allowed_extensions.iter().cloned().collect(),
            rejected: config.rejected_extensions.iter().cloned().collect(),
        }
    }

    /// Classifies an absolute URL by the extension of its last path segment
    ///
    /// This is a heuristic: anything after the first `?` or `#` is ignored,
    /// so `/view?file=a.pdf` counts as a directory while `/a.pdf?x=1` is
    /// rejected. A segment with a dot and an unlisted extension is rejected.
    pub fn classify(&self, url: &str) -> ExtensionClass {
        match extension_of(url) {
            None => ExtensionClass::Directory,
            Some(ext) if self.allowed.contains(&ext) => ExtensionClass::Allowed,
            Some(ext) if self.rejected.contains(&ext) => ExtensionClass::Rejected,
            Some(_) => ExtensionClass::Unknown,
        }
    }

    /// Shorthand for `classify(url).is_accepted()`
    pub fn accepts(&self, url: &str) -> bool {
        self.classify(url).is_accepted()
    }
}

impl Default for ExtensionPolicy {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

/// Lowercased extension of the last path segment, if any
fn extension_of(url: &str) -> Option<String> {
    let after_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };

    // Skip the authority; a URL without a path is a directory
    let path_start = after_scheme.find(['/', '?', '#'])?;
    let path = &after_scheme[path_start..];
    let path = match path.find(['?', '#']) {
        Some(idx) => &path[..idx],
        None => path,
    };

    let segment = path.rsplit('/').next().unwrap_or("");
    let dot = segment.rfind('.')?;
    Some(segment[dot + 1..].to_ascii_lowercase())
}
