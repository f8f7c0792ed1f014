use super::PageStatus;
use std::borrow::Cow;
use std::ops::Range;

/// Byte range into `PageState::content`
pub type Span = Range<usize>;

/// Everything a node knows about its page
///
/// Match lists hold byte ranges into `content` rather than copies, so the
/// content buffer is never modified once the page is parsed.
#[derive(Debug, Clone, Default)]
pub struct PageState {
    /// Absolute URL; rewritten in place when a redirect is followed
    pub target_url: String,

    /// Last HTTP status code seen for this page (0 if never contacted)
    pub response_code: u16,

    /// Raw body bytes once downloaded
    pub content: Vec<u8>,

    /// Spans matching the user pattern
    pub text_matches: Vec<Span>,

    /// Spans of accepted outbound links, in page order
    pub link_matches: Vec<Span>,

    /// How many of `link_matches` the link budget allowed to be spawned
    pub links_granted: usize,

    pub status: PageStatus,
}

impl PageState {
    /// Creates a fresh state for the given URL
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            ..Self::default()
        }
    }

    /// Content has been downloaded
    pub fn page_ready(&self) -> bool {
        self.status.is_ready()
    }

    /// Extraction has completed
    pub fn page_parsed(&self) -> bool {
        self.status.is_parsed()
    }

    /// Returns the bytes covered by `span`, lossily decoded
    ///
    /// Out-of-range spans yield an empty string.
    pub fn span_str(&self, span: &Span) -> Cow<'_, str> {
        match self.content.get(span.clone()) {
            Some(bytes) => String::from_utf8_lossy(bytes),
            None => Cow::Borrowed(""),
        }
    }

    /// Text matches as strings, for reporting
    pub fn text_match_strs(&self) -> Vec<Cow<'_, str>> {
        self.text_matches.iter().map(|s| self.span_str(s)).collect()
    }

    /// Accepted link matches as strings, for reporting
    pub fn link_match_strs(&self) -> Vec<Cow<'_, str>> {
        self.link_matches.iter().map(|s| self.span_str(s)).collect()
    }

    /// Drops downloaded content and matches, keeping the URL
    pub fn reset(&mut self) {
        let url = std::mem::take(&mut self.target_url);
        *self = Self::new(url);
    }
}
