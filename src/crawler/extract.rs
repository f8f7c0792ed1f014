//! Compiled extraction patterns
//!
//! Text and link extraction is plain pattern matching over the raw page
//! bytes. There is no DOM: an `href` inside a comment or script counts the
//! same as one inside an anchor.

use crate::state::Span;
use crate::url::{normalized_key, resolve_link, Endpoint, ExtensionPolicy};
use crate::WebgrepError;
use regex::bytes::Regex;
use std::collections::HashSet;

/// Quoted `href` attribute; group 1 is the link text
const HREF_PATTERN: &str = r#"(?i)href\s*=\s*["']([^"'<>\s]*)["']"#;

/// Bare absolute http(s) URL in running text
const BARE_URL_PATTERN: &str = r#"(?i)https?://[^\s"'<>()]+"#;

/// Punctuation that ends a sentence rather than a bare URL
const TRAILING_PUNCTUATION: &[u8] = b".,;:!?";

/// Patterns compiled once per crawl and shared by every worker
#[derive(Debug, Clone)]
pub struct Patterns {
    text: Regex,
    href: Regex,
    bare: Regex,
    policy: ExtensionPolicy,
}

impl Patterns {
    /// Compiles the user pattern alongside the link patterns
    ///
    /// # Returns
    ///
    /// * `Ok(Patterns)` - Ready to use
    /// * `Err(WebgrepError)` - Empty or invalid user pattern
    pub fn new(pattern: &str, policy: ExtensionPolicy) -> Result<Self, WebgrepError> {
        if pattern.is_empty() {
            return Err(WebgrepError::EmptyPattern);
        }

        Ok(Self {
            text: Regex::new(pattern)?,
            href: Regex::new(HREF_PATTERN)?,
            bare: Regex::new(BARE_URL_PATTERN)?,
            policy,
        })
    }

    /// The user pattern as given
    pub fn text_pattern(&self) -> &str {
        self.text.as_str()
    }

    pub fn policy(&self) -> &ExtensionPolicy {
        &self.policy
    }

    /// All non-empty matches of the user pattern
    pub fn find_text(&self, content: &[u8]) -> Vec<Span> {
        self.text
            .find_iter(content)
            .filter(|m| m.start() < m.end())
            .map(|m| m.range())
            .collect()
    }

    /// Raw link candidates in document order, possibly overlapping
    pub fn find_link_candidates(&self, content: &[u8]) -> Vec<Span> {
        let mut spans: Vec<Span> = self
            .href
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .filter(|m| m.start() < m.end())
            .map(|m| m.range())
            .collect();

        for m in self.bare.find_iter(content) {
            let mut end = m.end();
            while end > m.start() && TRAILING_PUNCTUATION.contains(&content[end - 1]) {
                end -= 1;
            }
            spans.push(m.start()..end);
        }

        spans.sort_by_key(|span| span.start);
        spans
    }

    /// Link candidates worth crawling
    ///
    /// Candidates are resolved against `endpoint` and deduplicated by their
    /// normalized form, keeping the first occurrence. A candidate is dropped
    /// if its normalized form is in `excluded` (the page itself and its
    /// ancestors) or the extension policy rejects it.
    pub fn select_links(
        &self,
        content: &[u8],
        endpoint: &Endpoint,
        excluded: &HashSet<String>,
    ) -> Vec<Span> {
        let mut seen = HashSet::new();
        let mut accepted = Vec::new();

        for span in self.find_link_candidates(content) {
            let text = String::from_utf8_lossy(&content[span.clone()]);
            let Some(resolved) = resolve_link(endpoint, &text) else {
                continue;
            };
            let Some(key) = normalized_key(&resolved) else {
                continue;
            };

            if !seen.insert(key.clone()) {
                continue;
            }
            if excluded.contains(&key) {
                tracing::trace!("Skipping link back to {}", key);
                continue;
            }
            if !self.policy.accepts(&resolved) {
                tracing::trace!("Skipping {} by extension", resolved);
                continue;
            }

            accepted.push(span);
        }

        accepted
    }
}
