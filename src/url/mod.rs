//! URL handling module for webgrep
//!
//! This module provides endpoint extraction, link resolution, URL normalization
//! and the extension policy used to filter candidate links.

mod endpoint;
mod filter;
mod normalize;

// Re-export main functions
pub use endpoint::{request_path, resolve_link, Endpoint};
pub use filter::{ExtensionClass, ExtensionPolicy};
pub use normalize::{normalize_url, normalized_key};
