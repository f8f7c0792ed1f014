//! State module for tracking crawl progress
//!
//! This module provides the per-page state embedded in every crawl node.
//!
//! # Components
//!
//! - `PageStatus`: Lifecycle of a single page (new, downloading, ready, parsing, parsed, failed)
//! - `PageState`: Downloaded content plus the text and link matches found in it

mod page_state;
mod status;

// Re-export main types
pub use page_state::{PageState, Span};
pub use status::PageStatus;
