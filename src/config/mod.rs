//! Configuration module for webgrep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every field has a default, so a missing file section falls back to the values
//! the crawler would use without any configuration at all.
//!
//! # Example
//!
//! ```no_run
//! use webgrep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("webgrep.toml")).unwrap();
//! println!("Crawler will follow at most {} links", config.crawler.max_links);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, ExtractionConfig, HttpConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::{validate, MAX_REDIRECTS, MAX_THREADS};
