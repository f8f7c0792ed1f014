//! Webgrep: a recursive, multi-threaded web grep
//!
//! This crate downloads a seed page, matches a text pattern against it, extracts
//! outbound links and recursively schedules fetches of those links on a worker
//! pool until a shared link budget is exhausted.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod tree;
pub mod url;

use thiserror::Error;

/// Main error type for webgrep operations
#[derive(Debug, Error)]
pub enum WebgrepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Search pattern is empty")]
    EmptyPattern,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Task tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Errors raised by a transport collaborator
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Request for {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Failed to read body of {url}: {reason}")]
    Body { url: String, reason: String },

    #[error("Too many redirects starting from {url}")]
    TooManyRedirects { url: String },

    #[error("Redirect from {url} has no Location header")]
    MissingLocation { url: String },
}

/// Errors raised while growing or shrinking the task tree
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Failed to allocate a node slot (arena holds {0} slots)")]
    Allocation(usize),

    #[error("Node {0} is not present in the arena")]
    UnknownNode(tree::NodeId),

    #[error("Node {0} already owns a child level")]
    ChildExists(tree::NodeId),

    #[error("Node {0} has not been parsed yet")]
    NotParsed(tree::NodeId),

    #[error("Tree self test failed: {0}")]
    SelfTest(String),
}

/// Worker pool errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Worker pool needs at least one thread")]
    NoThreads,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Result type alias for webgrep operations
pub type Result<T> = std::result::Result<T, WebgrepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::CrawlOrchestrator;
pub use state::{PageState, PageStatus};
pub use tree::{CrawlNode, LinkBudget, NodeArena, NodeId};
