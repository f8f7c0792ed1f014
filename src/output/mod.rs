//! Output module for reporting crawl progress
//!
//! This module handles:
//! - The reporting collaborator interface invoked from worker threads
//! - User-settable callbacks and the tracing-backed default reporter
//! - Crawl statistics and the per-page listing over the task tree

mod log_reporter;
pub mod stats;
mod traits;

pub use log_reporter::LogReporter;
pub use stats::{collect_statistics, page_listing, print_statistics, CrawlStatistics, PageLine};
pub use traits::{Callbacks, ExceptionCallback, NodeCallback, Reporter};
