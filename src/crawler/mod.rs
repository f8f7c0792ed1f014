//! Crawler module for page fetching and recursive grep
//!
//! This module contains the core crawling logic, including:
//! - Transports that fetch one page over HTTP
//! - Text and link extraction
//! - The per-node download and grep pipeline
//! - The worker pool and the orchestrator driving it

mod context;
mod coordinator;
mod extract;
mod pipeline;
mod scheduler;
#[cfg(test)]
mod testing;
mod transport;

pub use context::{Job, LonelyTask, TaskAction, TaskSpawner, WorkerContext};
pub use coordinator::CrawlOrchestrator;
pub use extract::Patterns;
pub use pipeline::{download_grep_recursive, download_one, grep_one};
pub use scheduler::{ActivityTracker, PanicHook, SubmitPolicy, TaskScheduler};
pub use transport::{
    build_http_client, Connector, HttpConnector, HttpTransport, Response, Transport,
};
