//! Reporting collaborator interface
//!
//! Every method is invoked from arbitrary worker threads. Implementations
//! must do their own thread-safe hand-off, e.g. posting to a UI event loop.

use crate::output::LogReporter;
use crate::tree::CrawlNode;
use parking_lot::RwLock;
use std::sync::Arc;

/// Receives crawl lifecycle notifications
pub trait Reporter: Send + Sync {
    /// A page finished extraction
    fn on_page_parsed(&self, node: &CrawlNode);

    /// A new row was spawned; `node` is its head
    fn on_level_spawned(&self, node: &CrawlNode);

    /// `node` was not descended into because the link budget is spent
    fn on_max_links_reached(&self, node: &CrawlNode);

    /// A failure that does not belong to a single page state
    fn on_exception(&self, message: &str);
}

pub type NodeCallback = Arc<dyn Fn(&CrawlNode) + Send + Sync>;
pub type ExceptionCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional user callbacks, each logged through `LogReporter` first
///
/// Callbacks can be replaced while a crawl is running; the new one takes
/// effect on the next notification.
#[derive(Default)]
pub struct Callbacks {
    log: LogReporter,
    page_parsed: RwLock<Option<NodeCallback>>,
    level_spawned: RwLock<Option<NodeCallback>>,
    max_links_reached: RwLock<Option<NodeCallback>>,
    exception: RwLock<Option<ExceptionCallback>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_on_page_parsed(&self, callback: Option<NodeCallback>) {
        *self.page_parsed.write() = callback;
    }

    pub fn set_on_level_spawned(&self, callback: Option<NodeCallback>) {
        *self.level_spawned.write() = callback;
    }

    pub fn set_on_max_links_reached(&self, callback: Option<NodeCallback>) {
        *self.max_links_reached.write() = callback;
    }

    pub fn set_on_exception(&self, callback: Option<ExceptionCallback>) {
        *self.exception.write() = callback;
    }
}

// The callback is cloned out so no lock is held while user code runs
fn notify(slot: &RwLock<Option<NodeCallback>>, node: &CrawlNode) {
    let callback = slot.read().clone();
    if let Some(callback) = callback {
        callback(node);
    }
}

impl Reporter for Callbacks {
    fn on_page_parsed(&self, node: &CrawlNode) {
        self.log.on_page_parsed(node);
        notify(&self.page_parsed, node);
    }

    fn on_level_spawned(&self, node: &CrawlNode) {
        self.log.on_level_spawned(node);
        notify(&self.level_spawned, node);
    }

    fn on_max_links_reached(&self, node: &CrawlNode) {
        self.log.on_max_links_reached(node);
        notify(&self.max_links_reached, node);
    }

    fn on_exception(&self, message: &str) {
        self.log.on_exception(message);
        let callback = self.exception.read().clone();
        if let Some(callback) = callback {
            callback(message);
        }
    }
}
