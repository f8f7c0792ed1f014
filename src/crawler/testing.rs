//! In-memory collaborators for unit tests

use crate::crawler::context::{Job, TaskAction, TaskSpawner, WorkerContext};
use crate::crawler::extract::Patterns;
use crate::crawler::transport::{Connector, Response, Transport};
use crate::output::Reporter;
use crate::tree::{CrawlNode, LinkBudget, NodeArena, NodeId};
use crate::url::{Endpoint, ExtensionPolicy};
use crate::TransportError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Canned responses keyed by absolute URL; unknown URLs answer 404
#[derive(Default)]
pub struct MemoryConnector {
    pages: Arc<Mutex<HashMap<String, Response>>>,
    opened: AtomicUsize,
    connects: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.pages.lock().insert(url.to_string(), response);
    }

    pub fn page(&self, url: &str, status: u16, body: &str) {
        self.respond(url, Response::new(status, body));
    }

    pub fn redirect(&self, url: &str, status: u16, location: &str) {
        self.respond(url, Response::new(status, "").with_header("Location", location));
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    fn open(&self) -> Box<dyn Transport> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(MemoryTransport {
            pages: Arc::clone(&self.pages),
            connects: Arc::clone(&self.connects),
            endpoint: None,
        })
    }
}

struct MemoryTransport {
    pages: Arc<Mutex<HashMap<String, Response>>>,
    connects: Arc<AtomicUsize>,
    endpoint: Option<Endpoint>,
}

impl Transport for MemoryTransport {
    fn connect(&mut self, url: &str) -> Result<Endpoint, TransportError> {
        let endpoint = Endpoint::from_url(url).map_err(|e| TransportError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.endpoint = Some(endpoint.clone());
        Ok(endpoint)
    }

    fn get(&mut self, path: &str) -> Result<Response, TransportError> {
        let endpoint = self.endpoint.as_ref().ok_or(TransportError::NotConnected)?;
        let url = format!("{}{}", endpoint.base(), path);
        Ok(self
            .pages
            .lock()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| Response::new(404, "not found")))
    }
}

/// Records scheduling calls instead of running anything
#[derive(Default)]
pub struct RecordingSpawner {
    scheduled: Mutex<Vec<NodeId>>,
    deferred: Mutex<Vec<NodeId>>,
    functors: AtomicUsize,
}

impl RecordingSpawner {
    pub fn scheduled(&self) -> Vec<NodeId> {
        self.scheduled.lock().clone()
    }

    pub fn deferred(&self) -> Vec<NodeId> {
        self.deferred.lock().clone()
    }

    pub fn functors(&self) -> usize {
        self.functors.load(Ordering::SeqCst)
    }
}

impl TaskSpawner for RecordingSpawner {
    fn schedule_task(&self, _action: TaskAction, node: NodeId, _ctx: WorkerContext) {
        self.scheduled.lock().push(node);
    }

    fn schedule_functor(&self, _job: Job) {
        self.functors.fetch_add(1, Ordering::SeqCst);
    }

    fn defer_task(&self, _action: TaskAction, node: NodeId, _ctx: WorkerContext) {
        self.deferred.lock().push(node);
    }
}

/// Counts reporter callbacks
#[derive(Default)]
pub struct RecordingReporter {
    parsed: AtomicUsize,
    levels: AtomicUsize,
    max_links: AtomicUsize,
    exceptions: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn parsed(&self) -> usize {
        self.parsed.load(Ordering::SeqCst)
    }

    pub fn levels(&self) -> usize {
        self.levels.load(Ordering::SeqCst)
    }

    pub fn max_links(&self) -> usize {
        self.max_links.load(Ordering::SeqCst)
    }

    pub fn exceptions(&self) -> Vec<String> {
        self.exceptions.lock().clone()
    }
}

impl Reporter for RecordingReporter {
    fn on_page_parsed(&self, _node: &CrawlNode) {
        self.parsed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_level_spawned(&self, _node: &CrawlNode) {
        self.levels.fetch_add(1, Ordering::SeqCst);
    }

    fn on_max_links_reached(&self, _node: &CrawlNode) {
        self.max_links.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exception(&self, message: &str) {
        self.exceptions.lock().push(message.to_string());
    }
}

pub struct Harness {
    pub arena: Arc<NodeArena>,
    pub budget: Arc<LinkBudget>,
    pub connector: Arc<MemoryConnector>,
    pub reporter: Arc<RecordingReporter>,
    pub spawner: Arc<RecordingSpawner>,
    pub running: Arc<AtomicBool>,
    pub ctx: WorkerContext,
}

/// Context over a fresh arena, wired to recording collaborators
pub fn harness(pattern: &str, max_links: usize) -> Harness {
    let arena = Arc::new(NodeArena::new());
    let connector = Arc::new(MemoryConnector::new());
    let reporter = Arc::new(RecordingReporter::default());
    let spawner = Arc::new(RecordingSpawner::default());
    let running = Arc::new(AtomicBool::new(true));
    let patterns = Patterns::new(pattern, ExtensionPolicy::default()).unwrap();

    let ctx = WorkerContext::new(
        Arc::clone(&arena),
        Arc::new(patterns),
        reporter.clone(),
        spawner.clone(),
        connector.clone(),
        Arc::clone(&running),
        5,
    );

    Harness {
        arena,
        budget: Arc::new(LinkBudget::new(max_links)),
        connector,
        reporter,
        spawner,
        running,
        ctx,
    }
}

pub fn test_context(
    connector: Arc<MemoryConnector>,
    spawner: Arc<dyn TaskSpawner>,
) -> WorkerContext {
    let patterns = Patterns::new("x", ExtensionPolicy::default()).unwrap();
    WorkerContext::new(
        Arc::new(NodeArena::new()),
        Arc::new(patterns),
        Arc::new(RecordingReporter::default()),
        spawner,
        connector,
        Arc::new(AtomicBool::new(true)),
        5,
    )
}
