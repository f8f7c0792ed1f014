//! Per-task execution environment
//!
//! A `WorkerContext` travels with every scheduled task. Cloning it is cheap:
//! the shared handles are reference counted and the transport is not copied,
//! so each clone lazily opens its own connection.

use crate::crawler::extract::Patterns;
use crate::crawler::transport::{Connector, Response, Transport};
use crate::output::Reporter;
use crate::tree::{CrawlNode, NodeArena, NodeId};
use crate::url::Endpoint;
use crate::TransportError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Closure queued on the worker pool
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Pipeline step run for one node
pub type TaskAction = fn(NodeId, &mut WorkerContext);

/// Scheduling handle bound to the orchestrator
pub trait TaskSpawner: Send + Sync {
    /// Queues `action` for `node`, or parks it while the crawl is suspended
    fn schedule_task(&self, action: TaskAction, node: NodeId, ctx: WorkerContext);

    /// Queues an arbitrary closure
    fn schedule_functor(&self, job: Job);

    /// Parks `action` for `node` until the crawl is next activated
    fn defer_task(&self, action: TaskAction, node: NodeId, ctx: WorkerContext);
}

/// Task descriptor captured instead of executed
pub struct LonelyTask {
    pub node: NodeId,
    pub action: TaskAction,
    pub ctx: WorkerContext,
}

impl LonelyTask {
    /// Turns the descriptor into a runnable closure
    pub fn into_job(self) -> Job {
        let LonelyTask {
            node,
            action,
            mut ctx,
        } = self;
        Box::new(move || action(node, &mut ctx))
    }
}

pub struct WorkerContext {
    arena: Arc<NodeArena>,
    patterns: Arc<Patterns>,
    reporter: Arc<dyn Reporter>,
    spawner: Arc<dyn TaskSpawner>,
    connector: Arc<dyn Connector>,
    running: Arc<AtomicBool>,
    max_redirects: u32,
    transport: Option<Box<dyn Transport>>,
    endpoint: Option<Endpoint>,
}

impl WorkerContext {
    pub fn new(
        arena: Arc<NodeArena>,
        patterns: Arc<Patterns>,
        reporter: Arc<dyn Reporter>,
        spawner: Arc<dyn TaskSpawner>,
        connector: Arc<dyn Connector>,
        running: Arc<AtomicBool>,
        max_redirects: u32,
    ) -> Self {
        Self {
            arena,
            patterns,
            reporter,
            spawner,
            connector,
            running,
            max_redirects,
            transport: None,
            endpoint: None,
        }
    }

    /// Replaces the shared handles with those of `template`
    ///
    /// The open connection, if any, is kept.
    pub fn rebind(&mut self, template: &WorkerContext) {
        self.arena = Arc::clone(&template.arena);
        self.patterns = Arc::clone(&template.patterns);
        self.reporter = Arc::clone(&template.reporter);
        self.spawner = Arc::clone(&template.spawner);
        self.connector = Arc::clone(&template.connector);
        self.running = Arc::clone(&template.running);
        self.max_redirects = template.max_redirects;
    }

    pub fn arena(&self) -> &Arc<NodeArena> {
        &self.arena
    }

    pub fn patterns(&self) -> &Patterns {
        &self.patterns
    }

    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Endpoint the transport is currently connected to
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Connects to the endpoint of `url`, reusing the open transport when
    /// the endpoint is unchanged
    pub fn connect(&mut self, url: &str) -> Result<Endpoint, TransportError> {
        let wanted = Endpoint::from_url(url).map_err(|e| TransportError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if self.transport.is_some() && self.endpoint.as_ref() == Some(&wanted) {
            return Ok(wanted);
        }

        let connector = &self.connector;
        let transport = self.transport.get_or_insert_with(|| connector.open());
        self.endpoint = None;
        let endpoint = transport.connect(url)?;
        self.endpoint = Some(endpoint.clone());
        Ok(endpoint)
    }

    pub fn get(&mut self, path: &str) -> Result<Response, TransportError> {
        self.transport
            .as_mut()
            .ok_or(TransportError::NotConnected)?
            .get(path)
    }

    pub fn on_page_parsed(&self, node: &CrawlNode) {
        self.reporter.on_page_parsed(node);
    }

    pub fn on_level_spawned(&self, node: &CrawlNode) {
        self.reporter.on_level_spawned(node);
    }

    pub fn on_max_links_reached(&self, node: &CrawlNode) {
        self.reporter.on_max_links_reached(node);
    }

    pub fn report_exception(&self, message: &str) {
        self.reporter.on_exception(message);
    }

    pub fn schedule_task(&self, action: TaskAction, node: NodeId) {
        self.spawner.schedule_task(action, node, self.clone());
    }

    pub fn schedule_functor(&self, job: Job) {
        self.spawner.schedule_functor(job);
    }

    pub fn defer(&self, action: TaskAction, node: NodeId) {
        self.spawner.defer_task(action, node, self.clone());
    }
}

impl Clone for WorkerContext {
    fn clone(&self) -> Self {
        Self::new(
            Arc::clone(&self.arena),
            Arc::clone(&self.patterns),
            Arc::clone(&self.reporter),
            Arc::clone(&self.spawner),
            Arc::clone(&self.connector),
            Arc::clone(&self.running),
            self.max_redirects,
        )
    }
}
