//! Crawl orchestration
//!
//! The orchestrator owns the task tree, the link budget and the worker pool.
//! It starts, suspends and resumes crawls, resizes the pool, and holds on to
//! work that was produced while the crawl was suspended ("lonely" work) so a
//! later start can pick up where the previous one stopped.

use crate::config::{Config, MAX_THREADS};
use crate::crawler::context::{Job, LonelyTask, TaskAction, TaskSpawner, WorkerContext};
use crate::crawler::extract::Patterns;
use crate::crawler::pipeline::download_grep_recursive;
use crate::crawler::scheduler::{ActivityTracker, PanicHook, SubmitPolicy, TaskScheduler};
use crate::crawler::transport::Connector;
use crate::output::{
    collect_statistics, page_listing, Callbacks, CrawlStatistics, PageLine, Reporter,
};
use crate::tree::{CrawlNode, LinkBudget, NodeArena, NodeId};
use crate::url::{normalize_url, ExtensionPolicy};
use crate::{ConfigError, SchedulerError, WebgrepError};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Parameters of the crawl currently held in the tree
struct Session {
    url: String,
    pattern: String,
    patterns: Arc<Patterns>,
    started_at: DateTime<Utc>,
}

/// Work captured while the crawl was suspended
#[derive(Default)]
struct Lonely {
    tasks: Vec<LonelyTask>,
    functors: Vec<Job>,
}

struct Shared {
    arena: Arc<NodeArena>,
    budget: Arc<LinkBudget>,
    pool: RwLock<Arc<TaskScheduler>>,
    tracker: Arc<ActivityTracker>,
    running: Arc<AtomicBool>,
    lonely: Mutex<Lonely>,
    // Serialises start, stop, clear and resize.
    reconfigure: Mutex<()>,
    root: Mutex<Option<NodeId>>,
    session: Mutex<Option<Session>>,
    callbacks: Arc<Callbacks>,
    connector: Arc<dyn Connector>,
    policy: ExtensionPolicy,
    max_redirects: u32,
}

fn new_pool(
    threads: usize,
    tracker: &Arc<ActivityTracker>,
    callbacks: &Arc<Callbacks>,
) -> Result<Arc<TaskScheduler>, SchedulerError> {
    let callbacks = Arc::clone(callbacks);
    let hook: PanicHook = Arc::new(move |message: String| {
        callbacks.on_exception(&format!("Task panicked: {}", message));
    });
    TaskScheduler::new(threads, Arc::clone(tracker), Some(hook)).map(Arc::new)
}

fn validate_start(url: &str, max_links: usize, threads: usize) -> Result<(), ConfigError> {
    if url.trim().is_empty() {
        return Err(ConfigError::InvalidUrl("URL is empty".to_string()));
    }
    normalize_url(url.trim()).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
    if max_links == 0 {
        return Err(ConfigError::Validation(
            "max links must be at least 1".to_string(),
        ));
    }
    validate_threads(threads)
}

fn validate_threads(threads: usize) -> Result<(), ConfigError> {
    if threads == 0 || threads > MAX_THREADS {
        return Err(ConfigError::Validation(format!(
            "threads must be between 1 and {}, got {}",
            MAX_THREADS, threads
        )));
    }
    Ok(())
}

impl Shared {
    fn report(&self, message: &str) {
        self.callbacks.on_exception(message);
    }

    fn current_pool(&self) -> Arc<TaskScheduler> {
        Arc::clone(&self.pool.read())
    }

    /// Submits `job`, parking it when the pool refuses it
    fn submit_or_park(&self, job: Job) {
        let mut job = job;
        loop {
            let pool = self.current_pool();
            match pool.submit(job) {
                Ok(()) => return,
                Err(rejected) => {
                    let mut lonely = self.lonely.lock();
                    // The pool may have been swapped between the read and the
                    // rejection; only park against the pool that refused.
                    if Arc::ptr_eq(&pool, &self.pool.read()) {
                        lonely.functors.push(rejected);
                        return;
                    }
                    job = rejected;
                }
            }
        }
    }

    fn park_task(&self, task: LonelyTask) {
        self.lonely.lock().tasks.push(task);
    }

    /// Terminates `pool` and keeps its unstarted closures
    fn export_pool(&self, pool: &TaskScheduler) {
        if pool.joined() {
            return;
        }
        pool.join_export_all(|jobs| self.lonely.lock().functors.extend(jobs));
    }

    fn replace_pool(&self, threads: usize) -> Result<(), SchedulerError> {
        let old = self.current_pool();
        self.export_pool(&old);
        let pool = new_pool(threads, &self.tracker, &self.callbacks)?;
        *self.pool.write() = pool;
        Ok(())
    }

    /// Re-queues lonely work
    ///
    /// Functors are always flushed. Tasks are flushed only while running,
    /// with their contexts rebound to `template`.
    fn flush_lonely(&self, template: Option<&WorkerContext>) {
        let (functors, tasks) = {
            let mut lonely = self.lonely.lock();
            let functors = std::mem::take(&mut lonely.functors);
            let tasks = match template {
                Some(_) if self.running.load(Ordering::Acquire) => {
                    std::mem::take(&mut lonely.tasks)
                }
                _ => Vec::new(),
            };
            (functors, tasks)
        };

        let mut jobs = functors;
        if let Some(template) = template {
            jobs.extend(tasks.into_iter().map(|mut task| {
                task.ctx.rebind(template);
                task.into_job()
            }));
        }

        if jobs.is_empty() {
            return;
        }

        tracing::debug!("Flushing {} parked jobs", jobs.len());
        let pool = self.current_pool();
        if let Err(rejected) = pool.submit_batch(jobs, SubmitPolicy::Spread) {
            for job in rejected {
                self.submit_or_park(job);
            }
        }
    }

    /// Suspends the crawl and parks all unstarted work
    fn suspend(&self) {
        self.running.store(false, Ordering::Release);
        let pool = self.current_pool();
        self.export_pool(&pool);
    }
}

/// Scheduling handle given to worker contexts
///
/// Holds the orchestrator weakly so contexts parked in its own buffers do
/// not keep it alive.
struct SpawnerHandle(Weak<Shared>);

impl TaskSpawner for SpawnerHandle {
    fn schedule_task(&self, action: TaskAction, node: NodeId, ctx: WorkerContext) {
        let Some(shared) = self.0.upgrade() else {
            return;
        };
        if !shared.running.load(Ordering::Acquire) {
            shared.park_task(LonelyTask { node, action, ctx });
            return;
        }
        shared.submit_or_park(LonelyTask { node, action, ctx }.into_job());
    }

    fn schedule_functor(&self, job: Job) {
        if let Some(shared) = self.0.upgrade() {
            shared.submit_or_park(job);
        }
    }

    fn defer_task(&self, action: TaskAction, node: NodeId, ctx: WorkerContext) {
        if let Some(shared) = self.0.upgrade() {
            shared.park_task(LonelyTask { node, action, ctx });
        }
    }
}

/// Public control surface of a crawl
///
/// All methods take `&self`; the orchestrator can be shared between threads.
/// Methods that reconfigure the pool refuse to run on one of its workers.
pub struct CrawlOrchestrator {
    shared: Arc<Shared>,
}

impl CrawlOrchestrator {
    /// Creates an idle orchestrator
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration; supplies the initial thread
    ///   count, link budget, redirect cap and extension lists
    /// * `connector` - Opens one transport per worker context
    pub fn new(config: &Config, connector: Arc<dyn Connector>) -> Result<Self, WebgrepError> {
        crate::config::validate(config)?;
        debug_assert!(NodeArena::self_test().is_ok());

        let tracker = Arc::new(ActivityTracker::new());
        let callbacks = Arc::new(Callbacks::new());
        let pool = new_pool(config.crawler.threads, &tracker, &callbacks)?;

        let shared = Shared {
            arena: Arc::new(NodeArena::new()),
            budget: Arc::new(LinkBudget::new(config.crawler.max_links)),
            pool: RwLock::new(pool),
            tracker,
            running: Arc::new(AtomicBool::new(false)),
            lonely: Mutex::new(Lonely::default()),
            reconfigure: Mutex::new(()),
            root: Mutex::new(None),
            session: Mutex::new(None),
            callbacks,
            connector,
            policy: ExtensionPolicy::new(&config.extraction),
            max_redirects: config.crawler.max_redirects,
        };

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    fn template(&self, patterns: Arc<Patterns>) -> WorkerContext {
        let shared = &self.shared;
        let spawner: Arc<dyn TaskSpawner> = Arc::new(SpawnerHandle(Arc::downgrade(shared)));
        WorkerContext::new(
            Arc::clone(&shared.arena),
            patterns,
            shared.callbacks.clone(),
            spawner,
            Arc::clone(&shared.connector),
            Arc::clone(&shared.running),
            shared.max_redirects,
        )
    }

    fn session_template(&self) -> Option<WorkerContext> {
        let patterns = self
            .shared
            .session
            .lock()
            .as_ref()
            .map(|s| Arc::clone(&s.patterns))?;
        Some(self.template(patterns))
    }

    fn refuse_on_worker(&self, operation: &str) -> bool {
        if self.shared.current_pool().is_worker_thread() {
            self.shared
                .report(&format!("{} cannot be called from a worker thread", operation));
            return true;
        }
        false
    }

    /// Starts or resumes a crawl
    ///
    /// With the same URL and pattern as the tree currently held, the crawl
    /// resumes from the parked work. Anything else discards the tree and
    /// starts again from a new root. Returns `false` and reports through the
    /// exception callback when the arguments are rejected.
    pub fn start(&self, url: &str, pattern: &str, max_links: usize, threads: usize) -> bool {
        self.start_with(url, pattern, max_links, threads, false)
    }

    /// Repeats the last `start`; `force_rebuild` discards the tree first
    pub fn restart(&self, force_rebuild: bool) -> bool {
        let last = self
            .shared
            .session
            .lock()
            .as_ref()
            .map(|s| (s.url.clone(), s.pattern.clone()));
        let Some((url, pattern)) = last else {
            self.shared.report("restart called before any crawl was started");
            return false;
        };
        let max_links = self.shared.budget.max();
        let threads = self.threads_count();
        self.start_with(&url, &pattern, max_links, threads, force_rebuild)
    }

    fn start_with(
        &self,
        url: &str,
        pattern: &str,
        max_links: usize,
        threads: usize,
        force_rebuild: bool,
    ) -> bool {
        if self.refuse_on_worker("start") {
            return false;
        }
        let shared = &self.shared;
        let _guard = shared.reconfigure.lock();

        if let Err(e) = validate_start(url, max_links, threads) {
            shared.report(&format!("Cannot start crawl: {}", e));
            return false;
        }
        let url = url.trim();
        let patterns = match Patterns::new(pattern, shared.policy.clone()) {
            Ok(patterns) => Arc::new(patterns),
            Err(e) => {
                shared.report(&format!("Cannot start crawl: {}", e));
                return false;
            }
        };

        shared.suspend();
        shared.budget.set_max(max_links);
        if let Err(e) = shared.replace_pool(threads) {
            shared.report(&format!("Cannot start worker pool: {}", e));
            return false;
        }

        let (root, template, resumed) = {
            let mut root_slot = shared.root.lock();
            let mut session_slot = shared.session.lock();

            let same_session = !force_rebuild
                && session_slot
                    .as_ref()
                    .is_some_and(|s| s.url == url && s.pattern == pattern);
            let existing = if same_session {
                root_slot.zip(session_slot.as_ref().map(|s| Arc::clone(&s.patterns)))
            } else {
                None
            };

            match existing {
                Some((root, patterns)) => (root, self.template(patterns), true),
                None => {
                    if let Some(old) = root_slot.take() {
                        let freed = shared.arena.delete_list(old);
                        tracing::debug!("Discarded previous tree of {} nodes", freed);
                    }
                    shared.arena.clear();
                    *shared.lonely.lock() = Lonely::default();
                    shared.budget.reset();

                    let root = match shared.arena.create_root(url, Arc::clone(&shared.budget)) {
                        Ok(root) => root,
                        Err(e) => {
                            *session_slot = None;
                            shared.report(&format!("Cannot create root node: {}", e));
                            return false;
                        }
                    };
                    *root_slot = Some(root);
                    *session_slot = Some(Session {
                        url: url.to_string(),
                        pattern: pattern.to_string(),
                        patterns: Arc::clone(&patterns),
                        started_at: Utc::now(),
                    });
                    (root, self.template(patterns), false)
                }
            }
        };

        shared.running.store(true, Ordering::Release);

        if !resumed {
            tracing::info!(
                "Starting crawl of {} (max links {}, {} threads)",
                url,
                max_links,
                threads
            );
            template.schedule_task(download_grep_recursive, root);
            return true;
        }

        let parked = {
            let lonely = shared.lonely.lock();
            lonely.tasks.len() + lonely.functors.len()
        };
        tracing::info!("Resuming crawl of {} with {} parked jobs", url, parked);

        if parked > 0 {
            shared.flush_lonely(Some(&template));
        } else {
            let finished = shared
                .arena
                .get(root)
                .is_some_and(|node| node.status().is_parsed() && node.child().is_some());
            if !finished {
                template.schedule_task(download_grep_recursive, root);
            }
        }
        true
    }

    /// Suspends the crawl
    ///
    /// Called from outside the pool, waits for in-flight pages and parks
    /// everything not yet started. Called from a worker, only closes the
    /// pool; remaining work is parked as workers finish.
    pub fn stop(&self) {
        let shared = &self.shared;
        let pool = shared.current_pool();
        if pool.is_worker_thread() {
            shared.running.store(false, Ordering::Release);
            pool.close();
            tracing::info!("Crawl stop requested from a worker");
            return;
        }

        let _guard = shared.reconfigure.lock();
        shared.suspend();
        let parked = {
            let lonely = shared.lonely.lock();
            lonely.tasks.len() + lonely.functors.len()
        };
        tracing::info!("Crawl stopped, {} jobs parked", parked);
    }

    /// Stops the crawl and discards the tree and all parked work
    pub fn clear(&self) {
        if self.refuse_on_worker("clear") {
            return;
        }
        let shared = &self.shared;
        let _guard = shared.reconfigure.lock();
        shared.suspend();

        *shared.lonely.lock() = Lonely::default();
        if let Some(root) = shared.root.lock().take() {
            shared.arena.delete_list(root);
        }
        shared.arena.clear();
        *shared.session.lock() = None;
        shared.budget.reset();
    }

    /// Replaces the worker pool with one of `threads` workers
    ///
    /// Unstarted closures move to the new pool. Returns `false` when the
    /// count is out of range or the new pool cannot be spawned.
    pub fn set_threads_number(&self, threads: usize) -> bool {
        if self.refuse_on_worker("set_threads_number") {
            return false;
        }
        if let Err(e) = validate_threads(threads) {
            self.shared.report(&format!("Cannot resize pool: {}", e));
            return false;
        }

        let shared = &self.shared;
        let _guard = shared.reconfigure.lock();
        let current = shared.current_pool();
        if current.threads_count() == threads && !current.closed() {
            return true;
        }

        if let Err(e) = shared.replace_pool(threads) {
            shared.report(&format!("Cannot resize pool: {}", e));
            return false;
        }
        let template = self.session_template();
        shared.flush_lonely(template.as_ref());
        tracing::info!("Worker pool resized to {} threads", threads);
        true
    }

    /// Changes the link ceiling; the running crawl sees it on its next grant
    pub fn set_max_links(&self, max_links: usize) {
        self.shared.budget.set_max(max_links);
        tracing::debug!("Link budget set to {}", max_links);
    }

    pub fn set_on_page_parsed<F>(&self, callback: F)
    where
        F: Fn(&CrawlNode) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_on_page_parsed(Some(Arc::new(callback)));
    }

    pub fn set_on_level_spawned<F>(&self, callback: F)
    where
        F: Fn(&CrawlNode) + Send + Sync + 'static,
    {
        self.shared
            .callbacks
            .set_on_level_spawned(Some(Arc::new(callback)));
    }

    pub fn set_on_max_links_reached<F>(&self, callback: F)
    where
        F: Fn(&CrawlNode) + Send + Sync + 'static,
    {
        self.shared
            .callbacks
            .set_on_max_links_reached(Some(Arc::new(callback)));
    }

    pub fn set_on_exception<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_on_exception(Some(Arc::new(callback)));
    }

    /// Runs an arbitrary closure on the pool, or parks it until the pool
    /// accepts work again
    pub fn schedule_functor<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.submit_or_park(Box::new(job));
    }

    /// Closes the pool and waits for every queued closure to finish
    ///
    /// Work produced by those closures is parked. Use `wait_idle` to wait
    /// for a crawl without closing the pool.
    pub fn join_all(&self) {
        if self.refuse_on_worker("join_all") {
            return;
        }
        let pool = self.shared.current_pool();
        pool.join_all();
    }

    /// Blocks until no work is queued or running, or `timeout` elapses
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.shared.tracker.wait_idle(timeout)
    }

    pub fn root(&self) -> Option<NodeId> {
        *self.shared.root.lock()
    }

    pub fn arena(&self) -> &Arc<NodeArena> {
        &self.shared.arena
    }

    pub fn links_count(&self) -> usize {
        self.shared.budget.count()
    }

    pub fn max_links(&self) -> usize {
        self.shared.budget.max()
    }

    pub fn threads_count(&self) -> usize {
        self.shared.current_pool().threads_count()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Parked tasks and parked closures
    pub fn lonely_count(&self) -> (usize, usize) {
        let lonely = self.shared.lonely.lock();
        (lonely.tasks.len(), lonely.functors.len())
    }

    pub fn statistics(&self) -> CrawlStatistics {
        let mut stats = collect_statistics(&self.shared.arena, self.root());
        stats.started_at = self.shared.session.lock().as_ref().map(|s| s.started_at);
        stats
    }

    pub fn page_listing(&self) -> Vec<PageLine> {
        page_listing(&self.shared.arena, self.root())
    }
}

impl Drop for CrawlOrchestrator {
    fn drop(&mut self) {
        self.clear();
        self.shared.current_pool().close();
    }
}
