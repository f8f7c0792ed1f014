use super::{LinkBudget, NodeId, NIL};
use crate::state::{PageState, PageStatus};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One crawl task, representing a single page
///
/// `level` and `order` are fixed at allocation. `next` and `child` are
/// written once by the worker executing this node (release) and may be read
/// by anyone (acquire); a published link is never changed afterwards.
#[derive(Debug)]
pub struct CrawlNode {
    id: NodeId,
    level: usize,
    order: usize,
    parent: Option<NodeId>,
    next: AtomicUsize,
    child: AtomicUsize,
    child_count: AtomicUsize,
    page: RwLock<PageState>,
    budget: Arc<LinkBudget>,
}

impl CrawlNode {
    pub(crate) fn new(
        id: NodeId,
        level: usize,
        order: usize,
        parent: Option<NodeId>,
        target_url: String,
        budget: Arc<LinkBudget>,
    ) -> Self {
        Self {
            id,
            level,
            order,
            parent,
            next: AtomicUsize::new(NIL),
            child: AtomicUsize::new(NIL),
            child_count: AtomicUsize::new(0),
            page: RwLock::new(PageState::new(target_url)),
            budget,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Depth from the root (root is 0)
    pub fn level(&self) -> usize {
        self.level
    }

    /// Index among the children of `parent`
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Next sibling on the same level
    pub fn next(&self) -> Option<NodeId> {
        NodeId::from_raw(self.next.load(Ordering::Acquire))
    }

    /// Head of the row one level below
    pub fn child(&self) -> Option<NodeId> {
        NodeId::from_raw(self.child.load(Ordering::Acquire))
    }

    /// Number of children appended so far; never decreases
    pub fn child_count(&self) -> usize {
        self.child_count.load(Ordering::Acquire)
    }

    pub fn budget(&self) -> &Arc<LinkBudget> {
        &self.budget
    }

    pub fn page(&self) -> RwLockReadGuard<'_, PageState> {
        self.page.read()
    }

    pub fn page_mut(&self) -> RwLockWriteGuard<'_, PageState> {
        self.page.write()
    }

    pub fn target_url(&self) -> String {
        self.page.read().target_url.clone()
    }

    pub fn status(&self) -> PageStatus {
        self.page.read().status
    }

    pub(crate) fn publish_next(&self, next: NodeId) {
        self.next.store(next.0, Ordering::Release);
    }

    pub(crate) fn publish_child(&self, child: NodeId) {
        self.child.store(child.0, Ordering::Release);
    }

    pub(crate) fn bump_child_count(&self) -> usize {
        self.child_count.fetch_add(1, Ordering::AcqRel)
    }
}
