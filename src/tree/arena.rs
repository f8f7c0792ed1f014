use super::{CrawlNode, LinkBudget, NodeId};
use crate::url::{resolve_link, Endpoint};
use crate::TreeError;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Slots {
    nodes: Vec<Option<Arc<CrawlNode>>>,
    free: Vec<usize>,
    live: usize,
}

/// Outcome of a row-spawning call
///
/// `spawned` counts the nodes actually linked into the tree. When allocation
/// stops early, `failure` carries the reason and the row is left with the
/// nodes created so far.
#[derive(Debug)]
pub struct SpawnReport {
    pub spawned: usize,
    pub failure: Option<TreeError>,
}

impl SpawnReport {
    fn complete(spawned: usize) -> Self {
        Self {
            spawned,
            failure: None,
        }
    }

    fn failed(spawned: usize, failure: TreeError) -> Self {
        Self {
            spawned,
            failure: Some(failure),
        }
    }
}

/// Owner of every node of a crawl tree
///
/// Nodes are handed out as `Arc<CrawlNode>`, so a reader holding a node keeps
/// it alive even if its slot is freed. Freed slots are reused, which is only
/// sound once no task still refers to the old `NodeId`.
#[derive(Debug)]
pub struct NodeArena {
    slots: RwLock<Slots>,
    limit: usize,
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeArena {
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// Arena refusing to hold more than `limit` live nodes
    pub fn with_limit(limit: usize) -> Self {
        Self {
            slots: RwLock::new(Slots::default()),
            limit,
        }
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.slots.read().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: NodeId) -> Option<Arc<CrawlNode>> {
        self.slots.read().nodes.get(id.0).and_then(|slot| slot.clone())
    }

    fn node(&self, id: NodeId) -> Result<Arc<CrawlNode>, TreeError> {
        self.get(id).ok_or(TreeError::UnknownNode(id))
    }

    fn allocate(
        &self,
        level: usize,
        order: usize,
        parent: Option<NodeId>,
        target_url: String,
        budget: Arc<LinkBudget>,
    ) -> Result<Arc<CrawlNode>, TreeError> {
        let mut slots = self.slots.write();
        if slots.live >= self.limit {
            return Err(TreeError::Allocation(slots.nodes.len()));
        }

        let index = match slots.free.pop() {
            Some(index) => index,
            None => {
                let len = slots.nodes.len();
                slots
                    .nodes
                    .try_reserve(1)
                    .map_err(|_| TreeError::Allocation(len))?;
                slots.nodes.push(None);
                len
            }
        };

        let node = Arc::new(CrawlNode::new(
            NodeId(index),
            level,
            order,
            parent,
            target_url,
            budget,
        ));
        slots.nodes[index] = Some(Arc::clone(&node));
        slots.live += 1;
        Ok(node)
    }

    /// Allocates a level-0 node bound to `budget`
    pub fn create_root(
        &self,
        target_url: impl Into<String>,
        budget: Arc<LinkBudget>,
    ) -> Result<NodeId, TreeError> {
        self.allocate(0, 0, None, target_url.into(), budget)
            .map(|node| node.id())
    }

    /// Last node of the row starting at `head`
    pub fn last_on_branch(&self, head: NodeId) -> Result<Arc<CrawlNode>, TreeError> {
        let mut last = self.node(head)?;
        while let Some(next) = last.next().and_then(|id| self.get(id)) {
            last = next;
        }
        Ok(last)
    }

    /// Appends `count` empty siblings after the last node of `head`'s row
    ///
    /// New nodes share the row's level, parent and link budget. Their order
    /// continues the parent's child numbering.
    pub fn spawn_next_nodes(&self, head: NodeId, count: usize) -> SpawnReport {
        self.append_row(head, std::iter::repeat(String::new()).take(count))
    }

    fn append_row<I>(&self, head: NodeId, urls: I) -> SpawnReport
    where
        I: IntoIterator<Item = String>,
    {
        let mut last = match self.last_on_branch(head) {
            Ok(last) => last,
            Err(e) => return SpawnReport::failed(0, e),
        };
        let parent = last.parent();
        let parent_node = parent.and_then(|id| self.get(id));

        let mut spawned = 0;
        for url in urls {
            let order = match &parent_node {
                Some(p) => p.child_count(),
                None => last.order() + 1,
            };

            match self.allocate(last.level(), order, parent, url, Arc::clone(last.budget())) {
                Ok(node) => {
                    if let Some(p) = &parent_node {
                        p.bump_child_count();
                    }
                    last.publish_next(node.id());
                    last = node;
                    spawned += 1;
                }
                Err(e) => {
                    tracing::error!("Stopped spawning row at {} after {} nodes: {}", head, spawned, e);
                    return SpawnReport::failed(spawned, e);
                }
            }
        }

        SpawnReport::complete(spawned)
    }

    /// Creates the head of the row one level below `parent`
    ///
    /// A node owns at most one child row, so this fails with
    /// `TreeError::ChildExists` if the row was already created.
    pub fn spawn_child_node(&self, parent: NodeId) -> Result<NodeId, TreeError> {
        let parent_node = self.node(parent)?;
        if parent_node.child().is_some() {
            return Err(TreeError::ChildExists(parent));
        }

        let node = self.allocate(
            parent_node.level() + 1,
            parent_node.child_count(),
            Some(parent),
            String::new(),
            Arc::clone(parent_node.budget()),
        )?;
        parent_node.bump_child_count();
        parent_node.publish_child(node.id());
        Ok(node.id())
    }

    /// Fills the row at `head` with the links granted to `source`
    ///
    /// The first resolved link becomes `head`'s URL; the rest are appended
    /// as new siblings. Only the first `links_granted` accepted links are
    /// used, so the row may be shorter than the page's link list.
    ///
    /// # Arguments
    ///
    /// * `head` - Empty row head created by `spawn_child_node`
    /// * `endpoint` - Endpoint the source page was served from
    /// * `source` - Parsed node whose link matches are spawned
    ///
    /// # Returns
    ///
    /// A report whose `spawned` count includes `head`.
    pub fn spawn_grepped_subtasks(
        &self,
        head: NodeId,
        endpoint: &Endpoint,
        source: NodeId,
    ) -> SpawnReport {
        let urls: Vec<String> = {
            let source_node = match self.node(source) {
                Ok(node) => node,
                Err(e) => return SpawnReport::failed(0, e),
            };
            let page = source_node.page();
            if !page.page_parsed() {
                return SpawnReport::failed(0, TreeError::NotParsed(source));
            }

            let granted = page.links_granted.min(page.link_matches.len());
            page.link_matches[..granted]
                .iter()
                .filter_map(|span| resolve_link(endpoint, &page.span_str(span)))
                .collect()
        };

        let mut urls = urls.into_iter();
        let Some(first) = urls.next() else {
            return SpawnReport::complete(0);
        };

        match self.node(head) {
            Ok(head_node) => head_node.page_mut().target_url = first,
            Err(e) => return SpawnReport::failed(0, e),
        }

        let mut report = self.append_row(head, urls);
        report.spawned += 1;
        report
    }

    /// Iterates the row starting at `head`
    ///
    /// With `include_head == false` iteration starts at `head`'s next sibling.
    pub fn branch(&self, head: NodeId, include_head: bool) -> Branch<'_> {
        let next = if include_head {
            Some(head)
        } else {
            self.get(head).and_then(|node| node.next())
        };
        Branch { arena: self, next }
    }

    pub fn for_each_on_branch<F>(&self, head: NodeId, include_head: bool, mut f: F)
    where
        F: FnMut(&Arc<CrawlNode>),
    {
        for node in self.branch(head, include_head) {
            f(&node);
        }
    }

    /// Visits every node reachable from `root`, row by row
    pub fn traverse<F>(&self, root: NodeId, mut f: F)
    where
        F: FnMut(&Arc<CrawlNode>),
    {
        let mut rows = vec![root];
        while let Some(head) = rows.pop() {
            for node in self.branch(head, true) {
                f(&node);
                if let Some(child) = node.child() {
                    rows.push(child);
                }
            }
        }
    }

    /// Parent chain of `id`, nearest first, ending at the root
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = Arc<CrawlNode>> + '_ {
        let first = self
            .get(id)
            .and_then(|node| node.parent())
            .and_then(|parent| self.get(parent));
        std::iter::successors(first, move |node| {
            node.parent().and_then(|parent| self.get(parent))
        })
    }

    /// Frees `head`, its following siblings and every row below them
    ///
    /// Callers must make sure no task still holds any of these ids.
    ///
    /// # Returns
    ///
    /// The number of nodes freed
    pub fn delete_list(&self, head: NodeId) -> usize {
        let mut doomed = Vec::new();
        self.traverse(head, |node| doomed.push(node.id()));

        let mut slots = self.slots.write();
        let mut freed = 0;
        // Children were pushed after their parents; free leaves first
        for id in doomed.into_iter().rev() {
            if let Some(slot) = slots.nodes.get_mut(id.0) {
                if slot.take().is_some() {
                    slots.free.push(id.0);
                    slots.live -= 1;
                    freed += 1;
                }
            }
        }
        freed
    }

    /// Drops every node
    pub fn clear(&self) {
        *self.slots.write() = Slots::default();
    }

    /// Builds rows of increasing size on a scratch arena and checks the shape
    pub fn self_test() -> Result<(), TreeError> {
        const ROWS: usize = 8;

        let arena = NodeArena::new();
        let budget = Arc::new(LinkBudget::new(usize::MAX));
        let root = arena.create_root("http://self.test/", budget)?;

        let mut head = root;
        for size in 1..=ROWS {
            let child = arena.spawn_child_node(head)?;
            let report = arena.spawn_next_nodes(child, size - 1);
            if let Some(e) = report.failure {
                return Err(e);
            }

            let row: Vec<_> = arena.branch(child, true).collect();
            if row.len() != size {
                return Err(TreeError::SelfTest(format!(
                    "row {} has {} nodes",
                    size,
                    row.len()
                )));
            }
            if let Some(bad) = row
                .iter()
                .enumerate()
                .find(|(i, n)| n.level() != size || n.order() != *i || n.parent() != Some(head))
            {
                return Err(TreeError::SelfTest(format!(
                    "node {} in row {} has level {} order {}",
                    bad.1.id(),
                    size,
                    bad.1.level(),
                    bad.1.order()
                )));
            }
            head = child;
        }

        let expected = 1 + (1..=ROWS).sum::<usize>();
        if arena.len() != expected {
            return Err(TreeError::SelfTest(format!(
                "arena holds {} nodes, expected {}",
                arena.len(),
                expected
            )));
        }

        let freed = arena.delete_list(root);
        if freed != expected || !arena.is_empty() {
            return Err(TreeError::SelfTest(format!(
                "freed {} of {} nodes",
                freed, expected
            )));
        }

        Ok(())
    }
}

/// Iterator over one sibling row
pub struct Branch<'a> {
    arena: &'a NodeArena,
    next: Option<NodeId>,
}

impl Iterator for Branch<'_> {
    type Item = Arc<CrawlNode>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.arena.get(self.next?)?;
        self.next = node.next();
        Some(node)
    }
}
