//! Task tree for webgrep
//!
//! Every page of a crawl is one `CrawlNode`. Nodes live in a `NodeArena` and
//! refer to each other by `NodeId`; sibling (`next`), `child` and `parent`
//! links are atomic indices, so any thread may read the tree while the single
//! worker that owns a node appends a new row below it.
//!
//! # Components
//!
//! - `NodeArena`: Owns all nodes; allocation, row spawning, traversal and freeing
//! - `CrawlNode`: One page/task with its embedded `PageState`
//! - `LinkBudget`: Link counter and ceiling shared by every node of one crawl

mod arena;
mod budget;
mod node;

use std::fmt;

pub use arena::{Branch, NodeArena, SpawnReport};
pub use budget::LinkBudget;
pub use node::CrawlNode;

/// Sentinel stored in link fields that point nowhere
pub(crate) const NIL: usize = usize::MAX;

/// Index of a node inside its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }

    pub(crate) fn from_raw(raw: usize) -> Option<Self> {
        (raw != NIL).then_some(Self(raw))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
