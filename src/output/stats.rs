//! Statistics generation from the task tree
//!
//! This module walks a crawl tree and summarises it, and renders the
//! per-page listing printed by the binary.

use crate::state::PageStatus;
use crate::tree::{NodeArena, NodeId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Number of nodes in the tree
    pub total_nodes: u64,

    /// Count of nodes by page status
    pub pages_by_status: HashMap<PageStatus, u64>,

    /// Count of nodes per tree level
    pub depth_breakdown: BTreeMap<usize, u64>,

    /// Text matches over all parsed pages
    pub text_matches: u64,

    /// Accepted links over all parsed pages
    pub links_found: u64,

    /// Shared link counter and its ceiling
    pub links_count: usize,
    pub max_links: usize,

    /// When the current crawl was started, if known
    pub started_at: Option<DateTime<Utc>>,

    /// When these statistics were collected
    pub collected_at: DateTime<Utc>,
}

impl CrawlStatistics {
    fn empty() -> Self {
        Self {
            total_nodes: 0,
            pages_by_status: HashMap::new(),
            depth_breakdown: BTreeMap::new(),
            text_matches: 0,
            links_found: 0,
            links_count: 0,
            max_links: 0,
            started_at: None,
            collected_at: Utc::now(),
        }
    }

    pub fn count(&self, status: PageStatus) -> u64 {
        self.pages_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Nodes not yet in a terminal state
    pub fn pending(&self) -> u64 {
        self.total_nodes - self.count(PageStatus::Parsed) - self.count(PageStatus::Failed)
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.started_at
            .map(|started| (self.collected_at - started).num_seconds())
    }
}

/// Summarises the tree rooted at `root`
///
/// # Arguments
///
/// * `arena` - Arena holding the tree
/// * `root` - Root node, or `None` for an empty crawl
pub fn collect_statistics(arena: &NodeArena, root: Option<NodeId>) -> CrawlStatistics {
    let mut stats = CrawlStatistics::empty();
    let Some(root) = root else {
        return stats;
    };

    if let Some(root_node) = arena.get(root) {
        stats.links_count = root_node.budget().count();
        stats.max_links = root_node.budget().max();
    }

    arena.traverse(root, |node| {
        let page = node.page();
        stats.total_nodes += 1;
        *stats.pages_by_status.entry(page.status).or_insert(0) += 1;
        *stats.depth_breakdown.entry(node.level()).or_insert(0) += 1;
        stats.text_matches += page.text_matches.len() as u64;
        stats.links_found += page.link_matches.len() as u64;
    });

    stats
}

/// One row of the page listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLine {
    pub url: String,
    pub level: usize,
    pub response_code: u16,
    pub status: PageStatus,
    pub text_matches: usize,
    pub link_matches: usize,
}

impl fmt::Display for PageLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "url: {} (GET code: {}) (Status: {}) (Text Matches: {}) (URL matches: {})",
            self.url, self.response_code, self.status, self.text_matches, self.link_matches
        )
    }
}

/// Lists every page of the tree, ordered by level then sibling order
pub fn page_listing(arena: &NodeArena, root: Option<NodeId>) -> Vec<PageLine> {
    let Some(root) = root else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    arena.traverse(root, |node| {
        let page = node.page();
        lines.push((
            node.level(),
            node.id(),
            PageLine {
                url: page.target_url.clone(),
                level: node.level(),
                response_code: page.response_code,
                status: page.status,
                text_matches: page.text_matches.len(),
                link_matches: page.link_matches.len(),
            },
        ));
    });

    lines.sort_by_key(|(level, id, _)| (*level, *id));
    lines.into_iter().map(|(_, _, line)| line).collect()
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Total pages: {}", stats.total_nodes);
    println!("  Text matches: {}", stats.text_matches);
    println!("  Links accepted: {}", stats.links_found);
    println!("  Link budget: {} / {}", stats.links_count, stats.max_links);
    if let Some(seconds) = stats.duration_seconds() {
        println!("  Duration: {}s", seconds);
    }
    println!();

    println!("Pages by Status:");
    let mut status_counts: Vec<_> = stats.pages_by_status.iter().collect();
    status_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (status, count) in status_counts {
        let percentage = if stats.total_nodes > 0 {
            (*count as f64 / stats.total_nodes as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if !stats.depth_breakdown.is_empty() {
        println!("Pages by Level:");
        for (level, count) in &stats.depth_breakdown {
            println!("  {}: {}", level, count);
        }
        println!();
    }

    println!(
        "Collected at {}",
        stats.collected_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}
