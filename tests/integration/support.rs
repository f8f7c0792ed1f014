//! Shared fixtures for the integration tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use webgrep::config::Config;
use webgrep::crawler::{Connector, Response, Transport};
use webgrep::tree::{NodeArena, NodeId};
use webgrep::url::{normalized_key, Endpoint};
use webgrep::{CrawlOrchestrator, TransportError};

pub const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

type SiteFn = dyn Fn(&str) -> Response + Send + Sync;

/// Connector answering every request from a function of the absolute URL
#[derive(Clone)]
pub struct SiteConnector {
    site: Arc<SiteFn>,
    requests: Arc<AtomicUsize>,
}

impl SiteConnector {
    pub fn new<F>(site: F) -> Self
    where
        F: Fn(&str) -> Response + Send + Sync + 'static,
    {
        Self {
            site: Arc::new(site),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Connector for SiteConnector {
    fn open(&self) -> Box<dyn Transport> {
        Box::new(SiteTransport {
            site: Arc::clone(&self.site),
            requests: Arc::clone(&self.requests),
            endpoint: None,
        })
    }
}

struct SiteTransport {
    site: Arc<SiteFn>,
    requests: Arc<AtomicUsize>,
    endpoint: Option<Endpoint>,
}

impl Transport for SiteTransport {
    fn connect(&mut self, url: &str) -> Result<Endpoint, TransportError> {
        let endpoint = Endpoint::from_url(url).map_err(|e| TransportError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.endpoint = Some(endpoint.clone());
        Ok(endpoint)
    }

    fn get(&mut self, path: &str) -> Result<Response, TransportError> {
        let endpoint = self.endpoint.as_ref().ok_or(TransportError::NotConnected)?;
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok((self.site)(&format!("{}{}", endpoint.base(), path)))
    }
}

/// Page whose body links to every path in `links`
pub fn html_page(text: &str, links: &[String]) -> Response {
    let anchors: String = links
        .iter()
        .map(|link| format!("<a href=\"{}\">{}</a>\n", link, link))
        .collect();
    Response::new(200, format!("<html><body><p>{}</p>\n{}</body></html>", text, anchors))
}

/// Infinite site where `/p{i}.html` links to `/p{fanout*i+1}.html` onwards
pub fn fanout_site(fanout: usize) -> SiteConnector {
    SiteConnector::new(move |url| {
        let index = url
            .rsplit('/')
            .next()
            .and_then(|name| name.strip_prefix('p'))
            .and_then(|name| name.strip_suffix(".html"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);
        let links: Vec<String> = (1..=fanout)
            .map(|k| format!("/p{}.html", fanout * index + k))
            .collect();
        html_page("needle", &links)
    })
}

pub fn orchestrator<C: Connector + 'static>(connector: C, threads: usize) -> CrawlOrchestrator {
    let mut config = Config::default();
    config.crawler.threads = threads;
    CrawlOrchestrator::new(&config, Arc::new(connector)).unwrap()
}

/// Ids of every node reachable from `root`
pub fn all_nodes(arena: &NodeArena, root: NodeId) -> Vec<NodeId> {
    let mut ids = Vec::new();
    arena.traverse(root, |node| ids.push(node.id()));
    ids
}

/// Asserts the structural properties every crawl tree must keep
pub fn assert_tree_consistent(arena: &NodeArena, root: NodeId) {
    let ids = all_nodes(arena, root);
    let mut granted = 0;

    for id in &ids {
        let node = arena.get(*id).unwrap();
        let ancestors: Vec<_> = arena.ancestors(*id).collect();
        assert_eq!(ancestors.len(), node.level(), "level of {}", id);

        if let Some(parent) = node.parent() {
            assert_eq!(arena.get(parent).unwrap().level() + 1, node.level());
        }

        let own = normalized_key(&node.target_url());
        let ancestor_keys: HashSet<_> = ancestors
            .iter()
            .filter_map(|a| normalized_key(&a.target_url()))
            .collect();
        if let Some(own) = own {
            assert!(!ancestor_keys.contains(&own), "{} repeats an ancestor", id);
        }

        granted += node.page().links_granted;
    }

    let root_node = arena.get(root).unwrap();
    assert!(root_node.budget().count() <= root_node.budget().max());
    assert_eq!(granted, root_node.budget().count());
}
