//! Per-node download, match and spawn steps
//!
//! Each node walks `New → Downloading → Ready → Parsing → Parsed`, or ends in
//! `Failed` when the page cannot be fetched. A parsed node with accepted
//! links grows one child row and schedules every node of that row as an
//! independent task, so recursion happens through the worker pool rather
//! than the call stack.

use crate::crawler::context::WorkerContext;
use crate::crawler::scheduler::panic_message;
use crate::crawler::transport::Response;
use crate::state::PageStatus;
use crate::tree::{CrawlNode, NodeId};
use crate::url::{normalized_key, request_path, resolve_link, Endpoint};
use crate::TransportError;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

/// Fetches one URL on the context's transport
fn fetch(ctx: &mut WorkerContext, url: &str) -> Result<Response, TransportError> {
    ctx.connect(url)?;
    let path = request_path(url).map_err(|e| TransportError::Request {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    ctx.get(&path)
}

fn mark_failed(node: &CrawlNode, response_code: u16) {
    let mut page = node.page_mut();
    page.response_code = response_code;
    page.status = PageStatus::Failed;
}

/// Downloads the node's page, following at most `max_redirects` redirects
///
/// On 301/302 the node's `target_url` is rewritten to the `Location`
/// target before the next hop. A 200 stores the body and marks the page
/// ready. Transport failures and any other status mark the page failed.
///
/// # Returns
///
/// `true` if the page content is now available
pub fn download_one(node: &CrawlNode, ctx: &mut WorkerContext) -> bool {
    let mut url = {
        let mut page = node.page_mut();
        page.status = PageStatus::Downloading;
        page.target_url.clone()
    };

    for _ in 0..=ctx.max_redirects() {
        let response = match fetch(ctx, &url) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", url, e);
                mark_failed(node, 0);
                return false;
            }
        };

        match response.status {
            200 => {
                let mut page = node.page_mut();
                page.response_code = 200;
                page.content = response.body;
                page.status = PageStatus::Ready;
                tracing::debug!("Downloaded {} ({} bytes)", url, page.content.len());
                return true;
            }
            code @ (301 | 302) => {
                let target = match (response.header("location"), ctx.endpoint()) {
                    (Some(location), Some(endpoint)) => resolve_link(endpoint, location),
                    _ => None,
                };
                let Some(target) = target else {
                    let e = TransportError::MissingLocation { url: url.clone() };
                    tracing::warn!("{}", e);
                    mark_failed(node, code);
                    return false;
                };

                tracing::debug!("{} redirected ({}) to {}", url, code, target);
                let mut page = node.page_mut();
                page.target_url = target.clone();
                page.response_code = code;
                url = target;
            }
            code => {
                tracing::debug!("GET {} returned {}", url, code);
                mark_failed(node, code);
                return false;
            }
        }
    }

    let e = TransportError::TooManyRedirects {
        url: node.target_url(),
    };
    tracing::warn!("{}", e);
    ctx.report_exception(&e.to_string());
    let code = node.page().response_code;
    mark_failed(node, code);
    false
}

/// Normalized URLs a page must not link back to: itself and its ancestors
fn excluded_links(node: &CrawlNode, ctx: &WorkerContext) -> HashSet<String> {
    std::iter::once(node.target_url())
        .chain(ctx.arena().ancestors(node.id()).map(|n| n.target_url()))
        .filter_map(|url| normalized_key(&url))
        .collect()
}

/// Downloads the page if needed, then runs the text and link patterns
///
/// Accepted links are charged to the shared link budget; the number the
/// budget granted is stored in `links_granted`. A panic inside the pattern
/// engine is reported and leaves the page parsed with no matches.
///
/// # Returns
///
/// `false` if the page could not be downloaded
pub fn grep_one(node: &CrawlNode, ctx: &mut WorkerContext) -> bool {
    if !node.page().page_ready() && !download_one(node, ctx) {
        return false;
    }

    let url = {
        let mut page = node.page_mut();
        page.status = PageStatus::Parsing;
        page.target_url.clone()
    };

    let excluded = excluded_links(node, ctx);
    let endpoint = Endpoint::from_url(&url).ok();

    let extracted = {
        let page = node.page();
        let patterns = ctx.patterns();
        panic::catch_unwind(AssertUnwindSafe(|| {
            let text = patterns.find_text(&page.content);
            let links = match &endpoint {
                Some(endpoint) => patterns.select_links(&page.content, endpoint, &excluded),
                None => Vec::new(),
            };
            (text, links)
        }))
    };

    let (text_matches, link_matches) = match extracted {
        Ok(matches) => matches,
        Err(panic) => {
            let message = format!("Extraction failed for {}: {}", url, panic_message(panic.as_ref()));
            tracing::error!("{}", message);
            ctx.report_exception(&message);
            (Vec::new(), Vec::new())
        }
    };

    let granted = node.budget().reserve(link_matches.len());
    {
        let mut page = node.page_mut();
        tracing::debug!(
            "Parsed {}: {} text matches, {} links ({} granted)",
            url,
            text_matches.len(),
            link_matches.len(),
            granted
        );
        page.text_matches = text_matches;
        page.link_matches = link_matches;
        page.links_granted = granted;
        page.status = PageStatus::Parsed;
    }

    ctx.on_page_parsed(node);
    true
}

/// The recursive crawl step, scheduled once per node
///
/// Parks the node while the crawl is suspended and when the link budget is
/// exhausted, so a later start can resume it. A parsed node that was granted
/// no links is parked as well and asks the budget again when it resumes.
/// Otherwise greps the page and schedules one task per granted link, one
/// level deeper.
pub fn download_grep_recursive(id: NodeId, ctx: &mut WorkerContext) {
    let Some(node) = ctx.arena().get(id) else {
        tracing::debug!("Node {} no longer exists", id);
        return;
    };

    if !ctx.is_running() {
        ctx.defer(download_grep_recursive, id);
        return;
    }

    let parsed = node.page().page_parsed();
    if !parsed && node.budget().exhausted() {
        ctx.on_max_links_reached(&node);
        ctx.defer(download_grep_recursive, id);
        return;
    }

    if !parsed && !grep_one(&node, ctx) {
        return;
    }

    if node.child().is_some() {
        return;
    }

    let (links, mut granted) = {
        let page = node.page();
        (page.link_matches.len(), page.links_granted)
    };
    if links == 0 {
        return;
    }
    if granted == 0 && parsed {
        // Parsed on an earlier run while the budget was spent
        granted = node.budget().reserve(links);
        node.page_mut().links_granted = granted;
    }
    if granted == 0 {
        ctx.on_max_links_reached(&node);
        ctx.defer(download_grep_recursive, id);
        return;
    }

    let endpoint = match Endpoint::from_url(&node.target_url()) {
        Ok(endpoint) => endpoint,
        Err(e) => {
            ctx.report_exception(&format!("Cannot spawn links of {}: {}", id, e));
            return;
        }
    };

    let arena = ctx.arena().clone();
    let child = match arena.spawn_child_node(id) {
        Ok(child) => child,
        Err(e) => {
            tracing::error!("Failed to spawn child row of {}: {}", id, e);
            ctx.report_exception(&e.to_string());
            return;
        }
    };

    let report = arena.spawn_grepped_subtasks(child, &endpoint, id);
    if let Some(e) = &report.failure {
        ctx.report_exception(&format!(
            "Spawned {} of {} links below {}: {}",
            report.spawned, granted, id, e
        ));
    }
    if report.spawned == 0 {
        return;
    }

    if let Some(head) = arena.get(child) {
        ctx.on_level_spawned(&head);
    }

    for spawned in arena.branch(child, true) {
        ctx.schedule_task(download_grep_recursive, spawned.id());
    }
}
