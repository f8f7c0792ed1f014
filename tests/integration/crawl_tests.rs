//! End-to-end crawls over an in-memory site

use crate::support::{
    all_nodes, assert_tree_consistent, fanout_site, html_page, orchestrator, SiteConnector,
    IDLE_TIMEOUT,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use webgrep::crawler::Response;
use webgrep::state::PageStatus;
use webgrep::tree::CrawlNode;

#[test]
fn test_budget_bounds_the_tree() {
    let orchestrator = orchestrator(fanout_site(5), 4);

    assert!(orchestrator.start("http://site.test/", "needle", 50, 4));
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));

    let root = orchestrator.root().unwrap();
    assert_eq!(orchestrator.links_count(), 50);
    assert_eq!(orchestrator.arena().len(), 51);
    assert_tree_consistent(orchestrator.arena(), root);
}

#[test]
fn test_concurrent_workers_never_pass_the_budget() {
    for max_links in [7, 33, 120] {
        let orchestrator = orchestrator(fanout_site(6), 4);

        assert!(orchestrator.start("http://site.test/", "needle", max_links, 4));
        assert!(orchestrator.wait_idle(IDLE_TIMEOUT));

        assert!(orchestrator.links_count() <= orchestrator.max_links());
        assert_eq!(orchestrator.links_count(), max_links);
        assert_eq!(orchestrator.arena().len(), max_links + 1);
        assert_tree_consistent(orchestrator.arena(), orchestrator.root().unwrap());
    }
}

#[test]
fn test_raised_budget_resumes_held_back_pages() {
    let orchestrator = orchestrator(fanout_site(3), 4);

    assert!(orchestrator.start("http://site.test/", "needle", 1, 4));
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));
    assert_eq!(orchestrator.links_count(), 1);
    assert_eq!(orchestrator.arena().len(), 2);

    assert!(orchestrator.start("http://site.test/", "needle", 3, 4));
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));
    assert_eq!(orchestrator.links_count(), 3);
    assert_eq!(orchestrator.arena().len(), 4);

    let root = orchestrator.root().unwrap();
    let child = orchestrator.arena().get(root).unwrap().child().unwrap();
    assert_eq!(
        orchestrator.arena().get(child).unwrap().status(),
        PageStatus::Parsed
    );
    assert_tree_consistent(orchestrator.arena(), root);
}

#[test]
fn test_levels_follow_link_depth() {
    // One worker keeps the queue FIFO, so rows are parsed level by level.
    let orchestrator = orchestrator(fanout_site(2), 1);

    assert!(orchestrator.start("http://site.test/", "needle", 6, 1));
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));

    let stats = orchestrator.statistics();
    assert_eq!(stats.total_nodes, 7);
    assert_eq!(stats.depth_breakdown.get(&0), Some(&1));
    assert_eq!(stats.depth_breakdown.get(&1), Some(&2));
    assert_eq!(stats.depth_breakdown.get(&2), Some(&4));
    assert_tree_consistent(orchestrator.arena(), orchestrator.root().unwrap());
}

#[test]
fn test_back_links_never_repeat_an_ancestor() {
    // Every page links to the root, itself and both sections.
    let site = SiteConnector::new(|_url| {
        html_page(
            "loop",
            &[
                "/".to_string(),
                "/a.html".to_string(),
                "/b.html".to_string(),
            ],
        )
    });
    let orchestrator = orchestrator(site, 3);

    assert!(orchestrator.start("http://site.test/", "loop", 20, 3));
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));

    let root = orchestrator.root().unwrap();
    assert_tree_consistent(orchestrator.arena(), root);

    // The root only links on to the two sections.
    assert_eq!(orchestrator.arena().get(root).unwrap().child_count(), 2);
    assert!(orchestrator.links_count() <= 20);
}

#[test]
fn test_extension_policy_filters_links() {
    let site = SiteConnector::new(|url| {
        if url == "http://site.test/" {
            html_page(
                "root",
                &[
                    "/report.pdf".to_string(),
                    "/style.css".to_string(),
                    "/page.html".to_string(),
                    "/docs/".to_string(),
                    "/archive.xyz".to_string(),
                ],
            )
        } else {
            Response::new(200, "leaf")
        }
    });
    let orchestrator = orchestrator(site, 2);

    assert!(orchestrator.start("http://site.test/", "leaf", 100, 2));
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));

    let mut urls: Vec<String> = orchestrator
        .page_listing()
        .into_iter()
        .filter(|line| line.level == 1)
        .map(|line| line.url)
        .collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            "http://site.test/docs/".to_string(),
            "http://site.test/page.html".to_string(),
        ]
    );
}

#[test]
fn test_redirect_rewrites_target() {
    let site = SiteConnector::new(|url| match url {
        "http://site.test/" => Response::new(301, "").with_header("Location", "/home.html"),
        "http://site.test/home.html" => Response::new(200, "welcome home"),
        _ => Response::new(404, ""),
    });
    let orchestrator = orchestrator(site, 1);

    assert!(orchestrator.start("http://site.test/", "home", 10, 1));
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));

    let lines = orchestrator.page_listing();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].url, "http://site.test/home.html");
    assert_eq!(lines[0].response_code, 200);
    assert_eq!(lines[0].status, PageStatus::Parsed);
    assert_eq!(lines[0].text_matches, 1);
}

#[test]
fn test_redirect_loop_fails_page() {
    let site = SiteConnector::new(|_url| {
        Response::new(302, "").with_header("Location", "/again.html")
    });
    let orchestrator = orchestrator(site.clone(), 1);
    let exceptions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&exceptions);
    orchestrator.set_on_exception(move |_: &str| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(orchestrator.start("http://site.test/", "x", 10, 1));
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));

    let lines = orchestrator.page_listing();
    assert_eq!(lines[0].status, PageStatus::Failed);
    assert_eq!(exceptions.load(Ordering::SeqCst), 1);
    // The first request plus the default five redirect hops.
    assert_eq!(site.requests(), 6);
}

#[test]
fn test_stop_and_resume_completes_budget() {
    let orchestrator = orchestrator(fanout_site(4), 2);

    assert!(orchestrator.start("http://site.test/", "needle", 40, 2));
    orchestrator.stop();
    assert!(!orchestrator.is_running());

    assert!(orchestrator.start("http://site.test/", "needle", 40, 2));
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));

    let root = orchestrator.root().unwrap();
    assert_eq!(orchestrator.links_count(), 40);
    assert_eq!(orchestrator.arena().len(), 41);
    assert_tree_consistent(orchestrator.arena(), root);
}

#[test]
fn test_restart_after_completion_fetches_nothing() {
    let site = fanout_site(3);
    let orchestrator = orchestrator(site.clone(), 2);

    assert!(orchestrator.start("http://site.test/", "needle", 3, 2));
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));
    let requests = site.requests();
    let nodes = orchestrator.arena().len();

    assert!(orchestrator.restart(false));
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));
    assert_eq!(site.requests(), requests);
    assert_eq!(orchestrator.arena().len(), nodes);
}

#[test]
fn test_forced_rebuild_starts_over() {
    let site = fanout_site(3);
    let orchestrator = orchestrator(site.clone(), 2);

    assert!(orchestrator.start("http://site.test/", "needle", 3, 2));
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));
    let requests = site.requests();

    assert!(orchestrator.restart(true));
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));
    assert_eq!(orchestrator.links_count(), 3);
    assert!(site.requests() > requests);
    assert_eq!(orchestrator.arena().len(), 4);
    assert_tree_consistent(orchestrator.arena(), orchestrator.root().unwrap());
}

#[test]
fn test_resize_during_crawl() {
    let orchestrator = orchestrator(fanout_site(3), 1);

    assert!(orchestrator.start("http://site.test/", "needle", 30, 1));
    assert!(orchestrator.set_threads_number(4));
    assert_eq!(orchestrator.threads_count(), 4);
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));

    assert_eq!(orchestrator.links_count(), 30);
    assert_eq!(
        all_nodes(orchestrator.arena(), orchestrator.root().unwrap()).len(),
        31
    );
}

#[test]
fn test_callbacks_fire_per_page_and_level() {
    let orchestrator = orchestrator(fanout_site(2), 2);
    let parsed = Arc::new(AtomicUsize::new(0));
    let levels = Arc::new(AtomicUsize::new(0));

    let parsed_counter = Arc::clone(&parsed);
    orchestrator.set_on_page_parsed(move |node: &CrawlNode| {
        assert_eq!(node.status(), PageStatus::Parsed);
        parsed_counter.fetch_add(1, Ordering::SeqCst);
    });
    let level_counter = Arc::clone(&levels);
    orchestrator.set_on_level_spawned(move |_: &CrawlNode| {
        level_counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(orchestrator.start("http://site.test/", "needle", 2, 2));
    assert!(orchestrator.wait_idle(IDLE_TIMEOUT));

    // Root parsed and granted both links; the leaves are held back by the
    // spent budget.
    assert_eq!(parsed.load(Ordering::SeqCst), 1);
    assert_eq!(levels.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.lonely_count().0, 2);
}
