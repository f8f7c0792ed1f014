//! Crawls over real HTTP against wiremock servers
//!
//! Workers are plain threads that block on the test runtime, so these tests
//! need the multi-threaded flavor and must wait off the async workers.

use crate::support::IDLE_TIMEOUT;
use std::sync::Arc;
use webgrep::config::Config;
use webgrep::crawler::HttpConnector;
use webgrep::state::PageStatus;
use webgrep::CrawlOrchestrator;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_orchestrator(threads: usize) -> Arc<CrawlOrchestrator> {
    let mut config = Config::default();
    config.crawler.threads = threads;
    config.http.timeout_secs = 5;
    let connector =
        HttpConnector::new(&config.http, tokio::runtime::Handle::current()).unwrap();
    Arc::new(CrawlOrchestrator::new(&config, Arc::new(connector)).unwrap())
}

async fn wait_idle(orchestrator: &Arc<CrawlOrchestrator>) -> bool {
    let waiter = Arc::clone(orchestrator);
    tokio::task::spawn_blocking(move || waiter.wait_idle(IDLE_TIMEOUT))
        .await
        .unwrap()
}

async fn shutdown(orchestrator: Arc<CrawlOrchestrator>) {
    tokio::task::spawn_blocking(move || drop(orchestrator))
        .await
        .unwrap();
}

async fn mount_page(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_http_crawl_collects_matches() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        200,
        r#"<html><body>rust is here
        <a href="/one.html">one</a>
        <a href="/two.html">two</a>
        </body></html>"#,
    )
    .await;
    mount_page(&server, "/one.html", 200, "rust and more rust").await;
    mount_page(&server, "/two.html", 200, "nothing relevant").await;

    let orchestrator = http_orchestrator(2);
    let seed = format!("{}/", server.uri());
    assert!(orchestrator.start(&seed, "rust", 10, 2));
    assert!(wait_idle(&orchestrator).await);

    let stats = orchestrator.statistics();
    assert_eq!(stats.total_nodes, 3);
    assert_eq!(stats.count(PageStatus::Parsed), 3);
    assert_eq!(stats.text_matches, 3);
    assert_eq!(orchestrator.links_count(), 2);

    let listing = orchestrator.page_listing();
    assert_eq!(listing[0].url, seed);
    assert_eq!(listing[0].response_code, 200);

    shutdown(orchestrator).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_http_redirect_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/landing.html"))
        .mount(&server)
        .await;
    mount_page(&server, "/landing.html", 200, "landed").await;

    let orchestrator = http_orchestrator(1);
    assert!(orchestrator.start(&format!("{}/", server.uri()), "landed", 10, 1));
    assert!(wait_idle(&orchestrator).await);

    let listing = orchestrator.page_listing();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].url, format!("{}/landing.html", server.uri()));
    assert_eq!(listing[0].status, PageStatus::Parsed);
    assert_eq!(listing[0].text_matches, 1);

    shutdown(orchestrator).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_http_missing_page_fails() {
    let server = MockServer::start().await;
    mount_page(&server, "/", 200, r#"<a href="/gone.html">gone</a>"#).await;

    let orchestrator = http_orchestrator(2);
    assert!(orchestrator.start(&format!("{}/", server.uri()), "gone", 10, 2));
    assert!(wait_idle(&orchestrator).await);

    let listing = orchestrator.page_listing();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[1].url, format!("{}/gone.html", server.uri()));
    assert_eq!(listing[1].response_code, 404);
    assert_eq!(listing[1].status, PageStatus::Failed);

    shutdown(orchestrator).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_http_unreachable_seed_fails() {
    // Nothing listens on the discard port.
    let orchestrator = http_orchestrator(1);
    assert!(orchestrator.start("http://127.0.0.1:9/", "x", 10, 1));
    assert!(wait_idle(&orchestrator).await);

    let listing = orchestrator.page_listing();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].status, PageStatus::Failed);
    assert_eq!(listing[0].response_code, 0);

    shutdown(orchestrator).await;
}
