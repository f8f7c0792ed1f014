//! Integration tests for the crawler
//!
//! `crawl_tests` drive the orchestrator against an in-memory site;
//! `http_tests` go through the reqwest transport against wiremock servers.

mod crawl_tests;
mod http_tests;
mod support;
