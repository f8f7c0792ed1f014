use crate::output::Reporter;
use crate::tree::CrawlNode;

/// Reporter that turns every notification into a tracing event
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn on_page_parsed(&self, node: &CrawlNode) {
        let page = node.page();
        tracing::info!(
            url = %page.target_url,
            level = node.level(),
            code = page.response_code,
            text_matches = page.text_matches.len(),
            links = page.links_granted,
            "Page parsed"
        );
    }

    fn on_level_spawned(&self, node: &CrawlNode) {
        tracing::debug!(level = node.level(), head = %node.id(), "Spawned new level");
    }

    fn on_max_links_reached(&self, node: &CrawlNode) {
        let budget = node.budget();
        tracing::debug!(
            node = %node.id(),
            count = budget.count(),
            max = budget.max(),
            "Link budget reached"
        );
    }

    fn on_exception(&self, message: &str) {
        tracing::error!("{}", message);
    }
}
