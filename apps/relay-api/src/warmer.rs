use std::{sync::Arc, time::Duration};

use relay_search::SearchService;

/// Re-warms every cached source on a fixed interval. Sources already loading are skipped.
pub async fn run(search: Arc<SearchService>, interval: Duration) {
	loop {
		let triggered = search.trigger_warm_all();

		tracing::debug!(triggered, "Scheduled cache warm.");

		tokio::time::sleep(interval).await;
	}
}
