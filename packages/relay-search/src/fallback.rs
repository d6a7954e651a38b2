use std::time::{Duration, Instant};

use crate::{
	FetchPurpose, Page, PageRequest, RecordSource, Result,
	record::Record,
	scoring::{self, SearchConfig},
	text,
};

#[derive(Clone, Copy, Debug)]
pub struct FallbackOptions {
	pub min_matches: usize,
	pub page_size: usize,
	pub max_millis: u64,
	/// Extra attempts per page after a transient failure.
	pub max_retries: u32,
}
impl FallbackOptions {
	pub fn from_config(cfg: &relay_config::SearchFallback, max_retries: u32) -> Self {
		Self {
			min_matches: cfg.min_matches,
			page_size: cfg.page_size,
			max_millis: cfg.max_millis,
			max_retries,
		}
	}
}
impl Default for FallbackOptions {
	fn default() -> Self {
		Self { min_matches: 7, page_size: 100, max_millis: 1_200, max_retries: 0 }
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
	/// Empty page or no further cursor.
	Exhausted,
	MinMatches,
	Deadline,
	/// A page failed after its retries; matches gathered so far are kept.
	Failed,
}

#[derive(Debug)]
pub struct LiveScan {
	pub matches: Vec<Record>,
	pub pages: usize,
	pub stop: StopReason,
}

/// Scans the source page by page for records matching `query`, bounded by a wall-clock budget.
///
/// The deadline is checked before each page only. An in-flight request is never cancelled.
pub async fn fetch_live(
	source: &dyn RecordSource,
	query: &str,
	config: &SearchConfig,
	options: FallbackOptions,
) -> LiveScan {
	let started = Instant::now();
	let budget = Duration::from_millis(options.max_millis);
	let filter = text::normalize(query);
	let fields = config.requested_fields();
	let mut matches = Vec::new();
	let mut cursor: Option<String> = None;
	let mut pages = 0;
	let stop = loop {
		if started.elapsed() >= budget {
			tracing::info!(
				source = source.name(),
				query,
				matches = matches.len(),
				pages,
				"Live fallback hit its time budget. Returning partial matches."
			);

			break StopReason::Deadline;
		}

		let request = PageRequest {
			cursor: cursor.as_deref(),
			page_size: options.page_size,
			fields: &fields,
			filter: Some(&filter),
			filter_fields: &config.search_fields,
			purpose: FetchPurpose::Interactive,
		};
		let page = match fetch_page(source, request, options.max_retries).await {
			Ok(page) => page,
			Err(err) => {
				tracing::warn!(
					source = source.name(),
					query,
					matches = matches.len(),
					error = %err,
					"Live fallback page failed. Returning partial matches."
				);

				break StopReason::Failed;
			},
		};

		pages += 1;

		if page.records.is_empty() {
			break StopReason::Exhausted;
		}

		matches.extend(
			page.records.into_iter().filter(|record| scoring::score(record, query, config) > 0.0),
		);

		if matches.len() >= options.min_matches {
			break StopReason::MinMatches;
		}

		match page.next_cursor {
			Some(next) => cursor = Some(next),
			None => break StopReason::Exhausted,
		}
	};

	LiveScan { matches, pages, stop }
}

async fn fetch_page(
	source: &dyn RecordSource,
	request: PageRequest<'_>,
	max_retries: u32,
) -> Result<Page> {
	let mut attempt = 0;

	loop {
		match source.list_page(request).await {
			Ok(page) => return Ok(page),
			Err(err) if err.is_transient() && attempt < max_retries => {
				attempt += 1;

				tracing::warn!(
					source = source.name(),
					attempt,
					error = %err,
					"Retrying transient page failure."
				);
			},
			Err(err) => return Err(err),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	};

	use super::*;
	use crate::{BoxFuture, Error, record::RecordId};

	fn config() -> SearchConfig {
		SearchConfig {
			search_fields: vec!["name".to_string()],
			display_field: "name".to_string(),
			secondary_field: None,
		}
	}

	fn named(id: usize, name: &str) -> Record {
		Record::new(RecordId::new(id.to_string())).with_field("name", name)
	}

	/// Replays scripted page results in order and records what it was asked for.
	struct ScriptedSource {
		pages: Mutex<Vec<Result<Page>>>,
		calls: AtomicUsize,
		filters: Mutex<Vec<Option<String>>>,
		delay: Duration,
	}
	impl ScriptedSource {
		fn new(pages: Vec<Result<Page>>) -> Self {
			Self {
				pages: Mutex::new(pages.into_iter().rev().collect()),
				calls: AtomicUsize::new(0),
				filters: Mutex::new(Vec::new()),
				delay: Duration::ZERO,
			}
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl RecordSource for ScriptedSource {
		fn name(&self) -> &str {
			"scripted"
		}

		fn is_configured(&self) -> bool {
			true
		}

		fn list_page<'a>(&'a self, request: PageRequest<'a>) -> BoxFuture<'a, Result<Page>> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);
				self.filters.lock().unwrap().push(request.filter.map(str::to_string));

				if !self.delay.is_zero() {
					tokio::time::sleep(self.delay).await;
				}

				self.pages.lock().unwrap().pop().unwrap_or_else(|| Ok(Page::default()))
			})
		}
	}

	fn page(records: Vec<Record>, next: Option<&str>) -> Result<Page> {
		Ok(Page { records, next_cursor: next.map(str::to_string) })
	}

	fn acme_page(start: usize, count: usize, next: Option<&str>) -> Result<Page> {
		let records = (start..start + count).map(|id| named(id, &format!("Acme {id}"))).collect();

		page(records, next)
	}

	#[tokio::test]
	async fn stops_once_min_matches_reached() {
		let source = ScriptedSource::new(vec![
			acme_page(0, 4, Some("p2")),
			acme_page(4, 4, Some("p3")),
			acme_page(8, 4, None),
		]);
		let scan = fetch_live(&source, "acme", &config(), FallbackOptions::default()).await;

		assert_eq!(scan.stop, StopReason::MinMatches);
		assert_eq!(scan.matches.len(), 8);
		assert_eq!(scan.pages, 2);
		assert_eq!(source.calls(), 2);
	}

	#[tokio::test]
	async fn keeps_only_matching_records() {
		let source = ScriptedSource::new(vec![page(
			vec![named(1, "Acme Corp"), named(2, "Unrelated"), named(3, "Beta Acme")],
			None,
		)]);
		let scan = fetch_live(&source, "Acme", &config(), FallbackOptions::default()).await;
		let ids: Vec<_> = scan.matches.iter().map(|record| record.id.as_str()).collect();

		assert_eq!(scan.stop, StopReason::Exhausted);
		assert_eq!(ids, vec!["1", "3"]);
		assert_eq!(source.filters.lock().unwrap().as_slice(), &[Some("acme".to_string())]);
	}

	#[tokio::test]
	async fn empty_page_ends_scan() {
		let source = ScriptedSource::new(vec![page(Vec::new(), Some("p2"))]);
		let scan = fetch_live(&source, "acme", &config(), FallbackOptions::default()).await;

		assert_eq!(scan.stop, StopReason::Exhausted);
		assert_eq!(scan.pages, 1);
		assert!(scan.matches.is_empty());
	}

	#[tokio::test]
	async fn zero_budget_fetches_nothing() {
		let source = ScriptedSource::new(vec![acme_page(0, 4, None)]);
		let options = FallbackOptions { max_millis: 0, ..FallbackOptions::default() };
		let scan = fetch_live(&source, "acme", &config(), options).await;

		assert_eq!(scan.stop, StopReason::Deadline);
		assert_eq!(scan.pages, 0);
		assert_eq!(source.calls(), 0);
	}

	#[tokio::test]
	async fn deadline_returns_partial_matches() {
		let mut source =
			ScriptedSource::new(vec![acme_page(0, 2, Some("p2")), acme_page(2, 2, Some("p3"))]);

		source.delay = Duration::from_millis(60);

		let options = FallbackOptions { max_millis: 50, ..FallbackOptions::default() };
		let scan = fetch_live(&source, "acme", &config(), options).await;

		assert_eq!(scan.stop, StopReason::Deadline);
		assert_eq!(scan.pages, 1);
		assert_eq!(scan.matches.len(), 2);
	}

	#[tokio::test]
	async fn retries_transient_failures() {
		let source = ScriptedSource::new(vec![
			Err(Error::upstream_status("scripted", 503, "unavailable")),
			acme_page(0, 2, None),
		]);
		let options = FallbackOptions { max_retries: 1, ..FallbackOptions::default() };
		let scan = fetch_live(&source, "acme", &config(), options).await;

		assert_eq!(scan.stop, StopReason::Exhausted);
		assert_eq!(scan.matches.len(), 2);
		assert_eq!(source.calls(), 2);
	}

	#[tokio::test]
	async fn does_not_retry_permanent_failures() {
		let source = ScriptedSource::new(vec![
			acme_page(0, 2, Some("p2")),
			Err(Error::upstream_status("scripted", 404, "missing")),
			acme_page(2, 2, None),
		]);
		let options = FallbackOptions { max_retries: 3, ..FallbackOptions::default() };
		let scan = fetch_live(&source, "acme", &config(), options).await;

		assert_eq!(scan.stop, StopReason::Failed);
		assert_eq!(scan.matches.len(), 2);
		assert_eq!(source.calls(), 2);
	}

	#[tokio::test]
	async fn gives_up_after_retry_budget() {
		let source = ScriptedSource::new(vec![
			Err(Error::upstream_status("scripted", 429, "slow down")),
			Err(Error::upstream_status("scripted", 429, "slow down")),
			acme_page(0, 2, None),
		]);
		let options = FallbackOptions { max_retries: 1, ..FallbackOptions::default() };
		let scan = fetch_live(&source, "acme", &config(), options).await;

		assert_eq!(scan.stop, StopReason::Failed);
		assert!(scan.matches.is_empty());
		assert_eq!(source.calls(), 2);
	}
}
