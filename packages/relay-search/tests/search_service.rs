use std::{
	collections::VecDeque,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use relay_config::{Search, SearchFields};
use relay_search::{
	BoxFuture, CacheState, Error, Page, PageRequest, Record, RecordId, RecordSource, Result,
	SearchConfig, SearchOverrides, SearchService, SourceHandle, WarmOutcome,
};

/// Serves a fixed record list, paginated by a numeric cursor, and counts calls.
struct StubSource {
	records: Vec<Record>,
	configured: bool,
	list_calls: AtomicUsize,
	direct: Option<Mutex<VecDeque<Result<Vec<Record>>>>>,
	direct_queries: Mutex<Vec<String>>,
}
impl StubSource {
	fn new(records: Vec<Record>) -> Self {
		Self {
			records,
			configured: true,
			list_calls: AtomicUsize::new(0),
			direct: None,
			direct_queries: Mutex::new(Vec::new()),
		}
	}

	fn with_direct(mut self, responses: Vec<Result<Vec<Record>>>) -> Self {
		self.direct = Some(Mutex::new(responses.into()));

		self
	}

	fn unconfigured(mut self) -> Self {
		self.configured = false;

		self
	}

	fn list_calls(&self) -> usize {
		self.list_calls.load(Ordering::SeqCst)
	}
}
impl RecordSource for StubSource {
	fn name(&self) -> &str {
		"stub"
	}

	fn is_configured(&self) -> bool {
		self.configured
	}

	fn unnamed_label(&self) -> &str {
		"Unnamed company"
	}

	fn list_page<'a>(&'a self, request: PageRequest<'a>) -> BoxFuture<'a, Result<Page>> {
		Box::pin(async move {
			self.list_calls.fetch_add(1, Ordering::SeqCst);

			let start: usize = request.cursor.and_then(|cursor| cursor.parse().ok()).unwrap_or(0);
			let end = (start + request.page_size).min(self.records.len());
			let records = self.records.get(start..end).unwrap_or_default().to_vec();
			let next_cursor = (end < self.records.len()).then(|| end.to_string());

			Ok(Page { records, next_cursor })
		})
	}

	fn direct_search<'a>(
		&'a self,
		query: &'a str,
		_config: &'a SearchConfig,
	) -> Option<BoxFuture<'a, Result<Vec<Record>>>> {
		let responses = self.direct.as_ref()?;

		Some(Box::pin(async move {
			self.direct_queries.lock().unwrap().push(query.to_string());

			responses.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
		}))
	}
}

fn company(id: &str, name: &str) -> Record {
	Record::new(RecordId::new(id)).with_field("name", name)
}

fn company_fields() -> SearchFields {
	SearchFields {
		search: vec!["name".to_string(), "domain".to_string()],
		display: Some("name".to_string()),
		secondary: Some("domain".to_string()),
	}
}

fn acme_directory() -> Vec<Record> {
	vec![
		company("1", "Acme Corp"),
		company("2", "Beta Acme Services"),
		company("3", "Unrelated"),
	]
}

fn service_with(source: Arc<StubSource>, cached: bool) -> SearchService {
	let mut handle = SourceHandle::new("companies", source, company_fields());

	if cached {
		handle = handle.cached();
	}

	SearchService::new(Search::default(), vec![handle]).expect("Failed to build service.")
}

fn values(options: &[relay_search::SearchOption]) -> Vec<&str> {
	options.iter().map(|option| option.value.as_str()).collect()
}

#[tokio::test]
async fn ranks_cached_prefix_match_above_substring_match() {
	let source = Arc::new(StubSource::new(acme_directory()));
	let service = service_with(source.clone(), true);

	assert_eq!(
		service.warm("companies").await.expect("Warm failed."),
		WarmOutcome::Loaded { records: 3, pages: 1 }
	);

	let options =
		service.search("companies", "acm", &SearchOverrides::default()).await.expect("Search failed.");

	assert_eq!(values(&options), vec!["1", "2"]);
	assert_eq!(options[0].label, "Acme Corp");
	// Cache hits suppress the live fallback; the only listing call was the warm.
	assert_eq!(source.list_calls(), 1);
}

#[tokio::test]
async fn empty_and_short_queries_make_no_upstream_calls() {
	let source = Arc::new(StubSource::new(acme_directory()).with_direct(Vec::new()));
	let service = service_with(source.clone(), true);

	for query in ["", "   ", "ac", "  ac \t"] {
		let options = service
			.search("companies", query, &SearchOverrides::default())
			.await
			.expect("Search failed.");

		assert!(options.is_empty(), "query {query:?} returned {options:?}");
	}

	tokio::task::yield_now().await;

	assert_eq!(source.list_calls(), 0);
	assert!(source.direct_queries.lock().unwrap().is_empty());
	assert_eq!(
		service.statuses()[0].cache.as_ref().map(|status| status.state),
		Some(CacheState::Empty)
	);
}

#[tokio::test]
async fn cold_source_returns_all_fallback_matches_ranked() {
	let mut records: Vec<Record> =
		(0..10).map(|id| company(&format!("other-{id}"), &format!("Other {id}"))).collect();

	records.extend([
		company("5", "Zeta Acme"),
		company("4", "Acme Holdings"),
		company("3", "Acme"),
		company("2", "Big Acme Group"),
		company("1", "Acme Corp"),
	]);

	let source = Arc::new(StubSource::new(records));
	let service = service_with(source.clone(), false);
	let options =
		service.search("companies", "acme", &SearchOverrides::default()).await.expect("Search failed.");

	assert_eq!(values(&options), vec!["3", "1", "4", "5", "2"]);
	assert_eq!(source.list_calls(), 1);
}

#[tokio::test]
async fn cold_cache_search_starts_a_background_warm() {
	let source = Arc::new(StubSource::new(acme_directory()));
	let service = service_with(source.clone(), true);
	let options =
		service.search("companies", "acme", &SearchOverrides::default()).await.expect("Search failed.");

	assert_eq!(values(&options), vec!["1", "2"]);

	let cache = service.handle("companies").expect("Missing source.").cache().expect("No cache.");
	let mut status = cache.subscribe();

	status.wait_for(|status| status.state == CacheState::Loaded).await.expect("Status closed.");

	assert_eq!(cache.status().record_count, 3);
}

#[tokio::test]
async fn direct_results_lead_and_dedupe_cache_hits() {
	let source = Arc::new(
		StubSource::new(acme_directory())
			.with_direct(vec![Ok(vec![company("2", "Beta Acme Services (direct)")])]),
	);
	let service = service_with(source.clone(), true);

	service.warm("companies").await.expect("Warm failed.");

	let records = service
		.search_records("companies", "acme", &SearchOverrides::default())
		.await
		.expect("Search failed.");

	assert_eq!(records.len(), 2);
	assert_eq!(records[0].id.as_str(), "1");
	assert_eq!(records[1].field_text("name"), "Beta Acme Services (direct)");
}

#[tokio::test]
async fn empty_multi_word_direct_search_retries_first_word() {
	let source = Arc::new(
		StubSource::new(Vec::new())
			.with_direct(vec![Ok(Vec::new()), Ok(vec![company("1", "Acme Corp")])]),
	);
	let service = service_with(source.clone(), false);
	let options = service
		.search("companies", "  acme   widgets ", &SearchOverrides::default())
		.await
		.expect("Search failed.");

	assert_eq!(values(&options), vec!["1"]);
	assert_eq!(*source.direct_queries.lock().unwrap(), vec!["acme widgets", "acme"]);
	// Direct hits suppress the live fallback.
	assert_eq!(source.list_calls(), 0);
}

#[tokio::test]
async fn failed_direct_search_falls_back_to_live_scan() {
	let source = Arc::new(
		StubSource::new(acme_directory())
			.with_direct(vec![Err(Error::upstream_status("stub", 500, "boom"))]),
	);
	let service = service_with(source.clone(), false);
	let options =
		service.search("companies", "acme", &SearchOverrides::default()).await.expect("Search failed.");

	assert_eq!(values(&options), vec!["1", "2"]);
	assert_eq!(source.direct_queries.lock().unwrap().len(), 1);
	assert_eq!(source.list_calls(), 1);
}

#[tokio::test]
async fn overrides_bypass_the_cache() {
	let source = Arc::new(StubSource::new(vec![
		company("1", "Acme Corp").with_field("owner", "Dana"),
		company("2", "Dana Labs"),
	]));
	let service = service_with(source.clone(), true);

	service.warm("companies").await.expect("Warm failed.");

	let overrides = SearchOverrides {
		search_fields: Some(vec!["owner".to_string()]),
		display_field: Some("owner".to_string()),
		secondary_field: Some(String::new()),
	};
	let options = service.search("companies", "dana", &overrides).await.expect("Search failed.");

	assert_eq!(values(&options), vec!["1"]);
	assert_eq!(options[0].label, "Dana");
	// One listing call for the warm, one for the live scan the overrides forced.
	assert_eq!(source.list_calls(), 2);
}

#[tokio::test]
async fn unconfigured_sources_return_nothing() {
	let source = Arc::new(StubSource::new(acme_directory()).unconfigured());
	let service = service_with(source.clone(), true);
	let options =
		service.search("companies", "acme", &SearchOverrides::default()).await.expect("Search failed.");

	assert!(options.is_empty());
	assert_eq!(source.list_calls(), 0);
	assert!(!service.trigger_warm("companies").expect("Unknown source."));
	assert!(!service.statuses()[0].configured);
}

#[tokio::test]
async fn unknown_sources_are_errors() {
	let service = service_with(Arc::new(StubSource::new(Vec::new())), false);
	let err = service
		.search("tickets", "acme", &SearchOverrides::default())
		.await
		.expect_err("Expected an unknown source error.");

	assert!(matches!(err, Error::UnknownSource { ref source_id } if source_id == "tickets"));
	assert!(service.trigger_warm("tickets").is_err());
}

#[tokio::test]
async fn duplicate_source_ids_are_rejected() {
	let source: Arc<StubSource> = Arc::new(StubSource::new(Vec::new()));
	let handles = vec![
		SourceHandle::new("companies", source.clone(), company_fields()),
		SourceHandle::new("companies", source, company_fields()),
	];

	assert!(matches!(
		SearchService::new(Search::default(), handles),
		Err(Error::Config { .. })
	));
}

#[tokio::test]
async fn trigger_warm_all_skips_uncached_sources() {
	let cached = Arc::new(StubSource::new(acme_directory()));
	let uncached = Arc::new(StubSource::new(acme_directory()));
	let service = SearchService::new(
		Search::default(),
		vec![
			SourceHandle::new("companies", cached, company_fields()).cached(),
			SourceHandle::new("client_software", uncached.clone(), company_fields()),
		],
	)
	.expect("Failed to build service.");

	assert_eq!(service.trigger_warm_all(), 1);

	let cache = service.handle("companies").expect("Missing source.").cache().expect("No cache.");

	cache
		.subscribe()
		.wait_for(|status| status.state == CacheState::Loaded)
		.await
		.expect("Status closed.");

	assert_eq!(uncached.list_calls(), 0);
	assert!(service.statuses()[1].cache.is_none());
}

#[tokio::test]
async fn warm_without_search_fields_never_pages() {
	let source = Arc::new(StubSource::new(acme_directory()));
	let fields = SearchFields { search: Vec::new(), ..company_fields() };
	let service = SearchService::new(
		Search::default(),
		vec![SourceHandle::new("companies", source.clone(), fields).cached()],
	)
	.expect("Failed to build service.");

	assert_eq!(service.warm("companies").await.expect("Warm failed."), WarmOutcome::NoFields);
	assert_eq!(source.list_calls(), 0);
}
