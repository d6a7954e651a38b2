//! Process-lifetime, memory-resident snapshot of one source's records.
//!
//! A warm replaces the snapshot only after a complete sweep. A failed sweep is discarded, so
//! lookups keep serving the last complete snapshot (or nothing, before the first success).

use std::sync::{
	Arc, RwLock,
	atomic::{AtomicBool, Ordering},
};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::watch;

use crate::{
	FetchPurpose, PageRequest, RecordSource, Result,
	record::Record,
	scoring::{self, SearchConfig},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
	/// Never loaded and not loading.
	Empty,
	/// A sweep is running; lookups serve the previous snapshot, if any.
	Loading,
	Loaded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
	pub state: CacheState,
	pub record_count: usize,
	#[serde(with = "crate::time_serde::option")]
	pub last_loaded_at: Option<OffsetDateTime>,
}

#[derive(Clone, Copy, Debug)]
pub struct WarmOptions {
	pub max_pages: usize,
	pub page_size: usize,
}
impl Default for WarmOptions {
	fn default() -> Self {
		Self { max_pages: 50, page_size: 100 }
	}
}
impl From<&relay_config::SearchWarm> for WarmOptions {
	fn from(cfg: &relay_config::SearchWarm) -> Self {
		Self { max_pages: cfg.max_pages, page_size: cfg.page_size }
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarmOutcome {
	Loaded { records: usize, pages: usize },
	AlreadyLoading,
	Unconfigured,
	NoFields,
	Failed,
}

#[derive(Debug, Default)]
struct Snapshot {
	records: Vec<Record>,
	loaded_at: Option<OffsetDateTime>,
}

pub struct SourceCache {
	loading: AtomicBool,
	snapshot: RwLock<Arc<Snapshot>>,
	status: watch::Sender<CacheStatus>,
}
impl SourceCache {
	pub fn new() -> Self {
		let (status, _) = watch::channel(CacheStatus {
			state: CacheState::Empty,
			record_count: 0,
			last_loaded_at: None,
		});

		Self { loading: AtomicBool::new(false), snapshot: RwLock::new(Arc::default()), status }
	}

	/// Runs one full pagination sweep unless another one is already in flight.
	///
	/// Pages project `config.requested_fields()`; a config without search fields is skipped.
	pub async fn warm(
		&self,
		source: &dyn RecordSource,
		config: &SearchConfig,
		options: WarmOptions,
	) -> WarmOutcome {
		if !source.is_configured() {
			tracing::debug!(source = source.name(), "Skipping warm for unconfigured source.");

			return WarmOutcome::Unconfigured;
		}
		if config.search_fields.is_empty() {
			tracing::warn!(source = source.name(), "Skipping warm without search fields.");

			return WarmOutcome::NoFields;
		}
		if self.loading.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err()
		{
			return WarmOutcome::AlreadyLoading;
		}

		let _guard = LoadingGuard { cache: self };

		self.publish_status();

		let fields = config.requested_fields();

		match sweep(source, &fields, options).await {
			Ok((records, pages)) => {
				let count = records.len();
				let snapshot =
					Snapshot { records, loaded_at: Some(OffsetDateTime::now_utc()) };

				*self.snapshot.write().unwrap_or_else(|err| err.into_inner()) = Arc::new(snapshot);

				tracing::info!(source = source.name(), records = count, pages, "Cache warmed.");

				WarmOutcome::Loaded { records: count, pages }
			},
			Err(err) => {
				tracing::warn!(
					source = source.name(),
					error = %err,
					"Cache warm failed. Keeping previous snapshot."
				);

				WarmOutcome::Failed
			},
		}
	}

	/// Records of the current snapshot that score above zero. Never triggers a warm.
	pub fn lookup(&self, query: &str, config: &SearchConfig) -> Vec<Record> {
		let snapshot = self.current();

		snapshot
			.records
			.iter()
			.filter(|record| scoring::score(record, query, config) > 0.0)
			.cloned()
			.collect()
	}

	pub fn state(&self) -> CacheState {
		if self.loading.load(Ordering::Acquire) {
			CacheState::Loading
		} else if self.current().loaded_at.is_some() {
			CacheState::Loaded
		} else {
			CacheState::Empty
		}
	}

	pub fn is_loaded(&self) -> bool {
		self.current().loaded_at.is_some()
	}

	pub fn status(&self) -> CacheStatus {
		let snapshot = self.current();

		CacheStatus {
			state: self.state(),
			record_count: snapshot.records.len(),
			last_loaded_at: snapshot.loaded_at,
		}
	}

	/// Status updates, published whenever a warm starts or finishes.
	pub fn subscribe(&self) -> watch::Receiver<CacheStatus> {
		self.status.subscribe()
	}

	fn current(&self) -> Arc<Snapshot> {
		self.snapshot.read().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn publish_status(&self) {
		self.status.send_replace(self.status());
	}
}
impl Default for SourceCache {
	fn default() -> Self {
		Self::new()
	}
}

struct LoadingGuard<'a> {
	cache: &'a SourceCache,
}
impl Drop for LoadingGuard<'_> {
	fn drop(&mut self) {
		self.cache.loading.store(false, Ordering::Release);
		self.cache.publish_status();
	}
}

async fn sweep(
	source: &dyn RecordSource,
	fields: &[String],
	options: WarmOptions,
) -> Result<(Vec<Record>, usize)> {
	let mut records = Vec::new();
	let mut cursor: Option<String> = None;
	let mut pages = 0;

	while pages < options.max_pages {
		let request = PageRequest {
			cursor: cursor.as_deref(),
			page_size: options.page_size,
			fields,
			filter: None,
			filter_fields: &[],
			purpose: FetchPurpose::Warm,
		};
		let page = source.list_page(request).await?;

		pages += 1;

		if page.records.is_empty() {
			break;
		}

		records.extend(page.records);

		match page.next_cursor {
			Some(next) => cursor = Some(next),
			None => break,
		}
	}

	Ok((records, pages))
}
