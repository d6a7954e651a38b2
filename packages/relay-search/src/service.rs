//! Search facade: composes direct search, cache lookup, live fallback, and merge-rank for each
//! registered source.

use std::sync::Arc;

use serde::Serialize;

use crate::{
	Error, RecordSource, Result,
	cache::{CacheState, CacheStatus, SourceCache, WarmOptions, WarmOutcome},
	fallback::{self, FallbackOptions},
	rank,
	record::{Record, RecordId},
	scoring::{SearchConfig, SearchOverrides},
	text,
};
use relay_config::SearchFields;

const LABEL_SEPARATOR: &str = " • ";

/// One registered source: its adapter, default fields, and optional cache.
pub struct SourceHandle {
	id: String,
	source: Arc<dyn RecordSource>,
	fields: SearchFields,
	default_config: SearchConfig,
	cache: Option<Arc<SourceCache>>,
	max_retries: u32,
}
impl SourceHandle {
	pub fn new(id: impl Into<String>, source: Arc<dyn RecordSource>, fields: SearchFields) -> Self {
		let default_config = SearchConfig::from_fields(&fields);

		Self { id: id.into(), source, fields, default_config, cache: None, max_retries: 0 }
	}

	pub fn cached(mut self) -> Self {
		self.cache = Some(Arc::new(SourceCache::new()));

		self
	}

	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn cache(&self) -> Option<&Arc<SourceCache>> {
		self.cache.as_ref()
	}

	pub fn default_config(&self) -> &SearchConfig {
		&self.default_config
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchOption {
	pub label: String,
	pub value: RecordId,
}

#[derive(Clone, Debug, Serialize)]
pub struct SourceStatus {
	pub id: String,
	pub name: String,
	pub configured: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cache: Option<CacheStatus>,
}

pub struct SearchService {
	cfg: relay_config::Search,
	sources: Vec<SourceHandle>,
}
impl SearchService {
	pub fn new(cfg: relay_config::Search, sources: Vec<SourceHandle>) -> Result<Self> {
		for (idx, handle) in sources.iter().enumerate() {
			if sources[..idx].iter().any(|other| other.id == handle.id) {
				return Err(Error::Config {
					message: format!("Source {} is registered twice.", handle.id),
				});
			}
		}

		Ok(Self { cfg, sources })
	}

	pub fn source_ids(&self) -> impl Iterator<Item = &str> {
		self.sources.iter().map(|handle| handle.id.as_str())
	}

	pub fn handle(&self, source_id: &str) -> Result<&SourceHandle> {
		self.sources
			.iter()
			.find(|handle| handle.id == source_id)
			.ok_or_else(|| Error::UnknownSource { source_id: source_id.to_string() })
	}

	/// Ranked chat options for `raw_query`. Fails only for an unknown source id.
	pub async fn search(
		&self,
		source_id: &str,
		raw_query: &str,
		overrides: &SearchOverrides,
	) -> Result<Vec<SearchOption>> {
		let handle = self.handle(source_id)?;
		let config = SearchConfig::resolve(&handle.fields, overrides);
		let records = self.ranked(handle, raw_query, &config, overrides.is_empty()).await;

		Ok(records
			.iter()
			.map(|record| {
				format_option(record, &config, handle.source.unnamed_label(), self.cfg.label_max_chars)
			})
			.collect())
	}

	/// Same pipeline as [`Self::search`], returning the ranked records themselves.
	pub async fn search_records(
		&self,
		source_id: &str,
		raw_query: &str,
		overrides: &SearchOverrides,
	) -> Result<Vec<Record>> {
		let handle = self.handle(source_id)?;
		let config = SearchConfig::resolve(&handle.fields, overrides);

		Ok(self.ranked(handle, raw_query, &config, overrides.is_empty()).await)
	}

	/// Starts a background warm when the source is cached, configured, and not already loading.
	pub fn trigger_warm(&self, source_id: &str) -> Result<bool> {
		let handle = self.handle(source_id)?;

		Ok(self.spawn_warm(handle))
	}

	pub fn trigger_warm_all(&self) -> usize {
		self.sources.iter().filter(|handle| self.spawn_warm(handle)).count()
	}

	/// Runs a warm to completion. Uncached sources report `Unconfigured`.
	pub async fn warm(&self, source_id: &str) -> Result<WarmOutcome> {
		let handle = self.handle(source_id)?;
		let Some(cache) = handle.cache.as_ref() else {
			return Ok(WarmOutcome::Unconfigured);
		};
		let options = WarmOptions::from(&self.cfg.warm);

		Ok(cache.warm(handle.source.as_ref(), &handle.default_config, options).await)
	}

	pub fn statuses(&self) -> Vec<SourceStatus> {
		self.sources
			.iter()
			.map(|handle| SourceStatus {
				id: handle.id.clone(),
				name: handle.source.name().to_string(),
				configured: handle.source.is_configured(),
				cache: handle.cache.as_ref().map(|cache| cache.status()),
			})
			.collect()
	}

	async fn ranked(
		&self,
		handle: &SourceHandle,
		raw_query: &str,
		config: &SearchConfig,
		default_config: bool,
	) -> Vec<Record> {
		let query = text::collapse_query(raw_query);

		if query.chars().count() < self.cfg.min_query_chars {
			return Vec::new();
		}
		if !handle.source.is_configured() {
			tracing::warn!(source = %handle.id, "Search skipped for unconfigured source.");

			return Vec::new();
		}
		if config.search_fields.is_empty() {
			tracing::warn!(source = %handle.id, "Search skipped without search fields.");

			return Vec::new();
		}

		let direct = self.direct_hits(handle, &query, config).await;
		let cache = handle.cache.as_ref().filter(|_| default_config);
		let mut cached = Vec::new();

		if let Some(cache) = cache {
			if cache.state() == CacheState::Empty {
				self.spawn_warm(handle);
			}

			cached = cache.lookup(&query, config);
		}

		let mut live = Vec::new();

		if direct.is_empty() && cached.is_empty() {
			let options = FallbackOptions::from_config(&self.cfg.fallback, handle.max_retries);

			live = fallback::fetch_live(handle.source.as_ref(), &query, config, options).await.matches;
		}

		let (direct_count, cache_count, live_count) = (direct.len(), cached.len(), live.len());

		cached.extend(live);

		let merged = rank::merge_rank(direct, cached, &query, config, self.cfg.result_limit);

		tracing::info!(
			source = %handle.id,
			query = %query,
			direct = direct_count,
			cache = cache_count,
			fallback = live_count,
			combined = merged.len(),
			"Search completed."
		);

		merged
	}

	/// Server-side search; a multi-word query that finds nothing is retried with its first word.
	async fn direct_hits(
		&self,
		handle: &SourceHandle,
		query: &str,
		config: &SearchConfig,
	) -> Vec<Record> {
		let hits = run_direct(handle, query, config).await;

		if !hits.is_empty() || !query.contains(' ') {
			return hits;
		}

		match query.split(' ').next() {
			Some(first_word) if !first_word.is_empty() => run_direct(handle, first_word, config).await,
			_ => hits,
		}
	}

	fn spawn_warm(&self, handle: &SourceHandle) -> bool {
		let Some(cache) = handle.cache.clone() else {
			return false;
		};

		if !handle.source.is_configured() || cache.state() == CacheState::Loading {
			return false;
		}

		let source = handle.source.clone();
		let config = handle.default_config.clone();
		let options = WarmOptions::from(&self.cfg.warm);

		tokio::spawn(async move {
			cache.warm(source.as_ref(), &config, options).await;
		});

		true
	}
}

async fn run_direct(handle: &SourceHandle, query: &str, config: &SearchConfig) -> Vec<Record> {
	let Some(search) = handle.source.direct_search(query, config) else {
		return Vec::new();
	};

	match search.await {
		Ok(records) => records,
		Err(err) => {
			tracing::warn!(source = %handle.id, query, error = %err, "Direct search failed.");

			Vec::new()
		},
	}
}

/// Builds `title` or `title • secondary`, truncated to `max_chars` characters.
pub fn format_option(
	record: &Record,
	config: &SearchConfig,
	unnamed_label: &str,
	max_chars: usize,
) -> SearchOption {
	let title = record.field_text(&config.display_field);
	let title = if title.trim().is_empty() { unnamed_label.to_string() } else { title };
	let secondary = config
		.secondary_field
		.as_deref()
		.map(|field| record.field_text(field))
		.filter(|text| !text.trim().is_empty());
	let label = match secondary {
		Some(secondary) => format!("{title}{LABEL_SEPARATOR}{secondary}"),
		None => title,
	};

	SearchOption { label: label.chars().take(max_chars).collect(), value: record.id.clone() }
}
