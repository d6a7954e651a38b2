pub mod cache;
pub mod fallback;
pub mod rank;
pub mod record;
pub mod scoring;
pub mod service;
pub mod text;

mod error;
mod time_serde;

pub use cache::{CacheState, CacheStatus, SourceCache, WarmOptions, WarmOutcome};
pub use error::{Error, Result, is_transient_status};
pub use fallback::{FallbackOptions, LiveScan, StopReason};
pub use record::{FieldValue, Record, RecordId};
pub use scoring::{SearchConfig, SearchOverrides};
pub use service::{SearchOption, SearchService, SourceHandle, SourceStatus};

use std::{future::Future, pin::Pin};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which timeout class a page request belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchPurpose {
	/// Background cache sweep; long per-request timeout.
	Warm,
	/// Live fallback on the type-ahead path; short per-request timeout.
	Interactive,
}

#[derive(Clone, Copy, Debug)]
pub struct PageRequest<'a> {
	pub cursor: Option<&'a str>,
	pub page_size: usize,
	/// Field projection; empty means every field.
	pub fields: &'a [String],
	/// Normalized query a source may push down as a server-side contains filter.
	pub filter: Option<&'a str>,
	/// Fields the pushed-down filter should inspect.
	pub filter_fields: &'a [String],
	pub purpose: FetchPurpose,
}

#[derive(Debug, Default)]
pub struct Page {
	pub records: Vec<Record>,
	pub next_cursor: Option<String>,
}

/// The capability one external directory exposes to the search engine.
pub trait RecordSource
where
	Self: Send + Sync,
{
	/// Short name used in logs and errors.
	fn name(&self) -> &str;

	/// False when credentials or identifiers are missing.
	fn is_configured(&self) -> bool;

	fn unnamed_label(&self) -> &str {
		"Unnamed record"
	}

	fn list_page<'a>(&'a self, request: PageRequest<'a>) -> BoxFuture<'a, Result<Page>>;

	/// Server-side search run ahead of the cache. `None` when the source has no such endpoint.
	fn direct_search<'a>(
		&'a self,
		_query: &'a str,
		_config: &'a SearchConfig,
	) -> Option<BoxFuture<'a, Result<Vec<Record>>>> {
		None
	}
}
