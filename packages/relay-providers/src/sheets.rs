//! Spreadsheet tables. Each configured table is its own source.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{Result, bearer_headers, credential, fetch_json, page_timeout};
use relay_search::{BoxFuture, Page, PageRequest, Record, RecordId, RecordSource};

#[derive(Debug, Deserialize)]
struct RecordList {
	#[serde(default)]
	records: Vec<SheetRecord>,
	offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SheetRecord {
	#[serde(default)]
	id: Value,
	#[serde(default)]
	fields: Map<String, Value>,
}

pub struct SheetTableSource {
	client: Client,
	name: String,
	api_base: String,
	token: Option<String>,
	base_id: Option<String>,
	table_id: String,
	page_timeout_ms: u64,
	warm_timeout_ms: u64,
}
impl SheetTableSource {
	pub fn new(cfg: &relay_config::SheetsSource, table: &relay_config::SheetTable) -> Result<Self> {
		Ok(Self {
			client: crate::http_client()?,
			name: table.id.clone(),
			api_base: cfg.api_base.clone(),
			token: cfg.token.clone(),
			base_id: cfg.base_id.clone(),
			table_id: table.table_id.trim().to_string(),
			page_timeout_ms: cfg.page_timeout_ms,
			warm_timeout_ms: cfg.warm_timeout_ms,
		})
	}

	async fn list(&self, request: PageRequest<'_>) -> Result<Page> {
		let (Some(token), Some(base_id)) =
			(credential(self.token.as_ref()), credential(self.base_id.as_ref()))
		else {
			return Err(crate::Error::InvalidConfig {
				message: "sources.sheets.token and base_id must be set.".to_string(),
			});
		};
		let url = format!("{}/v0/{}/{}", self.api_base, base_id, self.table_id);
		let mut query = vec![("pageSize", request.page_size.to_string())];

		if let Some(offset) = request.cursor {
			query.push(("offset", offset.to_string()));
		}
		for field in request.fields {
			query.push(("fields[]", field.clone()));
		}
		if let Some(formula) =
			request.filter.and_then(|filter| contains_formula(request.filter_fields, filter))
		{
			query.push(("filterByFormula", formula));
		}

		let timeout_ms = page_timeout(request.purpose, self.page_timeout_ms, self.warm_timeout_ms);
		let list: RecordList = fetch_json(
			self.client.get(url).headers(bearer_headers(token)?).query(&query),
			timeout_ms,
		)
		.await?;
		let records = list
			.records
			.into_iter()
			.filter_map(|record| {
				RecordId::from_json(&record.id).map(|id| Record::from_json_fields(id, record.fields))
			})
			.collect();

		Ok(Page { records, next_cursor: list.offset.filter(|offset| !offset.is_empty()) })
	}
}
impl RecordSource for SheetTableSource {
	fn name(&self) -> &str {
		&self.name
	}

	fn is_configured(&self) -> bool {
		credential(self.token.as_ref()).is_some()
			&& credential(self.base_id.as_ref()).is_some()
			&& !self.table_id.is_empty()
	}

	fn list_page<'a>(&'a self, request: PageRequest<'a>) -> BoxFuture<'a, relay_search::Result<Page>> {
		Box::pin(async move { self.list(request).await.map_err(|err| err.into_search(&self.name)) })
	}
}

/// Server-side case-insensitive contains filter OR-ed across `fields`.
///
/// The value is escaped twice: once for the regex, then for the formula's string literal.
pub fn contains_formula(fields: &[String], value: &str) -> Option<String> {
	let raw = value.trim().to_lowercase();

	if raw.is_empty() || fields.is_empty() {
		return None;
	}

	let escaped = regex::escape(&raw).replace('\\', "\\\\").replace('"', "\\\"");
	let parts: Vec<String> = fields
		.iter()
		.map(|field| format!("REGEX_MATCH(LOWER({{{field}}}), \"{escaped}\")"))
		.collect();

	if parts.len() == 1 { parts.into_iter().next() } else { Some(format!("OR({})", parts.join(","))) }
}
