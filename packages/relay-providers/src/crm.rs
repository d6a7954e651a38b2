//! CRM company directory: cursor-paginated listing plus the server-side multi-field search.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{Result, bearer_headers, credential, fetch_json, page_timeout};
use relay_search::{BoxFuture, Page, PageRequest, Record, RecordId, RecordSource, SearchConfig};

const SOURCE_NAME: &str = "crm";
const DIRECT_SEARCH_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
struct CompanyList {
	#[serde(default)]
	results: Vec<CompanyItem>,
	paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct CompanyItem {
	#[serde(default)]
	id: Value,
	#[serde(default)]
	properties: Map<String, Value>,
}
impl CompanyItem {
	fn into_record(self) -> Option<Record> {
		let id = RecordId::from_json(&self.id)?;

		Some(Record::from_json_fields(id, self.properties))
	}
}

#[derive(Debug, Deserialize)]
struct Paging {
	next: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
struct NextPage {
	after: Option<String>,
}

pub struct CrmCompanies {
	client: Client,
	cfg: relay_config::CrmSource,
}
impl CrmCompanies {
	pub fn new(cfg: &relay_config::CrmSource) -> Result<Self> {
		Ok(Self { client: crate::http_client()?, cfg: cfg.clone() })
	}

	fn token(&self) -> Result<&str> {
		credential(self.cfg.token.as_ref()).ok_or_else(|| crate::Error::InvalidConfig {
			message: "sources.crm.token is not set.".to_string(),
		})
	}

	async fn list(&self, request: PageRequest<'_>) -> Result<Page> {
		let url = format!("{}/crm/v3/objects/companies", self.cfg.api_base);
		let mut query = vec![("limit", request.page_size.to_string())];

		if let Some(after) = request.cursor {
			query.push(("after", after.to_string()));
		}
		if !request.fields.is_empty() {
			query.push(("properties", request.fields.join(",")));
		}

		let timeout_ms =
			page_timeout(request.purpose, self.cfg.page_timeout_ms, self.cfg.warm_timeout_ms);
		let list: CompanyList = fetch_json(
			self.client.get(url).headers(bearer_headers(self.token()?)?).query(&query),
			timeout_ms,
		)
		.await?;
		let next_cursor = list
			.paging
			.and_then(|paging| paging.next)
			.and_then(|next| next.after)
			.filter(|after| !after.is_empty());

		Ok(Page {
			records: list.results.into_iter().filter_map(CompanyItem::into_record).collect(),
			next_cursor,
		})
	}

	async fn search(&self, query: &str, config: &SearchConfig) -> Result<Vec<Record>> {
		let url = format!("{}/crm/v3/objects/companies/search", self.cfg.api_base);
		let body = search_body(query, config);
		let list: CompanyList = fetch_json(
			self.client.post(url).headers(bearer_headers(self.token()?)?).json(&body),
			self.cfg.search_timeout_ms,
		)
		.await?;

		Ok(list.results.into_iter().filter_map(CompanyItem::into_record).collect())
	}
}
impl RecordSource for CrmCompanies {
	fn name(&self) -> &str {
		SOURCE_NAME
	}

	fn is_configured(&self) -> bool {
		credential(self.cfg.token.as_ref()).is_some()
	}

	fn unnamed_label(&self) -> &str {
		"Unnamed company"
	}

	fn list_page<'a>(&'a self, request: PageRequest<'a>) -> BoxFuture<'a, relay_search::Result<Page>> {
		Box::pin(async move { self.list(request).await.map_err(|err| err.into_search(SOURCE_NAME)) })
	}

	fn direct_search<'a>(
		&'a self,
		query: &'a str,
		config: &'a SearchConfig,
	) -> Option<BoxFuture<'a, relay_search::Result<Vec<Record>>>> {
		Some(Box::pin(async move {
			self.search(query, config).await.map_err(|err| err.into_search(SOURCE_NAME))
		}))
	}
}

/// One `CONTAINS_TOKEN` filter group per search field; groups are OR-ed by the CRM.
fn search_body(query: &str, config: &SearchConfig) -> Value {
	let filter_groups: Vec<Value> = config
		.search_fields
		.iter()
		.map(|field| {
			serde_json::json!({
				"filters": [{ "propertyName": field, "operator": "CONTAINS_TOKEN", "value": query }],
			})
		})
		.collect();

	serde_json::json!({
		"filterGroups": filter_groups,
		"properties": config.requested_fields(),
		"limit": DIRECT_SEARCH_LIMIT,
	})
}
