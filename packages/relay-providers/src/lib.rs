pub mod crm;
pub mod properties;
pub mod sheets;
pub mod tasks;

mod error;

pub use crm::CrmCompanies;
pub use error::{Error, Result};
pub use properties::{PropertyChoice, PropertyKind, PropertyOptions};
pub use sheets::SheetTableSource;
pub use tasks::TaskClients;

use std::time::Duration;

use reqwest::{
	Client, RequestBuilder,
	header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::de::DeserializeOwned;

use relay_search::FetchPurpose;

pub fn http_client() -> Result<Client> {
	Ok(Client::builder().build()?)
}

pub fn bearer_headers(token: &str) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);

	Ok(headers)
}

/// Sends `request` with a per-request timeout and decodes a successful JSON body.
pub(crate) async fn fetch_json<T>(request: RequestBuilder, timeout_ms: u64) -> Result<T>
where
	T: DeserializeOwned,
{
	let res = request.timeout(Duration::from_millis(timeout_ms)).send().await?;

	Ok(res.error_for_status()?.json().await?)
}

pub(crate) fn page_timeout(purpose: FetchPurpose, interactive_ms: u64, warm_ms: u64) -> u64 {
	match purpose {
		FetchPurpose::Interactive => interactive_ms,
		FetchPurpose::Warm => warm_ms,
	}
}

/// Trimmed, non-empty credential value.
pub(crate) fn credential(value: Option<&String>) -> Option<&str> {
	value.map(|value| value.trim()).filter(|value| !value.is_empty())
}
