//! Task-system client directory behind an OAuth2 client-credentials token.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::{Error, Result, bearer_headers, credential, fetch_json, page_timeout};
use relay_search::{BoxFuture, Page, PageRequest, Record, RecordId, RecordSource};

const SOURCE_NAME: &str = "tasks";
/// Tokens are refreshed this long before the upstream expiry.
const TOKEN_EXPIRY_MARGIN_SECS: f64 = 60.0;
const DEFAULT_TOKEN_TTL_SECS: f64 = 23.0 * 60.0 * 60.0;

#[derive(Debug, Deserialize)]
struct TokenResponse {
	access_token: Option<String>,
	#[serde(default)]
	expires_in: Value,
}

struct CachedToken {
	value: String,
	expires_at: Instant,
}

pub struct TaskClients {
	client: Client,
	cfg: relay_config::TasksSource,
	// Held across the token request so concurrent callers share one exchange.
	token: Mutex<Option<CachedToken>>,
}
impl TaskClients {
	pub fn new(cfg: &relay_config::TasksSource) -> Result<Self> {
		Ok(Self { client: crate::http_client()?, cfg: cfg.clone(), token: Mutex::new(None) })
	}

	/// Cached access token, exchanging credentials when it is missing or expired.
	pub async fn access_token(&self) -> Result<String> {
		let mut slot = self.token.lock().await;

		if let Some(token) = slot.as_ref().filter(|token| Instant::now() < token.expires_at) {
			return Ok(token.value.clone());
		}

		let (Some(client_id), Some(client_secret)) = (
			credential(self.cfg.client_id.as_ref()),
			credential(self.cfg.client_secret.as_ref()),
		) else {
			return Err(Error::InvalidConfig {
				message: "sources.tasks.client_id and client_secret must be set.".to_string(),
			});
		};
		let form = [
			("grant_type", "client_credentials"),
			("client_id", client_id),
			("client_secret", client_secret),
		];
		let response: TokenResponse = fetch_json(
			self.client.post(format!("{}/oauth/token", self.cfg.api_base)).form(&form),
			self.cfg.token_timeout_ms,
		)
		.await?;
		let value = response.access_token.filter(|token| !token.is_empty()).ok_or_else(|| {
			Error::InvalidResponse { message: "Token response is missing access_token.".to_string() }
		})?;
		let ttl = token_ttl(&response.expires_in);
		let now = Instant::now();
		let expires_at = now.checked_add(ttl).unwrap_or_else(|| now + default_token_ttl());

		tracing::debug!(source = SOURCE_NAME, ttl_secs = ttl.as_secs(), "Access token refreshed.");

		*slot = Some(CachedToken { value: value.clone(), expires_at });

		Ok(value)
	}

	async fn list(&self, request: PageRequest<'_>) -> Result<Page> {
		let offset = match request.cursor {
			Some(cursor) => cursor.parse::<usize>().map_err(|_| Error::InvalidResponse {
				message: format!("Client cursor {cursor:?} is not an offset."),
			})?,
			None => 0,
		};
		let token = self.access_token().await?;
		let timeout_ms =
			page_timeout(request.purpose, self.cfg.page_timeout_ms, self.cfg.warm_timeout_ms);
		let body: Value = fetch_json(
			self.client
				.get(format!("{}/api/clients", self.cfg.api_base))
				.headers(bearer_headers(&token)?)
				.query(&[("limit", request.page_size), ("offset", offset)]),
			timeout_ms,
		)
		.await?;
		let items = match body {
			Value::Array(items) => items,
			_ => Vec::new(),
		};
		let count = items.len();
		let next_cursor =
			(count > 0 && count >= request.page_size).then(|| (offset + count).to_string());
		let records = items
			.into_iter()
			.filter_map(|item| match item {
				Value::Object(map) => client_record(map),
				_ => None,
			})
			.collect();

		Ok(Page { records, next_cursor })
	}
}
impl RecordSource for TaskClients {
	fn name(&self) -> &str {
		SOURCE_NAME
	}

	fn is_configured(&self) -> bool {
		credential(self.cfg.client_id.as_ref()).is_some()
			&& credential(self.cfg.client_secret.as_ref()).is_some()
	}

	fn unnamed_label(&self) -> &str {
		"Unnamed client"
	}

	fn list_page<'a>(&'a self, request: PageRequest<'a>) -> BoxFuture<'a, relay_search::Result<Page>> {
		Box::pin(async move { self.list(request).await.map_err(|err| err.into_search(SOURCE_NAME)) })
	}
}

fn token_ttl(expires_in: &Value) -> Duration {
	let secs = match expires_in {
		Value::Number(number) => number.as_f64(),
		Value::String(raw) => raw.trim().parse::<f64>().ok(),
		_ => None,
	};
	match secs {
		Some(secs) if secs.is_finite() && secs > TOKEN_EXPIRY_MARGIN_SECS =>
			Duration::try_from_secs_f64(secs - TOKEN_EXPIRY_MARGIN_SECS)
				.unwrap_or_else(|_| default_token_ttl()),
		_ => default_token_ttl(),
	}
}

fn default_token_ttl() -> Duration {
	Duration::from_secs_f64(DEFAULT_TOKEN_TTL_SECS)
}

/// Flattens contacts and email lists into plain searchable fields.
///
/// Adds `contact_names`, `contact_emails`, `emails`, and `preferred_email`.
fn client_record(mut item: Map<String, Value>) -> Option<Record> {
	let id = RecordId::from_json(item.get("id")?)?;
	let mut contact_names = Vec::new();
	let mut contact_emails = Vec::new();
	let contacts = ["contacts", "contact", "primaryContact"]
		.into_iter()
		.find_map(|key| item.get(key).filter(|value| is_present(value)));

	for contact in contacts.into_iter().flat_map(as_items) {
		push_text(&mut contact_names, contact.get("name"));
		push_text(&mut contact_emails, contact.get("email"));
		push_text(&mut contact_emails, contact.get("primaryEmail"));
	}

	let mut emails = Vec::new();

	if let Some(Value::Array(values)) = ["emails", "emailAddresses"]
		.into_iter()
		.find_map(|key| item.get(key).filter(|value| is_present(value)))
	{
		for value in values {
			push_text(&mut emails, Some(value));
		}
	}

	let preferred_email = ["email", "primaryEmail", "contactEmail"]
		.into_iter()
		.find_map(|key| non_blank(item.get(key)))
		.or_else(|| emails.first().cloned());

	item.insert("contact_names".to_string(), strings(contact_names));
	item.insert("contact_emails".to_string(), strings(contact_emails));
	item.insert("emails".to_string(), strings(emails));
	item.insert(
		"preferred_email".to_string(),
		preferred_email.map(Value::String).unwrap_or(Value::Null),
	);

	Some(Record::from_json_fields(id, item))
}

fn is_present(value: &Value) -> bool {
	!matches!(value, Value::Null | Value::Bool(false))
		&& !matches!(value, Value::String(raw) if raw.is_empty())
}

fn as_items(value: &Value) -> Vec<&Map<String, Value>> {
	match value {
		Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
		Value::Object(map) => vec![map],
		_ => Vec::new(),
	}
}

fn non_blank(value: Option<&Value>) -> Option<String> {
	match value {
		Some(Value::String(raw)) if !raw.trim().is_empty() => Some(raw.clone()),
		_ => None,
	}
}

fn push_text(out: &mut Vec<String>, value: Option<&Value>) {
	if let Some(text) = non_blank(value) {
		out.push(text);
	}
}

fn strings(values: Vec<String>) -> Value {
	Value::Array(values.into_iter().map(Value::String).collect())
}
