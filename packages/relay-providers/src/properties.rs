//! Option lists of CRM deal properties (deal type, "how did you hear about us"), cached with a TTL.

use std::{
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, Ordering},
	},
	time::{Duration, Instant},
};

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, bearer_headers, credential, fetch_json};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKind {
	DealType,
	HearAboutUs,
}
impl PropertyKind {
	/// Accepts `deal_type`/`deal-type` and `hear_about_us`/`hear-about-us`.
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_lowercase().replace('-', "_").as_str() {
			"deal_type" => Some(Self::DealType),
			"hear_about_us" => Some(Self::HearAboutUs),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::DealType => "deal_type",
			Self::HearAboutUs => "hear_about_us",
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyOption {
	pub label: Option<String>,
	pub value: Option<String>,
	pub hidden: bool,
	pub display_order: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PropertyChoice {
	pub label: String,
	pub value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PropertyDefinition {
	name: Option<String>,
	label: Option<String>,
	field_type: Option<String>,
	options: Vec<PropertyOption>,
}

#[derive(Debug, Default, Deserialize)]
struct PropertyList {
	#[serde(default)]
	results: Vec<PropertyDefinition>,
}

#[derive(Default)]
struct CachedOptions {
	options: Arc<Vec<PropertyOption>>,
	loaded_at: Option<Instant>,
	resolved_name: Option<(String, Instant)>,
}

#[derive(Default)]
struct OptionCache {
	loading: AtomicBool,
	state: Mutex<CachedOptions>,
}

struct LoadingFlag<'a>(&'a AtomicBool);
impl Drop for LoadingFlag<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

pub struct PropertyOptions {
	client: Client,
	api_base: String,
	token: Option<String>,
	cfg: relay_config::CrmProperties,
	label_max_chars: usize,
	deal_type: OptionCache,
	hear_about_us: OptionCache,
}
impl PropertyOptions {
	pub fn new(cfg: &relay_config::CrmSource, label_max_chars: usize) -> Result<Self> {
		Ok(Self {
			client: crate::http_client()?,
			api_base: cfg.api_base.clone(),
			token: cfg.token.clone(),
			cfg: cfg.properties.clone(),
			label_max_chars,
			deal_type: OptionCache::default(),
			hear_about_us: OptionCache::default(),
		})
	}

	pub fn is_configured(&self) -> bool {
		credential(self.token.as_ref()).is_some()
	}

	/// Filters the cached options by a lowercase substring of label or value.
	///
	/// Configured exclusions are dropped before the limit applies. An empty query returns all.
	pub async fn search(&self, kind: PropertyKind, raw_query: &str) -> Vec<PropertyChoice> {
		if !self.is_configured() {
			tracing::warn!(kind = kind.as_str(), "Property options skipped without a CRM token.");

			return Vec::new();
		}

		let query = raw_query.trim().to_lowercase();
		let excludes = match kind {
			PropertyKind::DealType => &self.cfg.deal_type_exclude,
			PropertyKind::HearAboutUs => &self.cfg.hear_about_us_exclude,
		};
		let options = self.options(kind).await;

		options
			.iter()
			.map(option_text)
			.filter(|(label, value)| {
				let label = label.to_lowercase();
				let value = value.to_lowercase();

				query.is_empty() || label.contains(&query) || value.contains(&query)
			})
			.filter(|(label, value)| {
				let combined = format!("{label} {value}").to_lowercase();

				!excludes.iter().any(|exclude| combined.contains(exclude.as_str()))
			})
			.take(self.cfg.max_options)
			.map(|(label, value)| PropertyChoice {
				label: label.chars().take(self.label_max_chars).collect(),
				value: value.chars().take(self.label_max_chars).collect(),
			})
			.collect()
	}

	/// Visible options sorted by display order. Serves the previous list while a refresh runs.
	pub async fn options(&self, kind: PropertyKind) -> Arc<Vec<PropertyOption>> {
		let cache = self.cache(kind);
		let ttl = Duration::from_secs(self.cfg.ttl_secs);

		{
			let state = cache.state.lock().unwrap_or_else(|err| err.into_inner());
			let fresh = state.loaded_at.is_some_and(|loaded_at| loaded_at.elapsed() < ttl);

			if fresh && !state.options.is_empty() {
				return state.options.clone();
			}
		}

		if cache.loading.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err()
		{
			return self.current(kind);
		}

		let _flag = LoadingFlag(&cache.loading);

		match self.load_options(kind).await {
			Ok(options) => {
				let mut state = cache.state.lock().unwrap_or_else(|err| err.into_inner());

				state.options = Arc::new(options);
				state.loaded_at = Some(Instant::now());
			},
			Err(err) => {
				tracing::warn!(kind = kind.as_str(), error = %err, "Property options failed to load.");
			},
		}

		self.current(kind)
	}

	fn current(&self, kind: PropertyKind) -> Arc<Vec<PropertyOption>> {
		self.cache(kind).state.lock().unwrap_or_else(|err| err.into_inner()).options.clone()
	}

	fn cache(&self, kind: PropertyKind) -> &OptionCache {
		match kind {
			PropertyKind::DealType => &self.deal_type,
			PropertyKind::HearAboutUs => &self.hear_about_us,
		}
	}

	fn override_name(&self, kind: PropertyKind) -> Option<&str> {
		let name = match kind {
			PropertyKind::DealType => self.cfg.deal_type_property.as_ref(),
			PropertyKind::HearAboutUs => self.cfg.hear_about_us_property.as_ref(),
		};

		credential(name)
	}

	async fn load_options(&self, kind: PropertyKind) -> Result<Vec<PropertyOption>> {
		let override_name = self.override_name(kind);
		let name = match override_name {
			Some(name) => name.to_string(),
			None => match self.resolve_name(kind).await? {
				Some(name) => name,
				None => {
					tracing::warn!(kind = kind.as_str(), "No matching deal property found.");

					return Ok(Vec::new());
				},
			},
		};

		match self.fetch_property(&name).await {
			Ok(options) => Ok(options),
			Err(err) if override_name.is_some() => {
				tracing::warn!(
					kind = kind.as_str(),
					property = %name,
					error = %err,
					"Configured deal property failed. Trying discovery."
				);

				match self.resolve_name(kind).await? {
					Some(discovered) if discovered != name => self.fetch_property(&discovered).await,
					_ => Err(err),
				}
			},
			Err(err) => Err(err),
		}
	}

	/// Discovers the property name from the deal schema, caching it for the TTL.
	async fn resolve_name(&self, kind: PropertyKind) -> Result<Option<String>> {
		let cache = self.cache(kind);
		let ttl = Duration::from_secs(self.cfg.ttl_secs);

		{
			let state = cache.state.lock().unwrap_or_else(|err| err.into_inner());

			if let Some((name, resolved_at)) = state.resolved_name.as_ref() {
				if resolved_at.elapsed() < ttl {
					return Ok(Some(name.clone()));
				}
			}
		}

		let list: PropertyList = fetch_json(
			self.client
				.get(format!("{}/crm/v3/properties/deals", self.api_base))
				.headers(bearer_headers(self.token()?)?),
			self.cfg.timeout_ms,
		)
		.await?;
		let resolved = match kind {
			PropertyKind::DealType => pick_deal_type(&list.results),
			PropertyKind::HearAboutUs => pick_hear_about_us(&list.results),
		};

		if let Some(name) = resolved.as_ref() {
			tracing::info!(kind = kind.as_str(), property = %name, "Resolved deal property.");

			cache.state.lock().unwrap_or_else(|err| err.into_inner()).resolved_name =
				Some((name.clone(), Instant::now()));
		}

		Ok(resolved)
	}

	async fn fetch_property(&self, name: &str) -> Result<Vec<PropertyOption>> {
		let definition: PropertyDefinition = fetch_json(
			self.client
				.get(format!("{}/crm/v3/properties/deals/{name}", self.api_base))
				.headers(bearer_headers(self.token()?)?),
			self.cfg.timeout_ms,
		)
		.await?;

		Ok(visible_sorted(definition.options))
	}

	fn token(&self) -> Result<&str> {
		credential(self.token.as_ref()).ok_or_else(|| Error::InvalidConfig {
			message: "sources.crm.token is not set.".to_string(),
		})
	}
}

/// Full label and value of an option; a blank side falls back to the other.
fn option_text(option: &PropertyOption) -> (String, String) {
	let label = option
		.label
		.clone()
		.filter(|label| !label.is_empty())
		.or_else(|| option.value.clone().filter(|value| !value.is_empty()))
		.unwrap_or_else(|| "Unknown".to_string());
	let value =
		option.value.clone().filter(|value| !value.is_empty()).unwrap_or_else(|| label.clone());

	(label, value)
}

fn visible_sorted(options: Vec<PropertyOption>) -> Vec<PropertyOption> {
	let mut visible: Vec<_> = options.into_iter().filter(|option| !option.hidden).collect();

	visible.sort_by_key(|option| option.display_order.unwrap_or(0));

	visible
}

fn lowered(value: Option<&String>) -> String {
	value.map(|value| value.trim().to_lowercase()).unwrap_or_default()
}

fn named(property: &PropertyDefinition) -> Option<String> {
	property.name.clone().filter(|name| !name.is_empty())
}

fn pick_deal_type(properties: &[PropertyDefinition]) -> Option<String> {
	properties
		.iter()
		.find(|property| lowered(property.label.as_ref()) == "deal type")
		.and_then(named)
		.or_else(|| {
			properties
				.iter()
				.find(|property| {
					matches!(lowered(property.name.as_ref()).as_str(), "dealtype" | "deal_type")
				})
				.and_then(named)
		})
		.or_else(|| {
			properties
				.iter()
				.find(|property| lowered(property.label.as_ref()).contains("deal type"))
				.and_then(named)
		})
		.or_else(|| {
			properties
				.iter()
				.find(|property| {
					lowered(property.field_type.as_ref()) == "select" && !property.options.is_empty()
				})
				.and_then(named)
		})
}

fn pick_hear_about_us(properties: &[PropertyDefinition]) -> Option<String> {
	properties
		.iter()
		.find(|property| lowered(property.label.as_ref()).contains("how did you hear"))
		.and_then(named)
		.or_else(|| {
			properties
				.iter()
				.find(|property| lowered(property.label.as_ref()).contains("hear about"))
				.and_then(named)
		})
		.or_else(|| {
			properties
				.iter()
				.find(|property| {
					let name = lowered(property.name.as_ref());

					name.contains("hear") && name.contains("about")
				})
				.and_then(named)
		})
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn definitions(value: serde_json::Value) -> Vec<PropertyDefinition> {
		serde_json::from_value::<PropertyList>(value).expect("Failed to parse properties.").results
	}

	#[test]
	fn parses_kinds() {
		assert_eq!(PropertyKind::parse("deal-type"), Some(PropertyKind::DealType));
		assert_eq!(PropertyKind::parse("Hear_About_Us"), Some(PropertyKind::HearAboutUs));
		assert_eq!(PropertyKind::parse("industry"), None);
	}

	#[test]
	fn deal_type_prefers_exact_label() {
		let properties = definitions(json!({
			"results": [
				{ "name": "dealtype", "label": "Pipeline type" },
				{ "name": "custom_deal_type", "label": "Deal Type" }
			]
		}));

		assert_eq!(pick_deal_type(&properties).as_deref(), Some("custom_deal_type"));
	}

	#[test]
	fn deal_type_falls_back_to_name_then_label_then_select() {
		let by_name = definitions(json!({
			"results": [
				{ "name": "other", "label": "Old deal type" },
				{ "name": "dealtype", "label": "Kind" }
			]
		}));
		let by_label = definitions(json!({
			"results": [{ "name": "x_type", "label": "Legacy deal type (old)" }]
		}));
		let by_select = definitions(json!({
			"results": [
				{ "name": "notes", "fieldType": "textarea" },
				{ "name": "empty_select", "fieldType": "select", "options": [] },
				{ "name": "stage", "fieldType": "select", "options": [{ "label": "A", "value": "a" }] }
			]
		}));

		assert_eq!(pick_deal_type(&by_name).as_deref(), Some("dealtype"));
		assert_eq!(pick_deal_type(&by_label).as_deref(), Some("x_type"));
		assert_eq!(pick_deal_type(&by_select).as_deref(), Some("stage"));
		assert_eq!(pick_deal_type(&[]), None);
	}

	#[test]
	fn hear_about_us_heuristics() {
		let by_label = definitions(json!({
			"results": [
				{ "name": "source", "label": "Where did you hear about us" },
				{ "name": "hdyhau", "label": "How did you hear about us?" }
			]
		}));
		let by_name = definitions(json!({
			"results": [{ "name": "hear_about", "label": "Referral" }]
		}));

		assert_eq!(pick_hear_about_us(&by_label).as_deref(), Some("hdyhau"));
		assert_eq!(pick_hear_about_us(&by_name).as_deref(), Some("hear_about"));
	}

	#[test]
	fn hidden_options_dropped_and_sorted() {
		let options = vec![
			PropertyOption { label: Some("B".into()), display_order: Some(2), ..Default::default() },
			PropertyOption { label: Some("H".into()), hidden: true, ..Default::default() },
			PropertyOption { label: Some("A".into()), display_order: Some(1), ..Default::default() },
		];
		let labels: Vec<_> =
			visible_sorted(options).into_iter().filter_map(|option| option.label).collect();

		assert_eq!(labels, vec!["A", "B"]);
	}
}
