use serde::Deserialize;

use crate::{
	record::Record,
	text::{normalize, tokenize},
};
use relay_config::SearchFields;

const EXACT_BONUS: f64 = 100.0;
const PREFIX_BONUS: f64 = 90.0;
const TOKEN_PREFIX_BONUS: f64 = 80.0;
const SUBSTRING_BONUS: f64 = 70.0;
const SECONDARY_PREFIX_BONUS: f64 = 60.0;
const SECONDARY_SUBSTRING_BONUS: f64 = 50.0;
const TOKEN_COVERAGE_BONUS: f64 = 10.0;
const LENGTH_BONUS_CEILING: f64 = 20.0;
const LENGTH_BONUS_DIVISOR: f64 = 5.0;

/// Which fields participate in scoring, ranking, and option labels for one search call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchConfig {
	pub search_fields: Vec<String>,
	pub display_field: String,
	pub secondary_field: Option<String>,
}
impl SearchConfig {
	/// Resolves the process-wide default for a source from its configured fields.
	pub fn from_fields(fields: &SearchFields) -> Self {
		Self::resolve(fields, &SearchOverrides::default())
	}

	pub fn resolve(fields: &SearchFields, overrides: &SearchOverrides) -> Self {
		let search_fields = overrides.search_fields.clone().unwrap_or_else(|| fields.search.clone());
		let display_field = match overrides.display_field.as_deref() {
			Some(display) => display.to_string(),
			None => fields
				.display
				.clone()
				.or_else(|| search_fields.first().cloned())
				.unwrap_or_default(),
		};
		let secondary_field = match overrides.secondary_field.as_deref() {
			Some(secondary) if secondary.is_empty() => None,
			Some(secondary) => Some(secondary.to_string()),
			None => fields.secondary.clone().or_else(|| search_fields.get(1).cloned()),
		};

		Self { search_fields, display_field, secondary_field }
	}

	/// Search fields plus the display and secondary fields, deduplicated in order.
	pub fn requested_fields(&self) -> Vec<String> {
		let mut out: Vec<String> = Vec::with_capacity(self.search_fields.len() + 2);
		let extra = [Some(&self.display_field), self.secondary_field.as_ref()];

		for field in self.search_fields.iter().chain(extra.into_iter().flatten()) {
			if !field.is_empty() && !out.contains(field) {
				out.push(field.clone());
			}
		}

		out
	}
}

/// Per-call replacements for a source's default search configuration.
///
/// An explicit empty `secondary_field` disables the label suffix.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchOverrides {
	pub search_fields: Option<Vec<String>>,
	pub display_field: Option<String>,
	pub secondary_field: Option<String>,
}
impl SearchOverrides {
	pub fn is_empty(&self) -> bool {
		self.search_fields.is_none() && self.display_field.is_none() && self.secondary_field.is_none()
	}
}

/// Normalized, non-empty texts of the record's search fields, in field order.
pub fn searchable_texts(record: &Record, config: &SearchConfig) -> Vec<String> {
	config
		.search_fields
		.iter()
		.map(|field| normalize(&record.field_text(field)))
		.filter(|text| !text.is_empty())
		.collect()
}

/// Scores how well `record` matches `query`. Zero means no textual match at all.
pub fn score(record: &Record, query: &str, config: &SearchConfig) -> f64 {
	let query = normalize(query);

	if query.is_empty() {
		return 0.0;
	}

	let texts = searchable_texts(record, config);

	if texts.is_empty() {
		return 0.0;
	}

	let display = normalize(&record.field_text(&config.display_field));
	let primary = if display.is_empty() { texts[0].clone() } else { display };
	let mut score = 0.0;

	if primary == query {
		score += EXACT_BONUS;
	}
	if primary.starts_with(&query) {
		score += PREFIX_BONUS;
	}
	if tokenize(&primary).iter().any(|token| token.starts_with(&query)) {
		score += TOKEN_PREFIX_BONUS;
	}
	if primary.contains(&query) {
		score += SUBSTRING_BONUS;
	}

	let mut secondary_bonus: f64 = 0.0;

	for text in texts.iter().filter(|text| **text != primary) {
		if text.starts_with(&query) {
			secondary_bonus = secondary_bonus.max(SECONDARY_PREFIX_BONUS);
		} else if text.contains(&query) {
			secondary_bonus = secondary_bonus.max(SECONDARY_SUBSTRING_BONUS);
		}
	}

	score += secondary_bonus;

	let query_tokens = tokenize(&query);

	if query_tokens.len() > 1 {
		let matched = query_tokens
			.iter()
			.filter(|token| texts.iter().any(|text| text.contains(token.as_str())))
			.count();

		score += matched as f64 * TOKEN_COVERAGE_BONUS;
	}

	if score == 0.0 {
		return 0.0;
	}

	let length = primary.chars().count() as f64;

	score + (LENGTH_BONUS_CEILING - length / LENGTH_BONUS_DIVISOR).max(0.0)
}
