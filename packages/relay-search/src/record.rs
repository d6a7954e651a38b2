use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Stable identity of a record within its source.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);
impl RecordId {
	pub fn new(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}

	/// Accepts the id shapes upstream APIs return: strings and integers.
	pub fn from_json(value: &Value) -> Option<Self> {
		let raw = match value {
			Value::String(raw) => raw.trim().to_string(),
			Value::Number(number) => number_to_text(number),
			_ => return None,
		};

		if raw.is_empty() { None } else { Some(Self(raw)) }
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl fmt::Display for RecordId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// The value shapes a record field may hold.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
	Null,
	Bool(bool),
	Number(Number),
	Text(String),
	List(Vec<FieldValue>),
	Object(Map<String, Value>),
}
impl FieldValue {
	/// Renders the value as display text.
	///
	/// Lists join their non-empty elements with `", "`. Objects prefer a `name`, then an
	/// `email`, then an `id`, and otherwise fall back to compact JSON.
	pub fn to_text(&self) -> String {
		match self {
			Self::Null => String::new(),
			Self::Bool(value) => value.to_string(),
			Self::Number(number) => number_to_text(number),
			Self::Text(text) => text.clone(),
			Self::List(items) => items
				.iter()
				.map(Self::to_text)
				.filter(|text| !text.is_empty())
				.collect::<Vec<_>>()
				.join(", "),
			Self::Object(map) => object_to_text(map),
		}
	}
}
impl From<Value> for FieldValue {
	fn from(value: Value) -> Self {
		match value {
			Value::Null => Self::Null,
			Value::Bool(value) => Self::Bool(value),
			Value::Number(number) => Self::Number(number),
			Value::String(text) => Self::Text(text),
			Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
			Value::Object(map) => Self::Object(map),
		}
	}
}
impl From<&str> for FieldValue {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
	pub id: RecordId,
	pub fields: HashMap<String, FieldValue>,
}
impl Record {
	pub fn new(id: RecordId) -> Self {
		Self { id, fields: HashMap::new() }
	}

	pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
		self.fields.insert(name.into(), value.into());

		self
	}

	pub fn from_json_fields(id: RecordId, fields: Map<String, Value>) -> Self {
		let fields = fields.into_iter().map(|(key, value)| (key, FieldValue::from(value))).collect();

		Self { id, fields }
	}

	/// Display text of one field; missing fields render as an empty string.
	pub fn field_text(&self, name: &str) -> String {
		self.fields.get(name).map(FieldValue::to_text).unwrap_or_default()
	}
}

fn object_to_text(map: &Map<String, Value>) -> String {
	if let Some(Value::String(name)) = map.get("name") {
		return name.clone();
	}
	if let Some(Value::String(email)) = map.get("email") {
		return email.clone();
	}

	match map.get("id") {
		Some(Value::String(id)) => id.clone(),
		Some(Value::Number(id)) => number_to_text(id),
		_ => serde_json::to_string(map).unwrap_or_default(),
	}
}

fn number_to_text(number: &Number) -> String {
	if let Some(value) = number.as_i64() {
		return value.to_string();
	}
	if let Some(value) = number.as_u64() {
		return value.to_string();
	}

	match number.as_f64() {
		Some(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 =>
			format!("{}", value as i64),
		Some(value) => value.to_string(),
		None => number.to_string(),
	}
}
