use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub sources: Sources,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	/// Queries shorter than this (after whitespace collapsing) never reach an upstream API.
	pub min_query_chars: usize,
	pub result_limit: usize,
	pub label_max_chars: usize,
	pub fallback: SearchFallback,
	pub warm: SearchWarm,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			min_query_chars: 3,
			result_limit: 50,
			label_max_chars: 75,
			fallback: SearchFallback::default(),
			warm: SearchWarm::default(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SearchFallback {
	pub min_matches: usize,
	pub page_size: usize,
	/// Wall-clock budget for the whole multi-page scan, checked between pages.
	pub max_millis: u64,
}
impl Default for SearchFallback {
	fn default() -> Self {
		Self { min_matches: 7, page_size: 100, max_millis: 1_200 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SearchWarm {
	pub enabled: bool,
	pub max_pages: usize,
	pub page_size: usize,
	pub interval_secs: u64,
}
impl Default for SearchWarm {
	fn default() -> Self {
		Self { enabled: true, max_pages: 50, page_size: 100, interval_secs: 900 }
	}
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Sources {
	pub crm: CrmSource,
	pub tasks: TasksSource,
	pub sheets: SheetsSource,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchFields {
	pub search: Vec<String>,
	pub display: Option<String>,
	pub secondary: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CrmSource {
	pub api_base: String,
	pub token: Option<String>,
	pub cache: bool,
	pub page_timeout_ms: u64,
	pub search_timeout_ms: u64,
	pub warm_timeout_ms: u64,
	pub max_retries: u32,
	pub fields: SearchFields,
	pub properties: CrmProperties,
}
impl Default for CrmSource {
	fn default() -> Self {
		Self {
			api_base: "https://api.hubapi.com".to_string(),
			token: None,
			cache: true,
			page_timeout_ms: 900,
			search_timeout_ms: 1_500,
			warm_timeout_ms: 8_000,
			max_retries: 1,
			fields: SearchFields {
				search: vec!["name".to_string(), "domain".to_string()],
				display: Some("name".to_string()),
				secondary: Some("domain".to_string()),
			},
			properties: CrmProperties::default(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CrmProperties {
	/// Optional. When unset the deal property is discovered from its label.
	pub deal_type_property: Option<String>,
	/// Optional. When unset the deal property is discovered from its label.
	pub hear_about_us_property: Option<String>,
	pub deal_type_exclude: Vec<String>,
	pub hear_about_us_exclude: Vec<String>,
	pub ttl_secs: u64,
	pub timeout_ms: u64,
	pub max_options: usize,
}
impl Default for CrmProperties {
	fn default() -> Self {
		Self {
			deal_type_property: None,
			hear_about_us_property: None,
			deal_type_exclude: vec!["client loss".to_string()],
			hear_about_us_exclude: Vec::new(),
			ttl_secs: 900,
			timeout_ms: 1_500,
			max_options: 100,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TasksSource {
	pub api_base: String,
	pub client_id: Option<String>,
	pub client_secret: Option<String>,
	pub cache: bool,
	pub page_timeout_ms: u64,
	pub warm_timeout_ms: u64,
	pub token_timeout_ms: u64,
	pub max_retries: u32,
	pub fields: SearchFields,
}
impl Default for TasksSource {
	fn default() -> Self {
		Self {
			api_base: "https://api.doublehq.com".to_string(),
			client_id: None,
			client_secret: None,
			cache: true,
			page_timeout_ms: 900,
			warm_timeout_ms: 8_000,
			token_timeout_ms: 1_500,
			max_retries: 0,
			fields: SearchFields {
				search: [
					"name",
					"email",
					"primaryEmail",
					"contactEmail",
					"domain",
					"emails",
					"contact_names",
					"contact_emails",
				]
				.into_iter()
				.map(str::to_string)
				.collect(),
				display: Some("name".to_string()),
				secondary: Some("preferred_email".to_string()),
			},
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SheetsSource {
	pub api_base: String,
	pub token: Option<String>,
	pub base_id: Option<String>,
	pub page_timeout_ms: u64,
	pub warm_timeout_ms: u64,
	pub max_retries: u32,
	pub tables: Vec<SheetTable>,
}
impl Default for SheetsSource {
	fn default() -> Self {
		Self {
			api_base: "https://api.airtable.com".to_string(),
			token: None,
			base_id: None,
			page_timeout_ms: 1_500,
			warm_timeout_ms: 20_000,
			max_retries: 1,
			tables: Vec::new(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct SheetTable {
	/// Source id used by callers, e.g. "client_names".
	pub id: String,
	pub table_id: String,
	#[serde(default = "default_true")]
	pub cache: bool,
	#[serde(default)]
	pub fields: SearchFields,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_true() -> bool {
	true
}
