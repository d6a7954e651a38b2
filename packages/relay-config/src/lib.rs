mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, CrmProperties, CrmSource, Search, SearchFallback, SearchFields, SearchWarm, Service,
	SheetTable, SheetsSource, Sources, TasksSource,
};

use std::{collections::HashSet, fs, path::Path};

pub const CRM_SOURCE_ID: &str = "companies";
pub const TASKS_SOURCE_ID: &str = "clients";

/// Every upstream API caps list pages at this size.
const MAX_PAGE_SIZE: usize = 100;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.search.min_query_chars == 0 {
		return Err(Error::Validation {
			message: "search.min_query_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.search.result_limit == 0 {
		return Err(Error::Validation {
			message: "search.result_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.label_max_chars == 0 {
		return Err(Error::Validation {
			message: "search.label_max_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.search.fallback.min_matches == 0 {
		return Err(Error::Validation {
			message: "search.fallback.min_matches must be greater than zero.".to_string(),
		});
	}
	if cfg.search.fallback.max_millis == 0 {
		return Err(Error::Validation {
			message: "search.fallback.max_millis must be greater than zero.".to_string(),
		});
	}

	validate_page_size("search.fallback.page_size", cfg.search.fallback.page_size)?;

	if cfg.search.warm.max_pages == 0 {
		return Err(Error::Validation {
			message: "search.warm.max_pages must be greater than zero.".to_string(),
		});
	}

	validate_page_size("search.warm.page_size", cfg.search.warm.page_size)?;

	if cfg.search.warm.interval_secs == 0 {
		return Err(Error::Validation {
			message: "search.warm.interval_secs must be greater than zero.".to_string(),
		});
	}

	let crm = &cfg.sources.crm;
	let tasks = &cfg.sources.tasks;
	let sheets = &cfg.sources.sheets;

	for (label, value) in [
		("sources.crm.api_base", &crm.api_base),
		("sources.tasks.api_base", &tasks.api_base),
		("sources.sheets.api_base", &sheets.api_base),
	] {
		if !(value.starts_with("http://") || value.starts_with("https://")) {
			return Err(Error::Validation {
				message: format!("{label} must be an http or https URL."),
			});
		}
	}
	for (label, value) in [
		("sources.crm.page_timeout_ms", crm.page_timeout_ms),
		("sources.crm.search_timeout_ms", crm.search_timeout_ms),
		("sources.crm.warm_timeout_ms", crm.warm_timeout_ms),
		("sources.crm.properties.timeout_ms", crm.properties.timeout_ms),
		("sources.crm.properties.ttl_secs", crm.properties.ttl_secs),
		("sources.tasks.page_timeout_ms", tasks.page_timeout_ms),
		("sources.tasks.warm_timeout_ms", tasks.warm_timeout_ms),
		("sources.tasks.token_timeout_ms", tasks.token_timeout_ms),
		("sources.sheets.page_timeout_ms", sheets.page_timeout_ms),
		("sources.sheets.warm_timeout_ms", sheets.warm_timeout_ms),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	if crm.properties.max_options == 0 {
		return Err(Error::Validation {
			message: "sources.crm.properties.max_options must be greater than zero.".to_string(),
		});
	}

	let mut seen = HashSet::from([CRM_SOURCE_ID, TASKS_SOURCE_ID]);

	for table in &sheets.tables {
		if table.id.is_empty() {
			return Err(Error::Validation {
				message: "sources.sheets.tables.id must be non-empty.".to_string(),
			});
		}
		if table.table_id.is_empty() {
			return Err(Error::Validation {
				message: format!("sources.sheets.tables.table_id must be non-empty for {}.", table.id),
			});
		}
		if !seen.insert(table.id.as_str()) {
			return Err(Error::Validation {
				message: format!("sources.sheets.tables.id {} is not unique.", table.id),
			});
		}
	}

	Ok(())
}

fn validate_page_size(label: &str, value: usize) -> Result<()> {
	if value == 0 || value > MAX_PAGE_SIZE {
		return Err(Error::Validation {
			message: format!("{label} must be between 1 and {MAX_PAGE_SIZE}."),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let sources = &mut cfg.sources;

	for api_base in
		[&mut sources.crm.api_base, &mut sources.tasks.api_base, &mut sources.sheets.api_base]
	{
		*api_base = api_base.trim().trim_end_matches('/').to_string();
	}
	for secret in [
		&mut sources.crm.token,
		&mut sources.crm.properties.deal_type_property,
		&mut sources.crm.properties.hear_about_us_property,
		&mut sources.tasks.client_id,
		&mut sources.tasks.client_secret,
		&mut sources.sheets.token,
		&mut sources.sheets.base_id,
	] {
		blank_to_none(secret);
	}

	normalize_fields(&mut sources.crm.fields);
	normalize_fields(&mut sources.tasks.fields);

	for table in &mut sources.sheets.tables {
		table.id = table.id.trim().to_string();
		table.table_id = table.table_id.trim().to_string();

		normalize_fields(&mut table.fields);
	}

	for exclude in
		[&mut sources.crm.properties.deal_type_exclude, &mut sources.crm.properties.hear_about_us_exclude]
	{
		exclude.retain(|label| !label.trim().is_empty());

		for label in exclude.iter_mut() {
			*label = label.trim().to_lowercase();
		}
	}
}

fn normalize_fields(fields: &mut crate::SearchFields) {
	fields.search = fields
		.search
		.iter()
		.map(|field| field.trim().to_string())
		.filter(|field| !field.is_empty())
		.collect();

	blank_to_none(&mut fields.display);
	blank_to_none(&mut fields.secondary);
}

fn blank_to_none(value: &mut Option<String>) {
	let trimmed = value.as_deref().map(str::trim).filter(|raw| !raw.is_empty()).map(str::to_string);

	*value = trimmed;
}
