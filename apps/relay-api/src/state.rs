use std::sync::Arc;

use relay_config::{CRM_SOURCE_ID, Config, TASKS_SOURCE_ID};
use relay_providers::{CrmCompanies, PropertyOptions, SheetTableSource, TaskClients};
use relay_search::{SearchService, SourceHandle};

#[derive(Clone)]
pub struct AppState {
	pub search: Arc<SearchService>,
	pub properties: Arc<PropertyOptions>,
}
impl AppState {
	pub fn new(config: &Config) -> color_eyre::Result<Self> {
		let search = SearchService::new(config.search.clone(), source_handles(config)?)?;
		let properties = PropertyOptions::new(&config.sources.crm, config.search.label_max_chars)?;

		Ok(Self::from_parts(search, properties))
	}

	pub fn from_parts(search: SearchService, properties: PropertyOptions) -> Self {
		Self { search: Arc::new(search), properties: Arc::new(properties) }
	}
}

/// One handle per configured directory, keyed by the ids the chat UI asks for.
pub fn source_handles(config: &Config) -> color_eyre::Result<Vec<SourceHandle>> {
	let crm = &config.sources.crm;
	let tasks = &config.sources.tasks;
	let sheets = &config.sources.sheets;
	let mut handles = Vec::with_capacity(2 + sheets.tables.len());

	handles.push(cached_if(
		SourceHandle::new(CRM_SOURCE_ID, Arc::new(CrmCompanies::new(crm)?), crm.fields.clone())
			.with_max_retries(crm.max_retries),
		crm.cache,
	));
	handles.push(cached_if(
		SourceHandle::new(TASKS_SOURCE_ID, Arc::new(TaskClients::new(tasks)?), tasks.fields.clone())
			.with_max_retries(tasks.max_retries),
		tasks.cache,
	));

	for table in &sheets.tables {
		let source = SheetTableSource::new(sheets, table)?;

		handles.push(cached_if(
			SourceHandle::new(table.id.clone(), Arc::new(source), table.fields.clone())
				.with_max_retries(sheets.max_retries),
			table.cache,
		));
	}

	Ok(handles)
}

fn cached_if(handle: SourceHandle, cache: bool) -> SourceHandle {
	if cache { handle.cached() } else { handle }
}
