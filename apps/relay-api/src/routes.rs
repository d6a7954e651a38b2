use axum::{
	Json, Router,
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use relay_providers::{PropertyChoice, PropertyKind};
use relay_search::{SearchOption, SearchOverrides, SourceStatus};

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub overrides: SearchOverrides,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
	pub options: Vec<SearchOption>,
}

#[derive(Debug, Serialize)]
pub struct WarmResponse {
	pub triggered: bool,
}

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
	pub sources: Vec<SourceStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyOptionsRequest {
	#[serde(default)]
	pub query: String,
}

#[derive(Debug, Serialize)]
pub struct PropertyOptionsResponse {
	pub options: Vec<PropertyChoice>,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/sources", get(sources))
		.route("/v1/sources/{source_id}/search", post(search))
		.route("/v1/sources/{source_id}/warm", post(warm))
		.route("/v1/properties/{kind}/options", post(property_options))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn sources(State(state): State<AppState>) -> Json<SourcesResponse> {
	Json(SourcesResponse { sources: state.search.statuses() })
}

async fn search(
	State(state): State<AppState>,
	Path(source_id): Path<String>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let options = state.search.search(&source_id, &payload.query, &payload.overrides).await?;

	Ok(Json(SearchResponse { options }))
}

async fn warm(
	State(state): State<AppState>,
	Path(source_id): Path<String>,
) -> Result<Json<WarmResponse>, ApiError> {
	let triggered = state.search.trigger_warm(&source_id)?;

	Ok(Json(WarmResponse { triggered }))
}

async fn property_options(
	State(state): State<AppState>,
	Path(kind): Path<String>,
	Json(payload): Json<PropertyOptionsRequest>,
) -> Result<Json<PropertyOptionsResponse>, ApiError> {
	let Some(kind) = PropertyKind::parse(&kind) else {
		return Err(json_error(
			StatusCode::NOT_FOUND,
			"unknown_property",
			format!("Property {kind} is not supported."),
		));
	};
	let options = state.properties.search(kind, &payload.query).await;

	Ok(Json(PropertyOptionsResponse { options }))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<relay_search::Error> for ApiError {
	fn from(err: relay_search::Error) -> Self {
		match err {
			relay_search::Error::UnknownSource { .. } =>
				json_error(StatusCode::NOT_FOUND, "unknown_source", err.to_string()),
			relay_search::Error::Config { .. } =>
				json_error(StatusCode::INTERNAL_SERVER_ERROR, "config", err.to_string()),
			relay_search::Error::Upstream { .. } | relay_search::Error::InvalidResponse { .. } =>
				json_error(StatusCode::BAD_GATEWAY, "upstream", err.to_string()),
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}
