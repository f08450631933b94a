use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use braid_service::{AnswerResponse, QueryRequest, QueryResponse, ServiceError};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/healthz", get(healthz))
		.route("/v1/query", post(query))
		.route("/v1/answer", post(answer))
		.with_state(state)
}

#[derive(Debug, Serialize)]
struct Health {
	service: &'static str,
	version: &'static str,
}

async fn healthz() -> Json<Health> {
	Json(Health { service: "braid-api", version: braid_cli::VERSION })
}

async fn query(
	State(state): State<AppState>,
	Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
	let response = state.service.retrieve_and_fuse(payload).await?;

	Ok(Json(response))
}

async fn answer(
	State(state): State<AppState>,
	Json(payload): Json<QueryRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
	let response = state.service.answer(payload).await?;

	Ok(Json(response))
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

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let (status, error_code) = match &err {
			ServiceError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
			ServiceError::Embedding { .. } => (StatusCode::BAD_GATEWAY, "embedding_failed"),
			ServiceError::BothRetrievalsFailed { .. } => {
				(StatusCode::BAD_GATEWAY, "retrieval_failed")
			},
			ServiceError::Synthesis { .. } => (StatusCode::BAD_GATEWAY, "synthesis_failed"),
		};

		Self { status, error_code: error_code.to_string(), message: err.to_string() }
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
