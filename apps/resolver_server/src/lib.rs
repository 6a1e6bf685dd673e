//! HTTP driver that resolves `did:factom` identifiers for the universal
//! resolver.

pub mod config;
pub mod sources;

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::get,
	Json, Router,
};
use did_factom::{FactomDid, Resolution, ReplayError};
use serde_json::json;
use tower_http::{normalize_path::NormalizePath, trace::TraceLayer};
use tracing::{debug, error};

use crate::sources::{FetchError, Sources};

/// Main router of the driver.
#[derive(Debug, Clone)]
pub struct RouterConfig {
	pub sources: Sources,
}

impl RouterConfig {
	/// The router ignores a trailing `/` on any path. Serve it with
	/// [`axum::ServiceExt::into_make_service`] so that normalization happens
	/// before routing.
	pub fn build(self) -> NormalizePath<Router> {
		let router = Router::new()
			.route("/health", get(health).fallback(method_not_allowed))
			.route(
				"/1.0/identifiers/:did",
				get(resolve).fallback(method_not_allowed),
			)
			.fallback(not_found)
			.with_state(self.sources)
			.layer(TraceLayer::new_for_http());
		NormalizePath::trim_trailing_slash(router)
	}
}

async fn health() -> Json<serde_json::Value> {
	Json(json!({ "data": "Healthy!" }))
}

#[tracing::instrument(skip_all, fields(did = %raw_did))]
async fn resolve(
	State(sources): State<Sources>,
	Path(raw_did): Path<String>,
) -> Result<Json<Resolution>, ApiError> {
	let did: FactomDid = raw_did.parse().map_err(|err| {
		debug!("unresolvable did: {err}");
		ApiError::NotFound
	})?;
	let entries = sources
		.get(did.network())
		.entries(did.chain_id())
		.await
		.map_err(|err| match err {
			FetchError::ChainNotFound => ApiError::NotFound,
			FetchError::Upstream(report) => ApiError::Internal(report),
		})?;
	debug!(entries = entries.len(), "fetched chain");

	let state = did_factom::replay(&did, &entries).map_err(|err| match err {
		ReplayError::NotFound(reason) => {
			debug!("not an identity: {reason}");
			ApiError::NotFound
		}
		err => ApiError::Internal(err.into()),
	})?;
	Ok(Json(state.to_resolution()))
}

async fn not_found() -> ApiError {
	ApiError::NotFound
}

async fn method_not_allowed() -> ApiError {
	ApiError::MethodNotAllowed
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
	#[error("page not found")]
	NotFound,
	#[error("method not allowed")]
	MethodNotAllowed,
	#[error(transparent)]
	Internal(color_eyre::Report),
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (status, detail) = match self {
			Self::NotFound => (StatusCode::NOT_FOUND, "Page not found"),
			Self::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
			Self::Internal(err) => {
				error!("{err:?}");
				(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
			}
		};
		(status, Json(json!({ "errors": { "detail": detail } }))).into_response()
	}
}
