use std::sync::Arc;

use axum::{
	async_trait,
	body::Body,
	http::{Request, StatusCode},
};
use color_eyre::eyre::eyre;
use did_factom::{
	entry::{identity_chain_content, identity_chain_ext_ids},
	Entry, IdSecKey, Stage,
};
use http_body_util::BodyExt as _;
use resolver_server::{
	sources::{EntrySource, FetchError, Sources, StaticSource},
	RouterConfig,
};
use serde_json::{json, Value};
use tower::ServiceExt as _;

const CHAIN: &str = "f26e1c422c657521861ced450442d0c664702f49480aec67805822edfcfee758";
const OTHER_CHAIN: &str = "0000000000000000000000000000000000000000000000000000000000000001";

#[derive(Debug)]
struct FailingSource;

#[async_trait]
impl EntrySource for FailingSource {
	async fn entries(&self, _chain_id: &str) -> Result<Vec<Entry>, FetchError> {
		Err(FetchError::Upstream(eyre!("connection refused")))
	}
}

fn genesis(stage: Stage, height: Option<u64>) -> Entry {
	let key = IdSecKey::from_seed(&[7; 32]).public();
	Entry {
		hash: "aa".repeat(32),
		external_ids: identity_chain_ext_ids(&["Api", "test"]),
		content: identity_chain_content(&[key]),
		stage,
		height,
		timestamp: height.map(|_| "2019-01-01T00:00:00Z".to_owned()),
	}
}

fn sources() -> Sources {
	let mainnet = StaticSource::new()
		.with_chain(CHAIN, vec![genesis(Stage::Factom, Some(10))])
		// Claims to be final but has no height.
		.with_chain(OTHER_CHAIN, vec![genesis(Stage::Factom, None)]);
	let testnet =
		StaticSource::new().with_chain(CHAIN, vec![genesis(Stage::Pending, None)]);
	Sources {
		mainnet: Arc::new(mainnet),
		testnet: Arc::new(testnet),
	}
}

async fn send(sources: Sources, method: &str, uri: &str) -> (StatusCode, Value) {
	let router = RouterConfig { sources }.build();
	let response = router
		.oneshot(
			Request::builder()
				.method(method)
				.uri(uri)
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	let status = response.status();
	let body = response.into_body().collect().await.unwrap().to_bytes();
	(status, serde_json::from_slice(&body).unwrap())
}

async fn get(uri: &str) -> (StatusCode, Value) {
	send(sources(), "GET", uri).await
}

fn error_body(detail: &str) -> Value {
	json!({ "errors": { "detail": detail } })
}

#[tokio::test]
async fn health() {
	let (status, body) = get("/health").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!({ "data": "Healthy!" }));
}

#[tokio::test]
async fn resolves_mainnet_identity() {
	let (status, body) = get(&format!("/1.0/identifiers/did:factom:{CHAIN}")).await;
	assert_eq!(status, StatusCode::OK);
	let doc = &body["didDocument"];
	assert_eq!(doc["id"], format!("did:factom:{CHAIN}"));
	assert_eq!(doc["publicKey"].as_array().unwrap().len(), 1);
	assert_eq!(doc["authentication"], json!([format!("did:factom:{CHAIN}#key-0")]));
	assert_eq!(body["methodMetadata"]["stage"], "factom");
	assert_eq!(body["methodMetadata"]["createdHeight"], 10);
}

#[tokio::test]
async fn trailing_slash_is_ignored() {
	let (status, _) = get(&format!("/1.0/identifiers/did:factom:mainnet:{CHAIN}/")).await;
	assert_eq!(status, StatusCode::OK);
	let (status, _) = get("/health/").await;
	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn testnet_uses_testnet_source() {
	let (status, body) = get(&format!("/1.0/identifiers/did:factom:testnet:{CHAIN}")).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["methodMetadata"]["stage"], "pending");
	assert_eq!(body["methodMetadata"]["createdHeight"], Value::Null);
}

#[tokio::test]
async fn unknown_chain_is_not_found() {
	let uri = format!("/1.0/identifiers/did:factom:{}", "ab".repeat(32));
	let (status, body) = get(&uri).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body, error_body("Page not found"));
}

#[tokio::test]
async fn malformed_did_is_not_found() {
	let devnet = format!("did:factom:devnet:{CHAIN}");
	for did in ["did:factom:xyz", "did:web:example.com", devnet.as_str()] {
		let (status, body) = get(&format!("/1.0/identifiers/{did}")).await;
		assert_eq!(status, StatusCode::NOT_FOUND, "{did}");
		assert_eq!(body, error_body("Page not found"));
	}
}

#[tokio::test]
async fn upstream_failure_is_internal_error() {
	let sources = Sources {
		mainnet: Arc::new(FailingSource),
		testnet: Arc::new(FailingSource),
	};
	let (status, body) =
		send(sources, "GET", &format!("/1.0/identifiers/did:factom:{CHAIN}")).await;
	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body, error_body("Internal server error"));
}

#[tokio::test]
async fn inconsistent_entry_is_internal_error() {
	let (status, body) = get(&format!("/1.0/identifiers/did:factom:{OTHER_CHAIN}")).await;
	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body, error_body("Internal server error"));
}

#[tokio::test]
async fn wrong_method_is_not_allowed() {
	let (status, body) = send(
		sources(),
		"POST",
		&format!("/1.0/identifiers/did:factom:{CHAIN}"),
	)
	.await;
	assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
	assert_eq!(body, error_body("Method not allowed"));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
	let (status, body) = get("/1.0/nope").await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body, error_body("Page not found"));
}
