//! Reads identity chains from a factomd node over its v2 JSON-RPC API.

use bytes::Bytes;
use color_eyre::{
	eyre::{eyre, WrapErr as _},
	Result, Section as _,
};
use did_factom::{Entry, Stage};
use futures::{StreamExt as _, TryStreamExt as _};
use reqwest::{header::CONTENT_TYPE, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::{check_entry_limit, EntrySource, FetchError};
use axum::async_trait;

/// factomd's error code for a chain that does not exist.
const MISSING_CHAIN_HEAD: i64 = -32009;
/// Key merkle root that terminates the backwards walk over entry blocks.
const ZERO_KEYMR: &str =
	"0000000000000000000000000000000000000000000000000000000000000000";
/// Maximum number of `entry` requests in flight for one chain.
const CONCURRENT_REQUESTS: usize = 8;

#[derive(Debug)]
pub struct FactomdSource {
	client: reqwest::Client,
	url: Url,
	max_entries: usize,
}

impl FactomdSource {
	/// `rpc_url` is the base url of the node, without the `/v2` suffix.
	pub fn new(client: reqwest::Client, rpc_url: &Url, max_entries: usize) -> Result<Self> {
		let url = format!("{}/v2", rpc_url.as_str().trim_end_matches('/'));
		let url = Url::parse(&url).wrap_err("invalid factomd rpc url")?;
		Ok(Self {
			client,
			url,
			max_entries,
		})
	}

	async fn call<P: Serialize, R: DeserializeOwned>(
		&self,
		method: &str,
		params: P,
	) -> Result<std::result::Result<R, RpcError>> {
		let request = RpcRequest {
			jsonrpc: "2.0",
			id: 0,
			method,
			params,
		};
		let response = self
			.client
			.post(self.url.clone())
			.header(CONTENT_TYPE, "application/json")
			.body(serde_json::to_vec(&request)?)
			.send()
			.await
			.wrap_err_with(|| format!("failed to send {method} request"))
			.with_note(|| format!("url was {}", self.url))?;
		let status = response.status();
		let body = response
			.bytes()
			.await
			.wrap_err("failed to get response body")?;
		let response: RpcResponse<R> = serde_json::from_slice(&body)
			.wrap_err_with(|| format!("unexpected response to {method}"))
			.with_note(|| format!("status was {status}"))?;
		match (response.result, response.error) {
			(_, Some(err)) => Ok(Err(err)),
			(Some(result), None) => Ok(Ok(result)),
			(None, None) => Err(eyre!("{method} response had neither result nor error")),
		}
	}

	async fn fetch_entry(&self, height: u64, entry_ref: EntryRef) -> Result<Entry> {
		let raw: RawEntry = self
			.call(
				"entry",
				serde_json::json!({ "hash": entry_ref.entryhash }),
			)
			.await?
			.map_err(|err| eyre!("entry {}: {err}", entry_ref.entryhash))?;
		let external_ids = raw
			.extids
			.iter()
			.map(|id| hex::decode(id).map(Bytes::from))
			.collect::<std::result::Result<Vec<_>, _>>()
			.wrap_err("external id is not hex")?;
		let content = hex::decode(&raw.content).wrap_err("content is not hex")?;
		let timestamp = chrono::DateTime::from_timestamp(entry_ref.timestamp, 0)
			.ok_or_else(|| eyre!("timestamp {} out of range", entry_ref.timestamp))?
			.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

		Ok(Entry {
			hash: entry_ref.entryhash,
			external_ids,
			content: Bytes::from(content),
			stage: Stage::Factom,
			height: Some(height),
			timestamp: Some(timestamp),
		})
	}
}

#[async_trait]
impl EntrySource for FactomdSource {
	async fn entries(&self, chain_id: &str) -> std::result::Result<Vec<Entry>, FetchError> {
		let head: ChainHead =
			match self.call("chain-head", serde_json::json!({ "chainid": chain_id })).await? {
				Ok(head) => head,
				Err(err) if err.code == MISSING_CHAIN_HEAD => {
					return Err(FetchError::ChainNotFound)
				}
				Err(err) => return Err(eyre!("chain-head: {err}").into()),
			};
		// A chain only in the process list has no confirmed entries yet.
		if head.chainhead.is_empty() {
			return Err(FetchError::ChainNotFound);
		}

		// Entry blocks link backwards, so walk from the head and reverse.
		let mut blocks = Vec::new();
		let mut count = 0;
		let mut keymr = head.chainhead;
		while keymr != ZERO_KEYMR {
			let block: EntryBlock = self
				.call("entry-block", serde_json::json!({ "keymr": keymr }))
				.await?
				.map_err(|err| eyre!("entry-block {keymr}: {err}"))?;
			count += block.entrylist.len();
			check_entry_limit(count, self.max_entries)?;
			keymr = block.header.prevkeymr.clone();
			blocks.push(block);
		}
		debug!(chain_id, blocks = blocks.len(), entries = count, "walked chain");

		// Collected up front so no borrowing iterator lives across the awaits.
		let mut refs: Vec<(u64, EntryRef)> = Vec::with_capacity(count);
		for block in blocks.into_iter().rev() {
			let height = block.header.dbheight;
			refs.extend(block.entrylist.into_iter().map(|r| (height, r)));
		}
		let entries: Vec<Entry> = futures::stream::iter(refs)
			.map(|(height, entry_ref)| self.fetch_entry(height, entry_ref))
			.buffered(CONCURRENT_REQUESTS)
			.try_collect()
			.await?;
		Ok(entries)
	}
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
	jsonrpc: &'static str,
	id: u32,
	method: &'a str,
	params: P,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
	result: Option<R>,
	error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
	code: i64,
	message: String,
}

impl std::fmt::Display for RpcError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "rpc error {}: {}", self.code, self.message)
	}
}

#[derive(Debug, Deserialize)]
struct ChainHead {
	chainhead: String,
}

#[derive(Debug, Deserialize)]
struct EntryBlock {
	header: EntryBlockHeader,
	#[serde(default)]
	entrylist: Vec<EntryRef>,
}

#[derive(Debug, Deserialize)]
struct EntryBlockHeader {
	prevkeymr: String,
	dbheight: u64,
}

#[derive(Debug, Deserialize)]
struct EntryRef {
	entryhash: String,
	/// Unix seconds.
	timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
	#[serde(default)]
	extids: Vec<String>,
	content: String,
}
