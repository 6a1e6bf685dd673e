//! Reads identity chains from the Harmony Connect REST API.

use base64::Engine as _;
use bytes::Bytes;
use color_eyre::{
	eyre::{bail, eyre, WrapErr as _},
	Result, Section as _,
};
use did_factom::{Entry, Stage};
use reqwest::{StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use super::{check_entry_limit, EntrySource, FetchError};
use axum::async_trait;

const PAGE_SIZE: usize = 25;
/// Stages requested when listing entries. Replicated entries are not final.
const LISTED_STAGES: &str = "factom,anchored";
const REPLICATED: &str = "replicated";

#[derive(Debug)]
pub struct HarmonySource {
	client: reqwest::Client,
	base: String,
	app_id: String,
	app_key: String,
	max_entries: usize,
}

impl HarmonySource {
	pub fn new(
		client: reqwest::Client,
		base: &Url,
		app_id: String,
		app_key: String,
		max_entries: usize,
	) -> Self {
		Self {
			client,
			base: base.as_str().trim_end_matches('/').to_owned(),
			app_id,
			app_key,
			max_entries,
		}
	}

	/// `Ok(None)` when the resource does not exist.
	async fn get<T: DeserializeOwned>(
		&self,
		path: &str,
		query: &[(&str, String)],
	) -> Result<Option<T>> {
		let url = format!("{}{path}", self.base);
		let response = self
			.client
			.get(&url)
			.query(query)
			.header("app_id", &self.app_id)
			.header("app_key", &self.app_key)
			.send()
			.await
			.wrap_err("failed to send request")
			.with_note(|| format!("url was {url}"))?;
		let status = response.status();
		if status == StatusCode::NOT_FOUND {
			return Ok(None);
		}
		if !status.is_success() {
			bail!("harmony returned {status} for {url}");
		}
		let body = response
			.bytes()
			.await
			.wrap_err("failed to get response body")?;
		let parsed = serde_json::from_slice(&body)
			.wrap_err("unexpected response body")
			.with_note(|| format!("url was {url}"))?;
		Ok(Some(parsed))
	}

	async fn entry(&self, chain_id: &str, hash: &str) -> Result<HarmonyEntry> {
		let response: Data<HarmonyEntry> = self
			.get(&format!("/chains/{chain_id}/entries/{hash}"), &[])
			.await?
			.ok_or_else(|| eyre!("listed entry {hash} does not exist"))?;
		Ok(response.data)
	}
}

#[async_trait]
impl EntrySource for HarmonySource {
	async fn entries(&self, chain_id: &str) -> std::result::Result<Vec<Entry>, FetchError> {
		let Some(first) = self
			.get::<Data<HarmonyEntry>>(&format!("/chains/{chain_id}/entries/first"), &[])
			.await?
		else {
			return Err(FetchError::ChainNotFound);
		};
		let first = first.data;
		let genesis = first.into_entry()?;
		if genesis.stage.is_pending() {
			return Ok(vec![genesis]);
		}
		let genesis_hash = genesis.hash.clone();
		let mut entries = vec![genesis];

		let mut offset = 0;
		'pages: loop {
			let query = [
				("limit", PAGE_SIZE.to_string()),
				("offset", offset.to_string()),
				("stages", LISTED_STAGES.to_owned()),
			];
			let page: EntryList = self
				.get(&format!("/chains/{chain_id}/entries"), &query)
				.await?
				.ok_or_else(|| eyre!("chain {chain_id} vanished while listing"))?;
			check_entry_limit(page.count, self.max_entries)?;

			for listed in &page.data {
				if listed.entry_hash == genesis_hash {
					continue;
				}
				let entry = self.entry(chain_id, &listed.entry_hash).await?;
				if entry.stage == REPLICATED {
					break 'pages;
				}
				entries.push(entry.into_entry()?);
			}

			offset += PAGE_SIZE;
			if page.count <= offset || page.data.is_empty() {
				break;
			}
		}
		debug!(chain_id, entries = entries.len(), "listed chain");
		Ok(entries)
	}
}

#[derive(Debug, Deserialize)]
struct Data<T> {
	data: T,
}

#[derive(Debug, Deserialize)]
struct EntryList {
	data: Vec<ListedEntry>,
	count: usize,
}

#[derive(Debug, Deserialize)]
struct ListedEntry {
	entry_hash: String,
}

#[derive(Debug, Deserialize)]
struct HarmonyEntry {
	entry_hash: String,
	#[serde(default)]
	external_ids: Vec<String>,
	#[serde(default)]
	content: String,
	stage: String,
	dblock: Option<DirectoryBlock>,
	created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryBlock {
	height: u64,
}

impl HarmonyEntry {
	fn into_entry(self) -> Result<Entry> {
		let engine = base64::prelude::BASE64_STANDARD;
		let external_ids = self
			.external_ids
			.iter()
			.map(|id| engine.decode(id).map(Bytes::from))
			.collect::<std::result::Result<Vec<_>, _>>()
			.wrap_err("external id is not base64")?;
		let content = engine
			.decode(&self.content)
			.wrap_err("content is not base64")?;

		// Replicated entries are not yet in a directory block.
		let (stage, height, timestamp) = match self.stage.as_str() {
			REPLICATED => (Stage::Pending, None, None),
			"factom" => (Stage::Factom, self.dblock.map(|b| b.height), self.created_at),
			"anchored" => (Stage::Anchored, self.dblock.map(|b| b.height), self.created_at),
			other => bail!("unknown entry stage {other:?}"),
		};
		Ok(Entry {
			hash: self.entry_hash,
			external_ids,
			content: Bytes::from(content),
			stage,
			height,
			timestamp,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn raw(stage: &str) -> HarmonyEntry {
		HarmonyEntry {
			entry_hash: "ab".to_owned(),
			external_ids: vec!["SWRlbnRpdHlDaGFpbg==".to_owned()],
			content: "e30=".to_owned(),
			stage: stage.to_owned(),
			dblock: Some(DirectoryBlock { height: 42 }),
			created_at: Some("2019-01-01T00:00:00Z".to_owned()),
		}
	}

	#[test]
	fn test_into_entry_decodes_base64() {
		let entry = raw("anchored").into_entry().unwrap();
		assert_eq!(entry.external_ids, [Bytes::from_static(b"IdentityChain")]);
		assert_eq!(entry.content, Bytes::from_static(b"{}"));
		assert_eq!(entry.stage, Stage::Anchored);
		assert_eq!(entry.height, Some(42));
		entry.check_stage().unwrap();
	}

	#[test]
	fn test_replicated_entry_is_pending() {
		let entry = raw("replicated").into_entry().unwrap();
		assert_eq!(entry.stage, Stage::Pending);
		assert_eq!(entry.height, None);
		assert_eq!(entry.timestamp, None);
		entry.check_stage().unwrap();
	}

	#[test]
	fn test_unknown_stage_is_an_error() {
		assert!(raw("bogus").into_entry().is_err());
	}
}
