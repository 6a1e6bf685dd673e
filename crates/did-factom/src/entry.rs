//! Entries of an identity chain, as supplied by whatever fetched them.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::idkey::{IdPubKey, IdSecKey};

/// First external id of an identity's genesis entry.
pub const IDENTITY_CHAIN_TAG: &[u8] = b"IdentityChain";
/// First external id of a key replacement entry.
pub const KEY_REPLACEMENT_TAG: &[u8] = b"ReplaceKey";
/// The only identity content version that exists.
pub const IDENTITY_VERSION: u64 = 1;

/// Confirmation status of an entry relative to the underlying ledger.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
	/// Not yet confirmed in a directory block.
	Pending,
	Factom,
	Anchored,
	Replicated,
}

impl Stage {
	pub fn is_pending(&self) -> bool {
		*self == Self::Pending
	}
}

/// One record of an identity chain. Immutable once fetched.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Entry {
	pub hash: String,
	pub external_ids: Vec<Bytes>,
	pub content: Bytes,
	pub stage: Stage,
	/// Directory block height. Present iff the stage is not pending.
	pub height: Option<u64>,
	/// ISO-8601 time. Present iff the stage is not pending.
	pub timestamp: Option<String>,
}

impl Entry {
	/// Checks that height and timestamp agree with the stage.
	///
	/// A mismatch means whoever built the entry made a mistake, it is not a
	/// property of the chain itself.
	pub fn check_stage(&self) -> Result<(), StageMismatch> {
		let has_height = self.height.is_some();
		let has_timestamp = self.timestamp.is_some();
		match (self.stage.is_pending(), has_height, has_timestamp) {
			(true, false, false) | (false, true, true) => Ok(()),
			_ => Err(StageMismatch {
				entry_hash: self.hash.clone(),
				stage: self.stage,
				has_height,
				has_timestamp,
			}),
		}
	}

	/// Returns the first external id, if any.
	pub fn tag(&self) -> Option<&[u8]> {
		self.external_ids.first().map(|b| b.as_ref())
	}
}

#[derive(thiserror::Error, Debug, Eq, PartialEq, Clone)]
#[error(
	"entry {entry_hash} has stage {stage:?} but height present = {has_height}, timestamp present = {has_timestamp}"
)]
pub struct StageMismatch {
	pub entry_hash: String,
	pub stage: Stage,
	pub has_height: bool,
	pub has_timestamp: bool,
}

/// External ids for the genesis entry of a new identity chain.
pub fn identity_chain_ext_ids<S: AsRef<str>>(names: &[S]) -> Vec<Bytes> {
	std::iter::once(Bytes::from_static(IDENTITY_CHAIN_TAG))
		.chain(
			names
				.iter()
				.map(|n| Bytes::copy_from_slice(n.as_ref().as_bytes())),
		)
		.collect()
}

/// Content for the genesis entry of a new identity chain. The order of `keys`
/// decides their priority, first is highest.
pub fn identity_chain_content(keys: &[IdPubKey]) -> Bytes {
	let keys: Vec<&str> = keys.iter().map(IdPubKey::as_str).collect();
	let content = serde_json::json!({
		"version": IDENTITY_VERSION,
		"keys": keys,
	});
	Bytes::from(content.to_string())
}

/// The exact bytes that a key replacement signature covers.
pub fn key_replacement_message(chain_id: &str, old: &str, new: &str) -> Vec<u8> {
	[chain_id.as_bytes(), old.as_bytes(), new.as_bytes()].concat()
}

/// External ids for an entry replacing `old` with `new`, signed by `signer`.
pub fn key_replacement_ext_ids(
	chain_id: &str,
	old: &IdPubKey,
	new: &IdPubKey,
	signer: &IdSecKey,
) -> Vec<Bytes> {
	let msg = key_replacement_message(chain_id, old.as_str(), new.as_str());
	let signature = signer.sign(&msg);
	vec![
		Bytes::from_static(KEY_REPLACEMENT_TAG),
		Bytes::copy_from_slice(old.as_str().as_bytes()),
		Bytes::copy_from_slice(new.as_str().as_bytes()),
		Bytes::copy_from_slice(&signature),
		Bytes::copy_from_slice(signer.public().as_str().as_bytes()),
	]
}
