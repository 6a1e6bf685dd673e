//! Validation of the first entry of an identity chain.

use serde::Deserialize;
use tracing::debug;

use crate::{
	did::FactomDid,
	entry::{Entry, IDENTITY_CHAIN_TAG, IDENTITY_VERSION},
	idkey::{IdPubKey, InvalidKeyFormat},
	state::{IdentityState, KeyRecord},
};

/// The JSON content of a genesis entry.
#[derive(Debug, Deserialize)]
struct IdentityContent {
	version: u64,
	keys: Vec<String>,
}

/// Builds the initial state of an identity from its genesis entry.
///
/// The caller is expected to have already checked [`Entry::check_stage`].
/// Every error here means the entry is simply not an identity genesis, and
/// should be reported as the identity not existing.
pub fn process_genesis(
	did: &FactomDid,
	entry: &Entry,
) -> Result<IdentityState, GenesisError> {
	if entry.external_ids.len() <= 1 || entry.tag() != Some(IDENTITY_CHAIN_TAG) {
		return Err(GenesisError::NotIdentityChain);
	}

	// Derived deserialization would also accept `[version, keys]`.
	let content: IdentityContent = match serde_json::from_slice(&entry.content)? {
		value @ serde_json::Value::Object(_) => serde_json::from_value(value)?,
		_ => return Err(GenesisError::ContentNotObject),
	};
	if content.version != IDENTITY_VERSION {
		return Err(GenesisError::UnsupportedVersion(content.version));
	}

	let keys = content
		.keys
		.iter()
		.map(|k| k.parse::<IdPubKey>())
		.collect::<Result<Vec<_>, _>>()?;

	let name = entry.external_ids[1..]
		.iter()
		.map(|id| String::from_utf8(id.to_vec()))
		.collect::<Result<Vec<_>, _>>()
		.map_err(|_| GenesisError::NameNotUtf8)?;

	let mut state = IdentityState::new(did.clone(), content.version, entry.stage);
	state.name = name;
	state.created_height = entry.height;
	state.created_time = entry.timestamp.clone();

	// Repeated keys keep the slot of their first occurrence, and priorities
	// are assigned over the deduplicated list so they have no gaps.
	let mut priority = 0;
	for key in keys {
		let introduced = state.introduce(KeyRecord {
			key,
			priority,
			activated_height: entry.height,
			activated_time: entry.timestamp.clone(),
			retired_height: None,
			retired_time: None,
			entry_hash: entry.hash.clone(),
		});
		if introduced {
			priority += 1;
		}
	}
	debug!(
		did = %did,
		keys = state.active_count(),
		"processed identity genesis entry"
	);

	Ok(state)
}

/// Why an entry is not a valid identity genesis.
#[derive(thiserror::Error, Debug)]
pub enum GenesisError {
	#[error("no entries in the chain")]
	EmptyChain,
	#[error(
		"expected more than one external id, the first being {:?}",
		String::from_utf8_lossy(IDENTITY_CHAIN_TAG)
	)]
	NotIdentityChain,
	#[error("content is not a valid identity object")]
	InvalidContent(#[from] serde_json::Error),
	#[error("content is not a JSON object")]
	ContentNotObject,
	#[error("identity version {0} is not supported")]
	UnsupportedVersion(u64),
	#[error("invalid key in identity content")]
	InvalidKey(#[from] InvalidKeyFormat),
	#[error("identity name is not valid UTF-8")]
	NameNotUtf8,
}
