//! Authorization of key replacement entries.
//!
//! A key replacement swaps one active key for a brand new key that takes over
//! its priority. It must be signed by an active key whose priority is the same
//! as or better (numerically lower) than the key being replaced. Entries that
//! fail any check are skipped; chains routinely contain entries that are not
//! key replacements at all, so a rejection is an ordinary outcome.

use tracing::debug;

use crate::{
	entry::{key_replacement_message, Entry, KEY_REPLACEMENT_TAG},
	idkey::IdPubKey,
	state::{IdentityState, KeyRecord},
};

/// Number of external ids in a key replacement entry.
const EXT_ID_COUNT: usize = 5;

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum RotationOutcome {
	Accepted,
	Rejected(Rejection),
}

impl RotationOutcome {
	pub fn is_accepted(&self) -> bool {
		*self == Self::Accepted
	}
}

/// Why a candidate entry did not change the identity's keys.
#[derive(Debug, Eq, PartialEq, Clone, Copy, thiserror::Error)]
pub enum Rejection {
	#[error("not a key replacement entry")]
	NotKeyReplacement,
	#[error("a key in the entry is malformed")]
	MalformedKey,
	#[error("new key was already used by this identity")]
	KeyReused,
	#[error("old key is not active")]
	OldKeyInactive,
	#[error("signer key is not active")]
	SignerInactive,
	#[error("signer has lower priority than the key it replaces")]
	InsufficientPriority,
	#[error("signature does not verify")]
	BadSignature,
}

/// Applies `entry` to `state` if it is an authorized key replacement. On
/// rejection, `state` is left exactly as it was.
pub fn process_key_replacement(
	state: &mut IdentityState,
	entry: &Entry,
) -> RotationOutcome {
	match authorize(state, entry) {
		Ok(replacement) => {
			apply(state, entry, replacement);
			RotationOutcome::Accepted
		}
		Err(rejection) => {
			debug!(
				entry_hash = %entry.hash,
				reason = %rejection,
				"skipped entry"
			);
			RotationOutcome::Rejected(rejection)
		}
	}
}

/// A key replacement that passed every check.
struct Replacement {
	old: IdPubKey,
	new: IdPubKey,
	priority: u32,
}

fn authorize(state: &IdentityState, entry: &Entry) -> Result<Replacement, Rejection> {
	let ids = &entry.external_ids;
	if ids.len() != EXT_ID_COUNT || entry.tag() != Some(KEY_REPLACEMENT_TAG) {
		return Err(Rejection::NotKeyReplacement);
	}
	let old = parse_key(&ids[1])?;
	let new = parse_key(&ids[2])?;
	let signature = &ids[3];
	let signer = parse_key(&ids[4])?;

	if state.key_history().contains(&new) {
		return Err(Rejection::KeyReused);
	}
	let old_priority = state
		.active_key(&old)
		.ok_or(Rejection::OldKeyInactive)?
		.priority;
	let signer_priority = state
		.active_key(&signer)
		.ok_or(Rejection::SignerInactive)?
		.priority;
	if signer_priority > old_priority {
		return Err(Rejection::InsufficientPriority);
	}

	let msg = key_replacement_message(state.chain_id(), old.as_str(), new.as_str());
	if !signer.verify(signature, &msg) {
		return Err(Rejection::BadSignature);
	}

	Ok(Replacement {
		old,
		new,
		priority: old_priority,
	})
}

fn parse_key(bytes: &[u8]) -> Result<IdPubKey, Rejection> {
	IdPubKey::try_from(bytes).map_err(|_| Rejection::MalformedKey)
}

fn apply(state: &mut IdentityState, entry: &Entry, replacement: Replacement) {
	let Replacement { old, new, priority } = replacement;
	state.retire(&old, entry.height, entry.timestamp.clone());
	let introduced = state.introduce(KeyRecord {
		key: new,
		priority,
		activated_height: entry.height,
		activated_time: entry.timestamp.clone(),
		retired_height: None,
		retired_time: None,
		entry_hash: entry.hash.clone(),
	});
	debug_assert!(introduced, "new key was checked to be unused");
	debug!(
		entry_hash = %entry.hash,
		old_key = %old,
		priority,
		"replaced key"
	);
}
