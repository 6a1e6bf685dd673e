//! Replays an identity chain into an [`IdentityState`].
//!
//! Entries must be supplied oldest first. Whether a key replacement is
//! authorized depends on which keys are active at that point in the chain, so
//! replaying out of order can both accept forged rotations and refuse valid
//! ones. No reordering happens here.

use tracing::debug;

use crate::{
	did::FactomDid,
	entry::{Entry, StageMismatch},
	genesis::{process_genesis, GenesisError},
	rotation::{process_key_replacement, RotationOutcome},
	state::IdentityState,
};

#[derive(Debug)]
enum Phase {
	AwaitingGenesis,
	Replaying(IdentityState),
	Failed,
}

/// Incremental replay of one identity chain.
///
/// ```
/// # use did_factom::{Replay, FactomDid};
/// let did: FactomDid =
/// 	"did:factom:f26e1c422c657521861ced450442d0c664702f49480aec67805822edfcfee758"
/// 		.parse()
/// 		.unwrap();
/// // A chain with no entries has no identity.
/// assert!(Replay::new(did).finish().is_err());
/// ```
#[derive(Debug)]
pub struct Replay {
	did: FactomDid,
	phase: Phase,
}

impl Replay {
	pub fn new(did: FactomDid) -> Self {
		Self {
			did,
			phase: Phase::AwaitingGenesis,
		}
	}

	/// Feeds the next entry of the chain.
	///
	/// The first entry must be the identity genesis. Every later entry is
	/// treated as a candidate key replacement and its outcome returned. Once an
	/// error has been returned, the replay stays failed.
	pub fn push(&mut self, entry: &Entry) -> Result<Option<RotationOutcome>, ReplayError> {
		if matches!(self.phase, Phase::Failed) {
			return Err(ReplayError::Failed);
		}
		if let Err(err) = entry.check_stage() {
			self.phase = Phase::Failed;
			return Err(err.into());
		}
		if let Phase::Replaying(state) = &mut self.phase {
			return Ok(Some(process_key_replacement(state, entry)));
		}

		match process_genesis(&self.did, entry) {
			Ok(state) => {
				self.phase = Phase::Replaying(state);
				Ok(None)
			}
			Err(err) => {
				debug!(did = %self.did, entry_hash = %entry.hash, "invalid genesis: {err}");
				self.phase = Phase::Failed;
				Err(ReplayError::NotFound(err))
			}
		}
	}

	/// Ends the replay, returning the identity as of the last entry.
	pub fn finish(self) -> Result<IdentityState, ReplayError> {
		match self.phase {
			Phase::Replaying(state) => Ok(state),
			Phase::AwaitingGenesis => Err(ReplayError::NotFound(GenesisError::EmptyChain)),
			Phase::Failed => Err(ReplayError::Failed),
		}
	}
}

/// Replays a whole chain, oldest entry first.
pub fn replay<'a>(
	did: &FactomDid,
	entries: impl IntoIterator<Item = &'a Entry>,
) -> Result<IdentityState, ReplayError> {
	let mut replay = Replay::new(did.clone());
	let mut accepted = 0usize;
	for entry in entries {
		if let Some(RotationOutcome::Accepted) = replay.push(entry)? {
			accepted += 1;
		}
	}
	let state = replay.finish()?;
	debug!(did = %did, accepted, "replayed identity chain");
	Ok(state)
}

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
	/// There is no valid identity on this chain.
	#[error("identity not found")]
	NotFound(#[source] GenesisError),
	/// The entries handed to the replay were inconsistent. This is a bug in
	/// whatever produced them, not a property of the chain.
	#[error("precondition violated")]
	Precondition(#[from] StageMismatch),
	#[error("replay already failed")]
	Failed,
}

impl ReplayError {
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound(_))
	}
}
