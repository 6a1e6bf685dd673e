//! The materialized state of an identity after replaying its chain.

use std::collections::HashMap;

use crate::{did::FactomDid, entry::Stage, idkey::IdPubKey};

/// One key that was introduced to the identity at some point.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct KeyRecord {
	pub key: IdPubKey,
	/// Lower values have more authority. Fixed once assigned.
	pub priority: u32,
	pub activated_height: Option<u64>,
	pub activated_time: Option<String>,
	pub retired_height: Option<u64>,
	pub retired_time: Option<String>,
	/// The entry that introduced this key.
	pub entry_hash: String,
}

/// Every key ever introduced, in the order they were introduced.
///
/// Records are never removed, so an index into the history stays valid for the
/// lifetime of the history. That is what the active set refers to.
#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub struct KeyHistory {
	records: Vec<KeyRecord>,
	by_key: HashMap<IdPubKey, usize>,
}

impl KeyHistory {
	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn contains(&self, key: &IdPubKey) -> bool {
		self.by_key.contains_key(key)
	}

	pub fn get(&self, key: &IdPubKey) -> Option<&KeyRecord> {
		self.index_of(key).map(|idx| &self.records[idx])
	}

	pub fn iter(&self) -> std::slice::Iter<'_, KeyRecord> {
		self.records.iter()
	}

	fn index_of(&self, key: &IdPubKey) -> Option<usize> {
		self.by_key.get(key).copied()
	}

	/// Appends a record, returning its index. Returns `None` and leaves the
	/// history untouched if the key was already introduced.
	fn push(&mut self, record: KeyRecord) -> Option<usize> {
		if self.contains(&record.key) {
			return None;
		}
		let idx = self.records.len();
		self.by_key.insert(record.key.clone(), idx);
		self.records.push(record);
		Some(idx)
	}
}

impl<'a> IntoIterator for &'a KeyHistory {
	type Item = &'a KeyRecord;
	type IntoIter = std::slice::Iter<'a, KeyRecord>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

/// The keys and metadata of one identity, as of some point in its chain.
///
/// Built by [`crate::replay`], which is the only thing that mutates it.
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct IdentityState {
	pub(crate) did: FactomDid,
	pub(crate) version: u64,
	pub(crate) name: Vec<String>,
	pub(crate) created_height: Option<u64>,
	pub(crate) created_time: Option<String>,
	pub(crate) stage: Stage,
	pub(crate) history: KeyHistory,
	/// Currently valid keys, as indices into `history`.
	pub(crate) active: HashMap<IdPubKey, usize>,
}

impl IdentityState {
	pub(crate) fn new(did: FactomDid, version: u64, stage: Stage) -> Self {
		Self {
			did,
			version,
			name: Vec::new(),
			created_height: None,
			created_time: None,
			stage,
			history: KeyHistory::default(),
			active: HashMap::new(),
		}
	}

	pub fn did(&self) -> &FactomDid {
		&self.did
	}

	pub fn chain_id(&self) -> &str {
		self.did.chain_id()
	}

	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn name(&self) -> &[String] {
		&self.name
	}

	pub fn created_height(&self) -> Option<u64> {
		self.created_height
	}

	pub fn created_time(&self) -> Option<&str> {
		self.created_time.as_deref()
	}

	pub fn stage(&self) -> Stage {
		self.stage
	}

	pub fn key_history(&self) -> &KeyHistory {
		&self.history
	}

	/// The active key record for `key`, if `key` is currently active.
	pub fn active_key(&self, key: &IdPubKey) -> Option<&KeyRecord> {
		self.active.get(key).map(|&idx| &self.history.records[idx])
	}

	pub fn is_active(&self, key: &IdPubKey) -> bool {
		self.active.contains_key(key)
	}

	pub fn active_count(&self) -> usize {
		self.active.len()
	}

	/// Currently active keys, ordered by priority.
	pub fn active_keys(&self) -> Vec<&KeyRecord> {
		let mut keys: Vec<&KeyRecord> = self
			.active
			.values()
			.map(|&idx| &self.history.records[idx])
			.collect();
		keys.sort_by_key(|r| r.priority);
		keys
	}

	/// Introduces a key that is active from now on. Returns `false` if the key
	/// was introduced before, in which case nothing changes.
	pub(crate) fn introduce(&mut self, record: KeyRecord) -> bool {
		let key = record.key.clone();
		match self.history.push(record) {
			Some(idx) => {
				self.active.insert(key, idx);
				true
			}
			None => false,
		}
	}

	/// Takes `key` out of the active set, stamping its record with the time of
	/// retirement. Returns the retired record, or `None` if `key` was not active.
	pub(crate) fn retire(
		&mut self,
		key: &IdPubKey,
		height: Option<u64>,
		time: Option<String>,
	) -> Option<&KeyRecord> {
		let idx = self.active.remove(key)?;
		let record = &mut self.history.records[idx];
		record.retired_height = height;
		record.retired_time = time;
		Some(record)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::idkey::IdSecKey;

	const DID: &str =
		"did:factom:f26e1c422c657521861ced450442d0c664702f49480aec67805822edfcfee758";

	fn record(seed: u8, priority: u32) -> KeyRecord {
		KeyRecord {
			key: IdSecKey::from_seed(&[seed; 32]).public(),
			priority,
			activated_height: Some(1),
			activated_time: None,
			retired_height: None,
			retired_time: None,
			entry_hash: String::from("genesis"),
		}
	}

	#[test]
	fn test_history_keeps_insertion_order() {
		let mut history = KeyHistory::default();
		for (seed, priority) in [(3, 0), (1, 2), (2, 1)] {
			assert!(history.push(record(seed, priority)).is_some());
		}
		let priorities: Vec<u32> = history.iter().map(|r| r.priority).collect();
		assert_eq!(priorities, [0, 2, 1]);
		assert_eq!(history.push(record(1, 7)), None, "keys are never re-added");
		assert_eq!(history.len(), 3);
	}

	#[test]
	fn test_retire_is_reflected_in_history() {
		let mut state = IdentityState::new(DID.parse().unwrap(), 1, Stage::Factom);
		let a = record(1, 0);
		let key = a.key.clone();
		assert!(state.introduce(a));
		assert!(state.is_active(&key));

		let retired = state
			.retire(&key, Some(5), Some("then".to_owned()))
			.expect("key was active");
		assert_eq!(retired.retired_height, Some(5));
		assert!(!state.is_active(&key));
		assert_eq!(state.key_history().get(&key).unwrap().retired_height, Some(5));
		assert!(state.retire(&key, Some(6), None).is_none());
		assert!(!state.introduce(record(1, 0)), "retired keys stay retired");
	}

	#[test]
	fn test_active_keys_sorted_by_priority() {
		let mut state = IdentityState::new(DID.parse().unwrap(), 1, Stage::Factom);
		for (seed, priority) in [(1, 2), (2, 0), (3, 1)] {
			state.introduce(record(seed, priority));
		}
		let priorities: Vec<u32> =
			state.active_keys().iter().map(|r| r.priority).collect();
		assert_eq!(priorities, [0, 1, 2]);
	}
}
