//! Projection of an [`IdentityState`] into a DID document and its metadata.

use serde::Serialize;

use crate::{
	entry::Stage,
	state::{IdentityState, KeyRecord},
};

pub const DID_CONTEXT: &str = "https://w3id.org/did/v1";
pub const PUBLIC_KEY_TYPE: &str = "Ed25519VerificationKey2018";

/// A resolved identity, as handed to a resolver client.
#[derive(Debug, Eq, PartialEq, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
	pub did_document: DidDocument,
	pub method_metadata: MethodMetadata,
}

#[derive(Debug, Eq, PartialEq, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
	#[serde(rename = "@context")]
	pub context: &'static str,
	pub id: String,
	pub service: Vec<serde_json::Value>,
	/// Active keys, by ascending priority.
	pub public_key: Vec<PublicKey>,
	pub authentication: Vec<String>,
}

#[derive(Debug, Eq, PartialEq, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodMetadata {
	pub version: u64,
	pub name: Vec<String>,
	pub created_height: Option<u64>,
	pub created_time: Option<String>,
	pub stage: Stage,
	/// Every key the identity ever had, in the order they were introduced.
	pub public_key_history: Vec<PublicKey>,
}

#[derive(Debug, Eq, PartialEq, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
	pub id: String,
	pub controller: String,
	#[serde(rename = "type")]
	pub key_type: &'static str,
	pub public_key_hex: String,
	pub public_key_string: String,
	pub activated_height: Option<u64>,
	pub activated_time: Option<String>,
	pub retired_height: Option<u64>,
	pub retired_time: Option<String>,
	pub priority: u32,
	pub entry_hash: String,
}

impl IdentityState {
	pub fn to_resolution(&self) -> Resolution {
		Resolution {
			did_document: self.to_document(),
			method_metadata: self.to_metadata(),
		}
	}

	pub fn to_document(&self) -> DidDocument {
		let public_key: Vec<PublicKey> = self
			.active_keys()
			.into_iter()
			.map(|r| self.public_key(r))
			.collect();
		// Priorities have no gaps, but the highest one present is what counts.
		let authentication = public_key
			.iter()
			.max_by_key(|k| k.priority)
			.map(|k| k.id.clone())
			.into_iter()
			.collect();
		DidDocument {
			context: DID_CONTEXT,
			id: self.did.to_string(),
			service: Vec::new(),
			public_key,
			authentication,
		}
	}

	pub fn to_metadata(&self) -> MethodMetadata {
		MethodMetadata {
			version: self.version,
			name: self.name.clone(),
			created_height: self.created_height,
			created_time: self.created_time.clone(),
			stage: self.stage,
			public_key_history: self
				.key_history()
				.iter()
				.map(|r| self.public_key(r))
				.collect(),
		}
	}

	fn public_key(&self, record: &KeyRecord) -> PublicKey {
		PublicKey {
			id: self.did.key_id(record.priority),
			controller: self.did.to_string(),
			key_type: PUBLIC_KEY_TYPE,
			public_key_hex: record.key.to_hex(),
			public_key_string: record.key.to_string(),
			activated_height: record.activated_height,
			activated_time: record.activated_time.clone(),
			retired_height: record.retired_height,
			retired_time: record.retired_time.clone(),
			priority: record.priority,
			entry_hash: record.entry_hash.clone(),
		}
	}
}
