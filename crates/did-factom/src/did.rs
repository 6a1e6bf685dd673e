//! Parsing of `did:factom` identifiers.

use std::{fmt::Display, str::FromStr};

/// The factom network that an identity chain lives on.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub enum Network {
	Mainnet,
	Testnet,
}

impl FromStr for Network {
	type Err = DidParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"mainnet" => Self::Mainnet,
			"testnet" => Self::Testnet,
			_ => return Err(DidParseError::UnknownNetwork),
		})
	}
}

/// A `did:factom` identifier, naming one identity chain.
///
/// Accepts `did:factom:<chain id>` (implicitly mainnet) as well as the network
/// qualified `did:factom:mainnet:<chain id>` and `did:factom:testnet:<chain id>`.
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub struct FactomDid {
	/// The string representation of the DID, exactly as it was given.
	s: String,
	network: Network,
	/// Lowercase hex.
	chain_id: String,
}

impl FactomDid {
	pub const PREFIX: &'static str = "did:factom:";
	/// Number of hex characters in a chain id.
	pub const CHAIN_ID_LEN: usize = 64;

	pub fn as_str(&self) -> &str {
		&self.s
	}

	pub fn network(&self) -> Network {
		self.network
	}

	/// The identity's chain id, as lowercase hex.
	pub fn chain_id(&self) -> &str {
		&self.chain_id
	}

	/// The identifier of the key at `priority` within this DID's document.
	pub fn key_id(&self, priority: u32) -> String {
		format!("{}#key-{priority}", self.s)
	}
}

impl FromStr for FactomDid {
	type Err = DidParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let remaining = s
			.strip_prefix(Self::PREFIX)
			.ok_or(DidParseError::InvalidPrefix)?;
		let (network, chain_id) = match remaining.split_once(':') {
			Some((network, chain_id)) => (network.parse()?, chain_id),
			None => (Network::Mainnet, remaining),
		};
		if chain_id.len() != Self::CHAIN_ID_LEN
			|| !chain_id.bytes().all(|b| b.is_ascii_hexdigit())
		{
			return Err(DidParseError::InvalidChainId);
		}

		Ok(Self {
			s: s.to_owned(),
			network,
			chain_id: chain_id.to_ascii_lowercase(),
		})
	}
}

impl Display for FactomDid {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.as_str().fmt(f)
	}
}

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum DidParseError {
	#[error("expected a did beginning with \"{}\"", FactomDid::PREFIX)]
	InvalidPrefix,
	#[error("expected network to be \"mainnet\" or \"testnet\"")]
	UnknownNetwork,
	#[error(
		"expected chain id to be {} hex characters",
		FactomDid::CHAIN_ID_LEN
	)]
	InvalidChainId,
}
