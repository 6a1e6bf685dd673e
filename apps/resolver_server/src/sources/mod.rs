//! Fetching of identity chain entries from the various factom backends.
//!
//! Every source hands back the complete chain, oldest entry first, which is
//! the order [`did_factom::replay`] requires.

pub mod factomd;
pub mod harmony;

use std::{collections::HashMap, sync::Arc};

use axum::async_trait;
use did_factom::{Entry, Network};

pub use self::{factomd::FactomdSource, harmony::HarmonySource};

/// Retrieves the entries of an identity chain.
///
/// This exists so that the backends can be swapped by configuration, and mocked
/// in tests.
#[async_trait]
pub trait EntrySource: std::fmt::Debug + Send + Sync + 'static {
	/// All entries of the chain `chain_id`, oldest first.
	async fn entries(&self, chain_id: &str) -> Result<Vec<Entry>, FetchError>;
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
	#[error("chain does not exist")]
	ChainNotFound,
	/// The backend failed in some way. Not interpreted any further.
	#[error("upstream fetch failed: {0:#}")]
	Upstream(color_eyre::Report),
}

impl From<color_eyre::Report> for FetchError {
	fn from(value: color_eyre::Report) -> Self {
		Self::Upstream(value)
	}
}

/// The entry source to use for each network.
#[derive(Debug, Clone)]
pub struct Sources {
	pub mainnet: Arc<dyn EntrySource>,
	pub testnet: Arc<dyn EntrySource>,
}

impl Sources {
	pub fn get(&self, network: Network) -> &dyn EntrySource {
		match network {
			Network::Mainnet => self.mainnet.as_ref(),
			Network::Testnet => self.testnet.as_ref(),
		}
	}
}

/// Always provides the same chains. Useful for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
	chains: HashMap<String, Vec<Entry>>,
}

impl StaticSource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_chain(mut self, chain_id: impl Into<String>, entries: Vec<Entry>) -> Self {
		self.chains.insert(chain_id.into(), entries);
		self
	}
}

#[async_trait]
impl EntrySource for StaticSource {
	async fn entries(&self, chain_id: &str) -> Result<Vec<Entry>, FetchError> {
		self.chains
			.get(chain_id)
			.cloned()
			.ok_or(FetchError::ChainNotFound)
	}
}

/// Fails once a chain is known to have more than `max` entries, bounding the
/// work a single resolution can cause.
pub(crate) fn check_entry_limit(count: usize, max: usize) -> Result<(), FetchError> {
	if count > max {
		return Err(FetchError::Upstream(color_eyre::eyre::eyre!(
			"chain has more than the maximum of {max} entries"
		)));
	}
	Ok(())
}
