//! Command line and environment configuration of the entry backends.

use std::sync::Arc;

use color_eyre::eyre::{ensure, WrapErr as _};
use reqwest::Url;

use crate::sources::{EntrySource, FactomdSource, HarmonySource, Sources};

/// Which service to read identity chains from.
#[derive(clap::ValueEnum, Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum Connection {
	#[default]
	Factomd,
	Harmony,
}

/// Environment variable names match the ones the universal resolver passes to
/// its drivers.
#[derive(clap::Args, Debug, Clone)]
pub struct SourcesConfig {
	#[clap(
		long,
		value_enum,
		env = "uniresolver_driver_did_factom_factomConnection",
		default_value = "factomd"
	)]
	pub factom_connection: Connection,
	/// factomd node used for mainnet chains.
	#[clap(
		long,
		env = "uniresolver_driver_did_factom_rpcUrlMainnet",
		default_value = "https://api.factomd.net"
	)]
	pub rpc_url_mainnet: Url,
	/// factomd node used for testnet chains, whatever the connection.
	#[clap(
		long,
		env = "uniresolver_driver_did_factom_rpcUrlTestnet",
		default_value = "https://dev.factomd.net"
	)]
	pub rpc_url_testnet: Url,
	#[clap(
		long,
		env = "uniresolver_driver_did_factom_harmonyApiUrl",
		default_value = "https://api.factom.com/v1"
	)]
	pub harmony_api_url: Url,
	#[clap(long, env = "uniresolver_driver_did_factom_harmonyApiAppId")]
	pub harmony_app_id: Option<String>,
	#[clap(long, env = "uniresolver_driver_did_factom_harmonyApiAppKey")]
	pub harmony_app_key: Option<String>,
	/// Chains with more entries than this fail to resolve.
	#[clap(
		long,
		env = "uniresolver_driver_did_factom_maxEntries",
		default_value_t = 10_000
	)]
	pub max_entries: usize,
}

impl SourcesConfig {
	pub fn build(self, client: reqwest::Client) -> color_eyre::Result<Sources> {
		ensure!(self.max_entries > 0, "--max-entries must be positive");
		let testnet = FactomdSource::new(client.clone(), &self.rpc_url_testnet, self.max_entries)
			.wrap_err("failed to configure testnet source")?;
		let mainnet: Arc<dyn EntrySource> = match self.factom_connection {
			Connection::Factomd => Arc::new(
				FactomdSource::new(client, &self.rpc_url_mainnet, self.max_entries)
					.wrap_err("failed to configure mainnet source")?,
			),
			Connection::Harmony => {
				let (Some(app_id), Some(app_key)) = (self.harmony_app_id, self.harmony_app_key)
				else {
					color_eyre::eyre::bail!(
						"the harmony connection requires --harmony-app-id and --harmony-app-key"
					);
				};
				Arc::new(HarmonySource::new(
					client,
					&self.harmony_api_url,
					app_id,
					app_key,
					self.max_entries,
				))
			}
		};
		Ok(Sources {
			mainnet,
			testnet: Arc::new(testnet),
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;

	use clap::Parser as _;

	#[derive(clap::Parser, Debug)]
	struct Cli {
		#[command(flatten)]
		sources: SourcesConfig,
	}

	#[test]
	fn test_defaults() {
		let cli = Cli::try_parse_from(["test"]).unwrap();
		assert_eq!(cli.sources.factom_connection, Connection::Factomd);
		assert_eq!(cli.sources.rpc_url_mainnet.as_str(), "https://api.factomd.net/");
		assert_eq!(cli.sources.max_entries, 10_000);
		assert!(cli.sources.build(reqwest::Client::new()).is_ok());
	}

	#[test]
	fn test_harmony_requires_credentials() {
		let cli = Cli::try_parse_from(["test", "--factom-connection", "harmony"]).unwrap();
		assert!(cli.sources.build(reqwest::Client::new()).is_err());

		let cli = Cli::try_parse_from([
			"test",
			"--factom-connection",
			"harmony",
			"--harmony-app-id",
			"id",
			"--harmony-app-key",
			"key",
		])
		.unwrap();
		assert!(cli.sources.build(reqwest::Client::new()).is_ok());
	}

	#[test]
	fn test_zero_max_entries_is_refused() {
		let cli = Cli::try_parse_from(["test", "--max-entries", "0"]).unwrap();
		assert!(cli.sources.build(reqwest::Client::new()).is_err());
	}
}
