use std::net::{Ipv6Addr, SocketAddr};

use axum::{extract::Request, ServiceExt};
use clap::Parser as _;
use color_eyre::eyre::WrapErr as _;
use resolver_server::config::SourcesConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(clap::Parser, Debug)]
#[command(about = "Universal resolver driver for did:factom")]
struct Cli {
	#[clap(long, short, env = "PORT", default_value = "8080")]
	port: u16,
	#[command(flatten)]
	sources: SourcesConfig,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or("info".into()))
		.with(tracing_subscriber::fmt::layer())
		.init();

	let cli = Cli::parse();
	info!(connection = ?cli.sources.factom_connection, "starting");

	let reqwest_client = reqwest::Client::new();
	let sources = cli
		.sources
		.build(reqwest_client)
		.wrap_err("failed to configure entry sources")?;
	let router = resolver_server::RouterConfig { sources }.build();

	let listener = tokio::net::TcpListener::bind(SocketAddr::new(
		Ipv6Addr::UNSPECIFIED.into(),
		cli.port,
	))
	.await
	.wrap_err_with(|| format!("failed to bind port {}", cli.port))?;
	info!("listening on {}", listener.local_addr()?);
	axum::serve(listener, ServiceExt::<Request>::into_make_service(router))
		.await
		.wrap_err("server stopped")
}
