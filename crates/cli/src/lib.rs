pub mod args;
mod bands;
mod index;
mod logger;
mod markets;
mod show;

use std::time::Duration;

use alloy::{
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::client::RpcClient,
    transports::layers::{RetryBackoffLayer, ThrottleLayer},
};
use anyhow::Context;
use args::Cli;
use llamma_sdk::{Chain, poller::PollConfig, reader::RpcReader, store::FileStore};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::args::Commands;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    logger::init(cli.log_json);

    match &cli.command {
        Commands::Index => {
            let (chain, reader) = connect(&cli).await?;
            let config = PollConfig::default()
                .with_confirmations(cli.confirmations)
                .with_max_chunk(cli.max_chunk)
                .with_idle_interval(Duration::from_secs(cli.idle_secs))
                .with_discovery_interval(Duration::from_secs(cli.discovery_secs));

            let cancellation_signal = CancellationToken::new();
            let cancellation_token = cancellation_signal.child_token();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => cancellation_signal.cancel(),
                    Err(err) => error!(error = %err, "failed to install Ctrl+C signal handler"),
                }
            });

            index::run(chain, reader, FileStore::new(&cli.store), config, cancellation_token).await?
        },
        Commands::Markets => {
            let (chain, reader) = connect(&cli).await?;
            markets::render(&chain, &reader).await?
        },
        Commands::Bands { market, block } => {
            let (_, reader) = connect(&cli).await?;
            bands::render(&reader, *market, *block).await?
        },
        // Served from the store, no RPC needed
        Commands::Show { market, block, positions } => {
            show::render(&FileStore::new(&cli.store), *market, *block, *positions).await?
        },
    }

    Ok(())
}

async fn connect(cli: &Cli) -> anyhow::Result<(Chain, RpcReader<DynProvider>)> {
    let client = if cli.rpc == args::DEFAULT_RPC_PROVIDER || cli.rpc_throttle.is_some() {
        // Apply throttling with default RPC
        RpcClient::builder()
            .layer(ThrottleLayer::new(cli.rpc_throttle.unwrap_or(args::DEFAULT_RPC_THROTTLING)))
            .layer(RetryBackoffLayer::new(10, 100, 200))
            .connect(&cli.rpc)
            .await
            .context("connecting to RPC")?
    } else {
        RpcClient::builder()
            .layer(RetryBackoffLayer::new(10, 100, 200))
            .connect(&cli.rpc)
            .await
            .context("connecting to RPC")?
    };
    let provider = ProviderBuilder::new().connect_client(client).erased();

    let mainnet = Chain::mainnet();
    let chain = Chain::custom(
        provider.get_chain_id().await.context("fetching chain ID")?,
        cli.factory.unwrap_or(mainnet.factory()),
        cli.factory_block.unwrap_or(mainnet.factory_deployed_at_block()),
        cli.multicall.unwrap_or(mainnet.multicall()),
    );
    let reader = RpcReader::new(&chain, provider);
    Ok((chain, reader))
}
