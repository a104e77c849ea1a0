use std::sync::Arc;

use colored::Colorize;
use llamma_sdk::{
    Chain,
    indexer::Indexer,
    poller::PollConfig,
    reader::ChainReader,
    store::{FileStore, SnapshotStore},
};
use tokio_util::sync::CancellationToken;

pub(crate) async fn run<R: ChainReader + 'static>(
    chain: Chain,
    reader: R,
    store: FileStore,
    config: PollConfig,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let root = store.root().to_path_buf();
    let indexer = Indexer::new(Arc::new(reader), Arc::new(store.clone()), chain, config);

    indexer.run(tokio::time::sleep, cancellation_token).await;

    println!(
        "\n{}\n",
        format!("Indexed {} market(s) into {}", indexer.markets().len(), root.display())
            .bold()
            .purple()
    );
    for market in indexer.markets() {
        let latest = store.latest(market.amm()).await?;
        println!(
            "  #{} {} {}",
            market.id(),
            market.amm(),
            latest.map_or("no snapshots".to_string(), |s| format!("at block #{}", s.block_number()))
        );
    }
    Ok(())
}
