//! Market registry and scheduling of per-market pollers.

use std::{sync::Arc, time::Duration};

use alloy::primitives::Address;
use dashmap::{DashMap, mapref::entry::Entry};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    Chain,
    discovery,
    poller::{MarketPoller, PollConfig},
    reader::ChainReader,
    store::SnapshotStore,
    types::Market,
};

/// Discovers markets of a chain and keeps a [`MarketPoller`] running for each
/// of them.
///
/// Owns the registry of tracked markets, keyed by AMM address. A market enters
/// the registry once and is never removed, so it gets exactly one poller for
/// the lifetime of the indexer.
pub struct Indexer<R, S> {
    reader: Arc<R>,
    store: Arc<S>,
    chain: Chain,
    config: PollConfig,
    tracked: Arc<DashMap<Address, Market>>,
}

impl<R, S> Indexer<R, S>
where
    R: ChainReader + 'static,
    S: SnapshotStore + 'static,
{
    pub fn new(reader: Arc<R>, store: Arc<S>, chain: Chain, config: PollConfig) -> Self {
        Self { reader, store, chain, config, tracked: Arc::new(DashMap::new()) }
    }

    pub fn chain(&self) -> &Chain { &self.chain }

    pub fn config(&self) -> &PollConfig { &self.config }

    /// Tracked markets ordered by id.
    pub fn markets(&self) -> Vec<Market> {
        let mut markets: Vec<_> = self.tracked.iter().map(|e| *e.value()).collect();
        markets.sort_by_key(Market::id);
        markets
    }

    pub fn is_tracked(&self, amm: &Address) -> bool { self.tracked.contains_key(amm) }

    /// Adds the market to the registry, returns `false` if it was tracked
    /// already.
    pub fn track(&self, market: Market) -> bool {
        match self.tracked.entry(market.amm()) {
            Entry::Vacant(entry) => {
                entry.insert(market);
                true
            },
            Entry::Occupied(_) => false,
        }
    }

    /// Runs market discovery every discovery interval, spawning a poller for
    /// every newly discovered market, until cancelled.
    ///
    /// After cancellation waits for all pollers to stop.
    pub async fn run<SL, SFut>(&self, sleep: SL, cancel: CancellationToken)
    where
        SL: Fn(Duration) -> SFut + Copy + Send + 'static,
        SFut: Future<Output = ()> + Send + 'static,
    {
        let mut pollers = JoinSet::new();
        let mut from_block = self.chain.factory_deployed_at_block();
        let mut error_backoff = None;

        info!(factory = %self.chain.factory(), from = from_block, "indexer started");
        while !cancel.is_cancelled() {
            let delay = match discovery::discover(self.reader.as_ref(), &self.chain, from_block).await {
                Ok((markets, scanned_to)) => {
                    error_backoff = None;
                    from_block = scanned_to + 1;
                    for market in markets.into_values() {
                        if !self.track(market) {
                            continue;
                        }
                        let poller = MarketPoller::new(
                            self.reader.clone(),
                            self.store.clone(),
                            market,
                            self.config,
                        );
                        pollers.spawn(poller.run(sleep, cancel.child_token()));
                    }
                    self.config.discovery_interval()
                },
                Err(err) => {
                    let backoff = self.config.error_backoff(error_backoff);
                    error_backoff = Some(backoff);
                    error!(error = %err, from = from_block, retry_in = ?backoff, "market discovery failed");
                    backoff
                },
            };
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(delay) => {},
            }
        }

        info!(pollers = pollers.len(), "indexer stopping");
        while let Some(result) = pollers.join_next().await {
            if let Err(err) = result {
                error!(error = %err, "poller task failed");
            }
        }
        info!("indexer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::MemoryStore, testing::MockChain};

    fn market(id: u64) -> Market {
        let amm = Address::with_last_byte(id as u8 + 1);
        Market::new(id, Address::ZERO, Address::ZERO, amm, Address::ZERO, 10)
    }

    #[test]
    fn test_track_once() {
        let indexer = Indexer::new(
            Arc::new(MockChain::new(0)),
            Arc::new(MemoryStore::new()),
            Chain::mainnet(),
            PollConfig::default(),
        );

        assert!(indexer.track(market(1)));
        assert!(indexer.track(market(0)));
        assert!(!indexer.track(market(1)));
        assert!(indexer.is_tracked(&market(0).amm()));
        assert_eq!(indexer.markets().iter().map(Market::id).collect::<Vec<_>>(), vec![0, 1]);
    }
}
