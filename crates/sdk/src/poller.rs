//! Per-market polling loop.
//!
//! A [`MarketPoller`] follows one market from its creation block to the chain
//! head, one bounded window of blocks per iteration:
//!
//! 1. resume right after the latest stored snapshot, or at the market creation
//!    block, never below the in-memory cursor;
//! 2. stay idle while the head is less than the confirmation depth ahead, see
//!    [`next_window`];
//! 3. fetch the market's `Deposit`/`Withdraw`/`TokenExchange` logs of the
//!    window, sorted into causal order;
//! 4. advance the ledger block by block, persisting each snapshot before the
//!    next block is processed.
//!
//! A window without logs only moves the in-memory cursor, so a long quiet
//! stretch is walked through one window per idle interval.

use std::{sync::Arc, time::Duration};

use alloy::sol_types::SolEvent;
use itertools::Itertools;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    abi::llamma::Llamma,
    error::IndexerError,
    reader::{self, ChainReader, LogQuery},
    state::ledger::{self, LedgerEvent},
    store::SnapshotStore,
    types::{BlockEvents, Market},
};

/// Polling parameters shared by all markets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    confirmations: u64,
    max_chunk: u64,
    idle_interval: Duration,
    discovery_interval: Duration,
    max_error_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            confirmations: 300,
            max_chunk: 10_000,
            idle_interval: Duration::from_secs(60),
            discovery_interval: Duration::from_secs(24 * 60 * 60),
            max_error_backoff: Duration::from_secs(10 * 60),
        }
    }
}

impl PollConfig {
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    pub fn with_max_chunk(mut self, max_chunk: u64) -> Self {
        self.max_chunk = max_chunk;
        self
    }

    pub fn with_idle_interval(mut self, idle_interval: Duration) -> Self {
        self.idle_interval = idle_interval;
        self
    }

    pub fn with_discovery_interval(mut self, discovery_interval: Duration) -> Self {
        self.discovery_interval = discovery_interval;
        self
    }

    pub fn with_max_error_backoff(mut self, max_error_backoff: Duration) -> Self {
        self.max_error_backoff = max_error_backoff;
        self
    }

    /// Number of blocks the head has to be ahead of the first block of a
    /// window before the window is processed.
    pub fn confirmations(&self) -> u64 { self.confirmations }

    /// Upper bound on the number of blocks in one window, minus one.
    pub fn max_chunk(&self) -> u64 { self.max_chunk }

    /// Pause after an iteration that found nothing to do.
    pub fn idle_interval(&self) -> Duration { self.idle_interval }

    /// Pause between market discovery scans.
    pub fn discovery_interval(&self) -> Duration { self.discovery_interval }

    /// Cap of the error backoff, which starts at the idle interval and
    /// doubles with every consecutive failure.
    pub fn max_error_backoff(&self) -> Duration { self.max_error_backoff }

    pub(crate) fn error_backoff(&self, previous: Option<Duration>) -> Duration {
        previous
            .map_or(self.idle_interval, |backoff| backoff.saturating_mul(2))
            .min(self.max_error_backoff)
    }
}

/// Blocks to process in the next iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Window {
    /// Not enough confirmations yet.
    Idle,
    /// Inclusive block range.
    Range { from: u64, to: u64 },
}

/// Window starting at `from` given the current `head`.
pub fn next_window(from: u64, head: u64, config: &PollConfig) -> Window {
    if from.checked_add(config.confirmations).is_none_or(|min_head| head < min_head) {
        return Window::Idle;
    }
    Window::Range { from, to: head.min(from.saturating_add(config.max_chunk)) }
}

/// Result of a single [`MarketPoller::poll_once`] iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Head is not far enough ahead.
    Idle,
    /// Window had no logs of the market.
    Empty { from: u64, to: u64 },
    /// Snapshots were stored for `blocks` blocks of the window.
    Indexed { from: u64, to: u64, blocks: usize },
    /// Cancellation was requested in the middle of the window.
    Cancelled,
}

/// Follows a single market, see the [module documentation](self).
pub struct MarketPoller<R, S> {
    reader: Arc<R>,
    store: Arc<S>,
    market: Market,
    config: PollConfig,
    cursor: Option<u64>,
}

impl<R: ChainReader, S: SnapshotStore> MarketPoller<R, S> {
    pub fn new(reader: Arc<R>, store: Arc<S>, market: Market, config: PollConfig) -> Self {
        Self { reader, store, market, config, cursor: None }
    }

    pub fn market(&self) -> &Market { &self.market }

    /// First block of the next window as far as this poller has seen, the
    /// store may be ahead of it.
    pub fn cursor(&self) -> Option<u64> { self.cursor }

    /// Runs a single iteration.
    ///
    /// Cancellation is checked between blocks, a snapshot being stored is
    /// always stored completely. On error nothing past the last stored
    /// snapshot is kept, the next iteration starts over from there.
    pub async fn poll_once(&mut self, cancel: &CancellationToken) -> Result<PollOutcome, IndexerError> {
        let amm = self.market.amm();
        let mut prior = self.store.latest(amm).await?;
        let from = prior
            .as_ref()
            .map_or(self.market.created_at_block(), |s| s.block_number() + 1)
            .max(self.cursor.unwrap_or_default());

        let head = self.reader.head_height().await?;
        let Window::Range { from, to } = next_window(from, head, &self.config) else {
            debug!(market = %amm, from, head, "waiting for confirmations");
            return Ok(PollOutcome::Idle);
        };

        let query = LogQuery::new(from)
            .address(amm)
            .events([
                Llamma::Deposit::SIGNATURE_HASH,
                Llamma::Withdraw::SIGNATURE_HASH,
                Llamma::TokenExchange::SIGNATURE_HASH,
            ])
            .to_block(to);
        let mut logs = self.reader.logs(&query).await?;
        reader::sort_logs(&mut logs);
        let events = logs.iter().map(LedgerEvent::decode).collect::<Result<Vec<_>, _>>()?;

        let blocks = group_by_block(events);
        if blocks.is_empty() {
            debug!(market = %amm, from, to, "no market activity");
            self.cursor = Some(to + 1);
            return Ok(PollOutcome::Empty { from, to });
        }

        let count = blocks.len();
        for block in blocks {
            if cancel.is_cancelled() {
                return Ok(PollOutcome::Cancelled);
            }
            let snapshot = ledger::advance(
                self.reader.as_ref(),
                amm,
                prior.as_ref(),
                block.block_number(),
                block.events(),
            )
            .await?;
            self.store.put(snapshot.clone()).await?;
            debug!(
                market = %amm,
                block = block.block_number(),
                events = block.events().len(),
                bands = snapshot.bands().len(),
                users = snapshot.user_shares().len(),
                "stored snapshot"
            );
            prior = Some(snapshot);
        }

        info!(market = %amm, from, to, blocks = count, "indexed blocks");
        self.cursor = Some(to + 1);
        Ok(PollOutcome::Indexed { from, to, blocks: count })
    }

    /// Polls until cancelled.
    ///
    /// Windows with activity are processed back to back, otherwise the poller
    /// sleeps for the idle interval. A failed iteration is logged and retried
    /// after the error backoff.
    pub async fn run<SL, SFut>(mut self, sleep: SL, cancel: CancellationToken)
    where
        SL: Fn(Duration) -> SFut + Copy,
        SFut: Future<Output = ()>,
    {
        let amm = self.market.amm();
        info!(market = %amm, id = self.market.id(), "poller started");

        let mut error_backoff = None;
        while !cancel.is_cancelled() {
            let delay = match self.poll_once(&cancel).await {
                Ok(PollOutcome::Indexed { .. }) => {
                    error_backoff = None;
                    continue;
                },
                Ok(PollOutcome::Idle | PollOutcome::Empty { .. }) => {
                    error_backoff = None;
                    self.config.idle_interval
                },
                Ok(PollOutcome::Cancelled) => break,
                Err(err) => {
                    let backoff = self.config.error_backoff(error_backoff);
                    error_backoff = Some(backoff);
                    error!(market = %amm, error = %err, retry_in = ?backoff, "poll failed");
                    backoff
                },
            };
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(delay) => {},
            }
        }

        info!(market = %amm, "poller stopped");
    }
}

/// Splits events sorted by block number into per-block batches.
pub fn group_by_block(events: Vec<LedgerEvent>) -> Vec<BlockEvents<LedgerEvent>> {
    events
        .into_iter()
        .chunk_by(|event| event.block_number())
        .into_iter()
        .map(|(block_number, events)| BlockEvents::new(block_number, events.collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use alloy::primitives::{Address, I256, address};

    use super::*;
    use crate::{
        store::MemoryStore,
        testing::{MockChain, deposit, deposit_event, ether, withdraw, withdraw_event},
    };

    const AMM: Address = address!("0x136e783846ef68C8Bd00a3369F787dF8d683a696");
    const ALICE: Address = address!("0x00000000000000000000000000000000000a11ce");

    fn market() -> Market { Market::new(0, Address::ZERO, Address::ZERO, AMM, Address::ZERO, 100) }

    fn poller(chain: MockChain, config: PollConfig) -> MarketPoller<MockChain, MemoryStore> {
        MarketPoller::new(Arc::new(chain), Arc::new(MemoryStore::new()), market(), config)
    }

    #[test]
    fn test_next_window() {
        let config = PollConfig::default();
        // Last stored block 750, head 1000
        assert_eq!(next_window(751, 1000, &config), Window::Idle);
        assert_eq!(next_window(751, 50_000, &config), Window::Range { from: 751, to: 10_751 });
        assert_eq!(next_window(700, 1000, &config), Window::Range { from: 700, to: 1000 });
        assert_eq!(next_window(u64::MAX - 1, u64::MAX, &config), Window::Idle);

        let unconfirmed = config.with_confirmations(0);
        assert_eq!(
            next_window(u64::MAX, u64::MAX, &unconfirmed),
            Window::Range { from: u64::MAX, to: u64::MAX }
        );
    }

    #[test]
    fn test_error_backoff() {
        let config = PollConfig::default()
            .with_idle_interval(Duration::from_secs(60))
            .with_max_error_backoff(Duration::from_secs(200));
        let first = config.error_backoff(None);
        let second = config.error_backoff(Some(first));
        assert_eq!(first, Duration::from_secs(60));
        assert_eq!(second, Duration::from_secs(120));
        assert_eq!(config.error_backoff(Some(second)), Duration::from_secs(200));
    }

    #[test]
    fn test_group_by_block() {
        let blocks = group_by_block(vec![
            deposit(10, 0, ALICE, 1, 0, 0),
            withdraw(10, 1, ALICE),
            deposit(12, 0, ALICE, 1, 0, 0),
        ]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].block_number(), 10);
        assert_eq!(blocks[0].events().len(), 2);
        assert_eq!(blocks[1].block_number(), 12);
        assert!(group_by_block(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn test_poll_indexes_window() {
        let chain = MockChain::new(1000);
        chain.set_bands(AMM, 200, -1, vec![(I256::ZERO, ether(1)); 3]);
        chain.set_bands(AMM, 250, -1, vec![(ether(1), I256::ZERO); 3]);
        chain.push_event(AMM, 250, 7, &withdraw_event(ALICE));
        chain.push_event(AMM, 200, 2, &deposit_event(ALICE, 300, -1, 1));
        let mut poller = poller(chain, PollConfig::default());
        let cancel = CancellationToken::new();

        let outcome = poller.poll_once(&cancel).await.unwrap();
        assert_eq!(outcome, PollOutcome::Indexed { from: 100, to: 1000, blocks: 2 });
        assert_eq!(poller.cursor(), Some(1001));
        assert_eq!(poller.store.blocks(AMM), vec![200, 250]);

        let at_200 = poller.store.latest_at_or_before(AMM, 200).await.unwrap().unwrap();
        assert_eq!(at_200.position(&ALICE).unwrap().len(), 3);
        let latest = poller.store.latest(AMM).await.unwrap().unwrap();
        assert!(latest.user_shares().is_empty());
        assert!(latest.total_shares().is_empty());

        assert_eq!(poller.poll_once(&cancel).await.unwrap(), PollOutcome::Idle);
    }

    #[tokio::test]
    async fn test_poll_resumes_after_latest_snapshot() {
        let chain = MockChain::new(1000);
        chain.push_event(AMM, 750, 0, &deposit_event(ALICE, 10, 0, 0));
        let mut poller = poller(chain, PollConfig::default().with_confirmations(0).with_max_chunk(750));
        let cancel = CancellationToken::new();

        assert_eq!(
            poller.poll_once(&cancel).await.unwrap(),
            PollOutcome::Indexed { from: 100, to: 850, blocks: 1 }
        );

        // Cursor is forgotten on restart, the store decides
        let mut restarted = MarketPoller::new(
            poller.reader.clone(),
            poller.store.clone(),
            market(),
            PollConfig::default(),
        );
        assert_eq!(restarted.poll_once(&cancel).await.unwrap(), PollOutcome::Idle);
        assert_eq!(restarted.cursor(), None);
    }

    #[tokio::test]
    async fn test_empty_window_advances_cursor() {
        let chain = MockChain::new(50_000);
        let mut poller = poller(chain, PollConfig::default());
        let cancel = CancellationToken::new();

        assert_eq!(poller.poll_once(&cancel).await.unwrap(), PollOutcome::Empty { from: 100, to: 10_100 });
        assert_eq!(
            poller.poll_once(&cancel).await.unwrap(),
            PollOutcome::Empty { from: 10_101, to: 20_101 }
        );
        assert!(poller.store.blocks(AMM).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_block_is_not_stored() {
        let chain = MockChain::new(1000);
        chain.push_event(AMM, 200, 0, &deposit_event(ALICE, 10, 0, 0));
        chain.push_event(AMM, 300, 0, &deposit_event(ALICE, 10, 2, 1));
        let mut poller = poller(chain, PollConfig::default());

        let err = poller.poll_once(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_malformed_data());
        assert_eq!(poller.store.blocks(AMM), vec![200]);
        assert_eq!(poller.cursor(), None);
    }

    #[tokio::test]
    async fn test_cancelled_between_blocks() {
        let chain = MockChain::new(1000);
        chain.push_event(AMM, 200, 0, &deposit_event(ALICE, 10, 0, 0));
        let mut poller = poller(chain, PollConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(poller.poll_once(&cancel).await.unwrap(), PollOutcome::Cancelled);
        assert!(poller.store.blocks(AMM).is_empty());
    }

    #[tokio::test]
    async fn test_run_backs_off_on_errors() {
        let chain = MockChain::new(1000);
        chain.push_event(AMM, 200, 0, &deposit_event(ALICE, 10, 0, 0));
        chain.fail_next(3);
        let poller = poller(
            chain,
            PollConfig::default()
                .with_idle_interval(Duration::from_secs(60))
                .with_max_error_backoff(Duration::from_secs(100)),
        );
        let store = poller.store.clone();

        let cancel = CancellationToken::new();
        let sleeps = Mutex::new(Vec::new());
        let sleep = |delay: Duration| {
            let mut sleeps = sleeps.lock().unwrap();
            sleeps.push(delay);
            if sleeps.len() == 4 {
                cancel.cancel();
            }
            std::future::ready(())
        };
        poller.run(sleep, cancel.clone()).await;

        let secs = sleeps.lock().unwrap().iter().map(Duration::as_secs).collect::<Vec<_>>();
        // Three failures, then the window is indexed and the poller idles
        assert_eq!(secs, vec![60, 100, 100, 60]);
        assert_eq!(store.blocks(AMM), vec![200]);
    }
}
