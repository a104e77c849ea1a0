//! Read-only access to the chain.
//!
//! [`ChainReader`] is the seam between the indexer and the RPC endpoint, so the
//! rest of the crate can be driven by [`RpcReader`] in production and by an
//! in-memory chain in tests.
//!
//! The reader performs no retries itself. It is recommended to setup the
//! provider with [`alloy::transports::layers::RetryBackoffLayer`], and with
//! [`alloy::transports::layers::ThrottleLayer`] for rate-limited endpoints.

use alloy::{
    eips::BlockId,
    primitives::{Address, B256, Bytes, U256},
    providers::Provider,
    rpc::types::{Filter, Log},
};

use crate::{Chain, abi::multicall::Multicaller, error::IndexerError};

/// Log filter over an inclusive block range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogQuery {
    address: Option<Address>,
    topics: Vec<B256>,
    from_block: u64,
    to_block: Option<u64>,
}

impl LogQuery {
    /// Query for logs starting at `from_block` up to the chain head.
    pub fn new(from_block: u64) -> Self {
        Self { address: None, topics: Vec::new(), from_block, to_block: None }
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Accepted event signatures (first topic), any of them matches.
    pub fn events(mut self, signatures: impl IntoIterator<Item = B256>) -> Self {
        self.topics.extend(signatures);
        self
    }

    pub fn to_block(mut self, to_block: u64) -> Self {
        self.to_block = Some(to_block);
        self
    }

    pub fn get_address(&self) -> Option<Address> { self.address }

    pub fn get_topics(&self) -> &[B256] { &self.topics }

    pub fn get_from_block(&self) -> u64 { self.from_block }

    pub fn get_to_block(&self) -> Option<u64> { self.to_block }

    /// Whether a log at the given position matches the query.
    pub fn matches(&self, address: Address, topic0: Option<B256>, block_number: u64) -> bool {
        self.address.is_none_or(|a| a == address)
            && (self.topics.is_empty() || topic0.is_some_and(|t| self.topics.contains(&t)))
            && block_number >= self.from_block
            && self.to_block.is_none_or(|to| block_number <= to)
    }

    fn to_filter(&self) -> Filter {
        let mut filter = Filter::new().from_block(self.from_block);
        if let Some(to_block) = self.to_block {
            filter = filter.to_block(to_block);
        }
        if let Some(address) = self.address {
            filter = filter.address(address);
        }
        if !self.topics.is_empty() {
            filter = filter.event_signature(self.topics.clone());
        }
        filter
    }
}

/// Read-only chain access used by the indexer.
pub trait ChainReader: Send + Sync {
    /// Current chain head block number.
    fn head_height(&self) -> impl Future<Output = Result<u64, IndexerError>> + Send;

    /// Logs matching the query.
    ///
    /// Order is whatever the endpoint delivers, see [`sort_logs`].
    fn logs(&self, query: &LogQuery) -> impl Future<Output = Result<Vec<Log>, IndexerError>> + Send;

    /// Timestamp of the block, `None` if the block does not exist yet.
    fn block_timestamp(
        &self,
        block_number: u64,
    ) -> impl Future<Output = Result<Option<u64>, IndexerError>> + Send;

    /// Executes all calls against the state of the same block in a single
    /// round trip, returning raw return data in call order.
    fn batch_call(
        &self,
        targets: Vec<Address>,
        calls: Vec<Bytes>,
        block_number: u64,
    ) -> impl Future<Output = Result<Vec<Bytes>, IndexerError>> + Send;
}

/// [`ChainReader`] over an alloy [`Provider`], batching calls through the
/// chain's multicall aggregator.
#[derive(Clone, Debug)]
pub struct RpcReader<P> {
    provider: P,
    multicall: Address,
}

impl<P: Provider> RpcReader<P> {
    pub fn new(chain: &Chain, provider: P) -> Self {
        Self { provider, multicall: chain.multicall() }
    }

    pub fn provider(&self) -> &P { &self.provider }
}

impl<P: Provider> ChainReader for RpcReader<P> {
    async fn head_height(&self) -> Result<u64, IndexerError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<Log>, IndexerError> {
        Ok(self.provider.get_logs(&query.to_filter()).await?)
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<Option<u64>, IndexerError> {
        let block = self.provider.get_block(BlockId::number(block_number)).await?;
        Ok(block.map(|b| b.header.timestamp))
    }

    async fn batch_call(
        &self,
        targets: Vec<Address>,
        calls: Vec<Bytes>,
        block_number: u64,
    ) -> Result<Vec<Bytes>, IndexerError> {
        if targets.len() != calls.len() {
            return Err(IndexerError::InvalidArgument(format!(
                "{} call targets for {} calls",
                targets.len(),
                calls.len()
            )));
        }
        let values = vec![U256::ZERO; calls.len()];
        let results = Multicaller::new(self.multicall, &self.provider)
            .aggregate(targets, calls, values)
            .block(BlockId::number(block_number))
            .call()
            .await?;
        Ok(results)
    }
}

/// Sorts logs into causal order: block number, then log index.
pub fn sort_logs(logs: &mut [Log]) {
    logs.sort_by_key(|log| (log.block_number.unwrap_or_default(), log.log_index.unwrap_or_default()));
}
