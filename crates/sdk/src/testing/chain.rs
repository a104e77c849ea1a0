use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard},
};

use alloy::{
    primitives::{self, Address, Bytes, I256, LogData},
    rpc::types::Log,
    sol_types::{SolCall, SolEvent},
    transports::TransportErrorKind,
};

use crate::{
    abi::llamma::Llamma,
    error::IndexerError,
    num,
    reader::{ChainReader, LogQuery},
};

/// Band state of a market starting from some block: band range reported by
/// `min_band()`/`max_band()` and `(x, y)` reserves of consecutive bands from
/// `min_band` on, missing entries read as zero.
struct BandTable {
    min_band: i64,
    max_band: i64,
    reserves: Vec<(I256, I256)>,
}

/// In-memory [`ChainReader`].
///
/// Logs are returned in insertion order, not sorted, the same way a provider
/// gives no ordering guarantee.
#[derive(Default)]
pub struct MockChain {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    head: u64,
    logs: Vec<Log>,
    bands: HashMap<Address, BTreeMap<u64, BandTable>>,
    batch_calls: usize,
    log_queries: Vec<LogQuery>,
    failures: usize,
}

impl MockChain {
    pub fn new(head: u64) -> Self {
        Self { inner: Mutex::new(Inner { head, ..Default::default() }) }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> { self.inner.lock().unwrap() }

    pub fn set_head(&self, head: u64) { self.inner().head = head; }

    /// Makes the next `count` requests fail with a transport error.
    pub fn fail_next(&self, count: usize) { self.inner().failures = count; }

    /// Sets band reserves of `amm` effective from `from_block` on.
    pub fn set_bands(&self, amm: Address, from_block: u64, min_band: i64, reserves: Vec<(I256, I256)>) {
        let max_band = min_band + reserves.len() as i64 - 1;
        self.inner().bands.entry(amm).or_default().insert(from_block, BandTable {
            min_band,
            max_band,
            reserves,
        });
    }

    /// Sets the band range of `amm` effective from `from_block` on, all bands
    /// empty.
    pub fn set_band_range(&self, amm: Address, from_block: u64, min_band: i64, max_band: i64) {
        self.inner().bands.entry(amm).or_default().insert(from_block, BandTable {
            min_band,
            max_band,
            reserves: Vec::new(),
        });
    }

    /// Adds an event emitted by `address` at the given position.
    pub fn push_event<E: SolEvent>(&self, address: Address, block_number: u64, log_index: u64, event: &E) {
        self.push_log(address, block_number, log_index, event.encode_log_data());
    }

    pub fn push_log(&self, address: Address, block_number: u64, log_index: u64, data: LogData) {
        self.inner().logs.push(Log {
            inner: primitives::Log { address, data },
            block_number: Some(block_number),
            transaction_index: Some(log_index),
            log_index: Some(log_index),
            ..Default::default()
        });
    }

    /// Number of batched calls served so far.
    pub fn batch_calls(&self) -> usize { self.inner().batch_calls }

    /// Log queries served so far.
    pub fn log_queries(&self) -> Vec<LogQuery> { self.inner().log_queries.clone() }

    fn check_failure(&self) -> Result<(), IndexerError> {
        let mut inner = self.inner();
        if inner.failures > 0 {
            inner.failures -= 1;
            return Err(TransportErrorKind::custom_str("injected failure").into());
        }
        Ok(())
    }

    fn call(inner: &Inner, target: Address, data: &[u8], block_number: u64) -> Result<Bytes, IndexerError> {
        let empty = BandTable { min_band: 0, max_band: -1, reserves: Vec::new() };
        let table = inner
            .bands
            .get(&target)
            .and_then(|history| history.range(..=block_number).next_back())
            .map_or(&empty, |(_, table)| table);
        let reserve = |index: i64| {
            index
                .checked_sub(table.min_band)
                .and_then(|offset| usize::try_from(offset).ok())
                .and_then(|offset| table.reserves.get(offset))
                .copied()
                .unwrap_or_default()
        };

        if data.len() < 4 {
            return Err(IndexerError::InvalidArgument("call data without selector".to_string()));
        }
        let (selector, args) = data.split_at(4);
        let value = if selector == Llamma::min_bandCall::SELECTOR {
            I256::try_from(table.min_band).unwrap()
        } else if selector == Llamma::max_bandCall::SELECTOR {
            I256::try_from(table.max_band).unwrap()
        } else if selector == Llamma::bands_xCall::SELECTOR {
            reserve(num::band_index(num::decode_int256(args)?)?).0
        } else if selector == Llamma::bands_yCall::SELECTOR {
            reserve(num::band_index(num::decode_int256(args)?)?).1
        } else {
            return Err(IndexerError::InvalidArgument(format!("unsupported selector {selector:?}")));
        };
        Ok(Bytes::from(value.into_raw().to_be_bytes::<32>().to_vec()))
    }
}

impl ChainReader for MockChain {
    async fn head_height(&self) -> Result<u64, IndexerError> {
        self.check_failure()?;
        Ok(self.inner().head)
    }

    async fn logs(&self, query: &LogQuery) -> Result<Vec<Log>, IndexerError> {
        self.check_failure()?;
        let mut inner = self.inner();
        inner.log_queries.push(query.clone());
        Ok(inner
            .logs
            .iter()
            .filter(|log| {
                query.matches(
                    log.inner.address,
                    log.inner.data.topics().first().copied(),
                    log.block_number.unwrap_or_default(),
                )
            })
            .cloned()
            .collect())
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<Option<u64>, IndexerError> {
        self.check_failure()?;
        Ok((block_number <= self.inner().head).then_some(1_700_000_000 + block_number * 12))
    }

    async fn batch_call(
        &self,
        targets: Vec<Address>,
        calls: Vec<Bytes>,
        block_number: u64,
    ) -> Result<Vec<Bytes>, IndexerError> {
        self.check_failure()?;
        let mut inner = self.inner();
        inner.batch_calls += 1;
        targets
            .iter()
            .zip(&calls)
            .map(|(target, data)| Self::call(&inner, *target, data, block_number))
            .collect()
    }
}
