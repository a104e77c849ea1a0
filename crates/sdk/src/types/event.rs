use alloy::{rpc::types::Log, sol_types::SolEventInterface};

use crate::error::IndexerError;

/// Event with its position in chain history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext<E> {
    block_number: u64,
    log_index: u64,
    event: E,
}

impl<E> EventContext<E> {
    pub fn new(block_number: u64, log_index: u64, event: E) -> Self {
        Self { block_number, log_index, event }
    }

    pub fn block_number(&self) -> u64 { self.block_number }

    pub fn log_index(&self) -> u64 { self.log_index }

    pub fn event(&self) -> &E { &self.event }
}

impl<E: SolEventInterface> EventContext<E> {
    /// Decodes an RPC log into a typed contract event.
    ///
    /// Logs without block number are pending and are rejected, the indexer
    /// only works with mined blocks.
    pub fn decode(log: &Log) -> Result<Self, IndexerError> {
        let block_number = log
            .block_number
            .ok_or_else(|| IndexerError::Decode("log without block number".to_string()))?;
        Ok(Self::new(
            block_number,
            log.log_index.unwrap_or_default(),
            E::decode_log(&log.inner)?.data,
        ))
    }
}

/// Events of a single block, in log index order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockEvents<E> {
    block_number: u64,
    events: Vec<E>,
}

impl<E> BlockEvents<E> {
    pub fn new(block_number: u64, events: Vec<E>) -> Self { Self { block_number, events } }

    pub fn block_number(&self) -> u64 { self.block_number }

    pub fn events(&self) -> &[E] { &self.events }
}
