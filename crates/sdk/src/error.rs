use alloy::{contract, primitives::Address, sol_types, transports::TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("RPC transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("contract call error: {0}")]
    Contract(#[from] contract::Error),

    #[error("ABI decoding error: {0}")]
    Abi(#[from] sol_types::Error),

    #[error("malformed chain data: {0}")]
    Decode(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("snapshot of {market} at block {block} is not after the latest stored block {latest}")]
    OutOfOrder { market: Address, block: u64, latest: u64 },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IndexerError {
    /// Errors caused by the data the chain returned rather than by the
    /// transport or storage.
    pub fn is_malformed_data(&self) -> bool {
        matches!(self, IndexerError::Abi(_) | IndexerError::Decode(_))
    }
}
