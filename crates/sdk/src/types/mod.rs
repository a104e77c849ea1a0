mod event;
mod market;

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use event::*;
pub use market::*;

/// Signed index of a LLAMMA price band.
pub type BandIndex = i64;

/// Instant in chain history the state/event is up to date with.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Eq, Ord, Hash, Default)]
pub struct StateInstant {
    block_number: u64,
    block_timestamp: u64,
}

impl StateInstant {
    pub fn new(block_number: u64, block_timestamp: u64) -> Self {
        Self { block_number, block_timestamp }
    }

    pub fn block_number(&self) -> u64 { self.block_number }

    pub fn block_timestamp(&self) -> u64 { self.block_timestamp }
}

impl Display for StateInstant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match DateTime::<Utc>::from_timestamp(self.block_timestamp as i64, 0) {
            Some(ts) if self.block_timestamp > 0 => {
                write!(f, "#{} @ {}", self.block_number, ts.format("%Y-%m-%d %H:%M:%S"))
            },
            _ => write!(f, "#{}", self.block_number),
        }
    }
}

/// Block a snapshot is requested at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlockSelector {
    /// Most recent stored snapshot.
    #[default]
    Latest,
    /// Most recent stored snapshot at or before the block.
    AtOrBefore(u64),
}

impl FromStr for BlockSelector {
    type Err = crate::error::IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("latest") {
            return Ok(BlockSelector::Latest);
        }
        if let Ok(block) = u64::from_str(s) {
            return Ok(BlockSelector::AtOrBefore(block));
        }
        Err(crate::error::IndexerError::InvalidArgument(format!(
            "invalid block number: {}",
            s
        )))
    }
}

impl Display for BlockSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockSelector::Latest => write!(f, "latest"),
            BlockSelector::AtOrBefore(block) => write!(f, "{}", block),
        }
    }
}
