//! crvUSD LLAMMA band ledger indexer.
//!
//! # Overview
//!
//! Event-sourced reconstruction of LLAMMA market state: price bands, band
//! reserves and per-user share positions, materialized as one immutable
//! [`state::AmmSnapshot`] per market per block with activity.
//!
//! Use [`discovery::discover`] to find markets created by the controller
//! factory, [`poller::MarketPoller`] to keep one market's snapshot chain up to
//! date, or [`indexer::Indexer`] to do both for every market on the chain.
//! Snapshots are persisted through [`store::SnapshotStore`] and read back with
//! [`store::lookup`].
//!
//! All chain access goes through [`reader::ChainReader`]; [`reader::RpcReader`]
//! implements it on top of any alloy [`alloy::providers::Provider`].
//!
//! # Limitations/follow-ups
//!
//! * Reorganizations deeper than the configured confirmation depth are not
//!   handled, stored snapshots are never rewritten.
//!
//! * Shares are derived from `Deposit`/`Withdraw` events only, so a market has
//!   to be indexed from its creation block for share totals to be complete.
//!
//! # Features
//!
//! | Feature | Default | Description |
//! | --- | --- | --- |
//! | `display` | yes | Enables [`std::fmt::Display`] implementation for state types. |
//! | `testing` | yes | Enables [`testing`] module. |

pub mod abi;
pub mod bands;
pub mod discovery;
pub mod error;
pub mod indexer;
pub mod num;
pub mod poller;
pub mod reader;
pub mod state;
pub mod store;
#[cfg(feature = "testing")]
pub mod testing;
pub mod types;

use alloy::primitives::{Address, address};

#[derive(Clone, Debug)]
/// Chain the markets are deployed on.
pub struct Chain {
    chain_id: u64,
    factory: Address,
    factory_deployed_at_block: u64,
    multicall: Address,
}

impl Chain {
    /// Ethereum mainnet crvUSD controller factory.
    pub fn mainnet() -> Self {
        Self {
            chain_id: 1,
            factory: address!("0xC9332fdCB1C491Dcc683bAe86Fe3cb70360738BC"),
            factory_deployed_at_block: 17257955,
            multicall: address!("0x000000000088228fCF7b8af41Faf3955bD0B3A41"),
        }
    }

    pub fn custom(
        chain_id: u64,
        factory: Address,
        factory_deployed_at_block: u64,
        multicall: Address,
    ) -> Self {
        Self { chain_id, factory, factory_deployed_at_block, multicall }
    }

    pub fn chain_id(&self) -> u64 { self.chain_id }

    /// Controller factory emitting `AddMarket` events.
    pub fn factory(&self) -> Address { self.factory }

    /// Block the factory was deployed at, first block of market discovery.
    pub fn factory_deployed_at_block(&self) -> u64 { self.factory_deployed_at_block }

    /// Multicall aggregator used for batched reads.
    pub fn multicall(&self) -> Address { self.multicall }
}
