//! Materialized LLAMMA ledger state.
//!
//! [`AmmSnapshot`] is the state of one market at one block, [`ledger`] derives
//! the next snapshot from the previous one and the events of a block.

mod band;
pub mod ledger;
mod snapshot;

use std::collections::{BTreeMap, BTreeSet};

use alloy::primitives::{Address, I256, U256};
pub use band::*;
pub use snapshot::*;

use crate::{num, types};
