//! In-memory chain for tests.
//!
//! [`MockChain`] answers [`crate::reader::ChainReader`] requests from logs and
//! band tables set up by the test, encoding real ABI data so the decoding
//! paths are exercised the same way as against a node.

mod chain;
mod events;

pub use chain::*;
pub use events::*;
