//! Snapshot persistence.
//!
//! Snapshots of a market form a strictly increasing chain by block number,
//! [`SnapshotStore::put`] rejects a snapshot not after the latest stored one.
//! [`MemoryStore`] keeps everything in memory, [`FileStore`] writes one JSON
//! record per snapshot.

mod file;
mod memory;

use alloy::primitives::Address;
pub use file::*;
pub use memory::*;

use crate::{error::IndexerError, state::AmmSnapshot, types::BlockSelector};

/// Ordered key-value store of snapshots keyed by (market, block number).
pub trait SnapshotStore: Send + Sync {
    /// Persists the snapshot, fails with [`IndexerError::OutOfOrder`] if its
    /// block is not after the latest stored block of the market.
    fn put(&self, snapshot: AmmSnapshot) -> impl Future<Output = Result<(), IndexerError>> + Send;

    /// Most recent snapshot of the market.
    fn latest(
        &self,
        market: Address,
    ) -> impl Future<Output = Result<Option<AmmSnapshot>, IndexerError>> + Send;

    /// Most recent snapshot of the market at or before `block_number`.
    fn latest_at_or_before(
        &self,
        market: Address,
        block_number: u64,
    ) -> impl Future<Output = Result<Option<AmmSnapshot>, IndexerError>> + Send;
}

/// Looks up the snapshot of `market` selected by `selector`.
///
/// Fails with [`IndexerError::NotFound`] if the market has no snapshot at or
/// before the selected block.
pub async fn lookup<S: SnapshotStore>(
    store: &S,
    market: Address,
    selector: BlockSelector,
) -> Result<AmmSnapshot, IndexerError> {
    let snapshot = match selector {
        BlockSelector::Latest => store.latest(market).await?,
        BlockSelector::AtOrBefore(block_number) => {
            store.latest_at_or_before(market, block_number).await?
        },
    };
    snapshot.ok_or_else(|| IndexerError::NotFound(format!("snapshot of {market} at {selector}")))
}

fn check_order(market: Address, block_number: u64, latest: Option<u64>) -> Result<(), IndexerError> {
    match latest {
        Some(latest) if block_number <= latest => {
            Err(IndexerError::OutOfOrder { market, block: block_number, latest })
        },
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;
    use crate::{
        state::ledger::apply_block,
        testing::{deposit, ether},
    };

    const AMM: Address = address!("0x136e783846ef68C8Bd00a3369F787dF8d683a696");
    const ALICE: Address = address!("0x00000000000000000000000000000000000a11ce");

    fn snapshot(block_number: u64) -> AmmSnapshot {
        let fresh = [(0, crate::state::Band::new(0, ether(1), ether(2)))].into_iter().collect();
        apply_block(AMM, None, block_number, fresh, &[deposit(block_number, 0, ALICE, 10, 0, 1)]).unwrap()
    }

    #[tokio::test]
    async fn test_lookup() {
        let store = MemoryStore::new();
        store.put(snapshot(200)).await.unwrap();
        store.put(snapshot(250)).await.unwrap();

        assert_eq!(lookup(&store, AMM, BlockSelector::Latest).await.unwrap().block_number(), 250);
        assert_eq!(
            lookup(&store, AMM, BlockSelector::AtOrBefore(249)).await.unwrap().block_number(),
            200
        );
        assert_eq!(
            lookup(&store, AMM, BlockSelector::AtOrBefore(250)).await.unwrap().block_number(),
            250
        );

        let err = lookup(&store, AMM, BlockSelector::AtOrBefore(199)).await.unwrap_err();
        assert!(matches!(err, IndexerError::NotFound(_)));
        let err = lookup(&store, ALICE, BlockSelector::Latest).await.unwrap_err();
        assert!(matches!(err, IndexerError::NotFound(_)));
    }

    #[test]
    fn test_check_order() {
        assert!(check_order(AMM, 1, None).is_ok());
        assert!(check_order(AMM, 11, Some(10)).is_ok());
        assert!(matches!(
            check_order(AMM, 10, Some(10)),
            Err(IndexerError::OutOfOrder { block: 10, latest: 10, .. })
        ));
    }
}
