use std::collections::BTreeMap;

use dashmap::DashMap;

use super::*;

/// In-memory [`SnapshotStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: DashMap<Address, BTreeMap<u64, AmmSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Block numbers of stored snapshots of the market, ascending.
    pub fn blocks(&self, market: Address) -> Vec<u64> {
        self.snapshots.get(&market).map(|s| s.keys().copied().collect()).unwrap_or_default()
    }
}

impl SnapshotStore for MemoryStore {
    async fn put(&self, snapshot: AmmSnapshot) -> Result<(), IndexerError> {
        let market = snapshot.market();
        let mut snapshots = self.snapshots.entry(market).or_default();
        check_order(market, snapshot.block_number(), snapshots.keys().next_back().copied())?;
        snapshots.insert(snapshot.block_number(), snapshot);
        Ok(())
    }

    async fn latest(&self, market: Address) -> Result<Option<AmmSnapshot>, IndexerError> {
        Ok(self
            .snapshots
            .get(&market)
            .and_then(|s| s.last_key_value().map(|(_, snapshot)| snapshot.clone())))
    }

    async fn latest_at_or_before(
        &self,
        market: Address,
        block_number: u64,
    ) -> Result<Option<AmmSnapshot>, IndexerError> {
        Ok(self
            .snapshots
            .get(&market)
            .and_then(|s| s.range(..=block_number).next_back().map(|(_, snapshot)| snapshot.clone())))
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;
    use crate::state::ledger::apply_block;

    const AMM: Address = address!("0x136e783846ef68C8Bd00a3369F787dF8d683a696");

    fn empty(block_number: u64) -> AmmSnapshot {
        apply_block(AMM, None, block_number, BTreeMap::new(), &[]).unwrap()
    }

    #[tokio::test]
    async fn test_put_is_monotonic() {
        let store = MemoryStore::new();
        store.put(empty(10)).await.unwrap();
        store.put(empty(12)).await.unwrap();

        assert!(matches!(
            store.put(empty(12)).await,
            Err(IndexerError::OutOfOrder { block: 12, latest: 12, .. })
        ));
        assert!(matches!(store.put(empty(11)).await, Err(IndexerError::OutOfOrder { .. })));
        assert_eq!(store.blocks(AMM), vec![10, 12]);
        assert_eq!(store.latest(AMM).await.unwrap().unwrap().block_number(), 12);
    }

    #[tokio::test]
    async fn test_latest_at_or_before() {
        let store = MemoryStore::new();
        for block in [10, 20, 30] {
            store.put(empty(block)).await.unwrap();
        }

        assert!(store.latest_at_or_before(AMM, 9).await.unwrap().is_none());
        assert_eq!(store.latest_at_or_before(AMM, 25).await.unwrap().unwrap().block_number(), 20);
        assert_eq!(store.latest_at_or_before(AMM, 100).await.unwrap().unwrap().block_number(), 30);
    }
}
