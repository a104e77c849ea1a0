use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use super::*;
use crate::{
    num,
    state::{Band, Position},
};

/// [`SnapshotStore`] writing one JSON file per snapshot to
/// `<root>/<market>/<block>.json`.
///
/// Amounts are stored as decimal strings with 18 decimals and parse back
/// exactly. A snapshot is written to a temporary file first and renamed into
/// place, so a partially written snapshot is never visible.
///
/// Block numbers of a market are listed from disk on first access and kept in
/// memory afterwards, shared between clones. The store expects to be the only
/// writer of its directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
    index: Arc<DashMap<Address, BTreeSet<u64>>>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), index: Arc::new(DashMap::new()) }
    }

    pub fn root(&self) -> &Path { &self.root }

    fn market_dir(&self, market: Address) -> PathBuf { self.root.join(market.to_string()) }

    /// Block numbers of stored snapshots of the market, ascending.
    pub async fn blocks(&self, market: Address) -> Result<BTreeSet<u64>, IndexerError> {
        self.load_index(market).await?;
        Ok(self.index.get(&market).map(|blocks| blocks.clone()).unwrap_or_default())
    }

    async fn load_index(&self, market: Address) -> Result<(), IndexerError> {
        if self.index.contains_key(&market) {
            return Ok(());
        }
        let blocks = self.scan(market).await?;
        debug!(market = %market, snapshots = blocks.len(), "loaded snapshot index");
        self.index.entry(market).or_insert(blocks);
        Ok(())
    }

    async fn scan(&self, market: Address) -> Result<BTreeSet<u64>, IndexerError> {
        let mut entries = match fs::read_dir(self.market_dir(market)).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(err) => return Err(err.into()),
        };
        let mut blocks = BTreeSet::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(block_number) =
                    path.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse().ok())
            {
                blocks.insert(block_number);
            }
        }
        Ok(blocks)
    }

    /// Most recent indexed block of the market at or before `block_number`.
    async fn find(&self, market: Address, block_number: u64) -> Result<Option<u64>, IndexerError> {
        self.load_index(market).await?;
        Ok(self
            .index
            .get(&market)
            .and_then(|blocks| blocks.range(..=block_number).next_back().copied()))
    }

    async fn read(&self, market: Address, block_number: u64) -> Result<AmmSnapshot, IndexerError> {
        let bytes = fs::read(self.market_dir(market).join(format!("{block_number}.json"))).await?;
        serde_json::from_slice::<SnapshotRecord>(&bytes)?.into_snapshot()
    }
}

impl SnapshotStore for FileStore {
    async fn put(&self, snapshot: AmmSnapshot) -> Result<(), IndexerError> {
        let market = snapshot.market();
        let block_number = snapshot.block_number();
        check_order(market, block_number, self.find(market, u64::MAX).await?)?;

        let dir = self.market_dir(market);
        fs::create_dir_all(&dir).await?;
        let json = serde_json::to_vec_pretty(&SnapshotRecord::from_snapshot(&snapshot))?;
        let tmp = dir.join(format!("{block_number}.json.tmp"));
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, dir.join(format!("{block_number}.json"))).await?;
        self.index.entry(market).or_default().insert(block_number);

        debug!(market = %market, block = block_number, "stored snapshot");
        Ok(())
    }

    async fn latest(&self, market: Address) -> Result<Option<AmmSnapshot>, IndexerError> {
        self.latest_at_or_before(market, u64::MAX).await
    }

    async fn latest_at_or_before(
        &self,
        market: Address,
        block_number: u64,
    ) -> Result<Option<AmmSnapshot>, IndexerError> {
        match self.find(market, block_number).await? {
            Some(found) => Ok(Some(self.read(market, found).await?)),
            None => Ok(None),
        }
    }
}

/// On-disk form of [`AmmSnapshot`].
#[derive(Serialize, Deserialize)]
struct SnapshotRecord {
    market: String,
    block_number: u64,
    bands: Vec<BandRecord>,
    total_shares: BTreeMap<i64, String>,
    user_shares: BTreeMap<String, BTreeMap<i64, String>>,
}

#[derive(Serialize, Deserialize)]
struct BandRecord {
    index: i64,
    reserve_x: String,
    reserve_y: String,
    users: Vec<String>,
}

impl SnapshotRecord {
    fn from_snapshot(snapshot: &AmmSnapshot) -> Self {
        let converter = num::Converter::ether();
        let shares = |position: &Position| {
            position.iter().map(|(i, s)| (*i, converter.format_unsigned(*s))).collect()
        };
        Self {
            market: snapshot.market().to_string(),
            block_number: snapshot.block_number(),
            bands: snapshot
                .bands()
                .values()
                .map(|band| BandRecord {
                    index: band.index(),
                    reserve_x: converter.format_signed(band.reserve_x()),
                    reserve_y: converter.format_signed(band.reserve_y()),
                    users: band.users().iter().map(Address::to_string).collect(),
                })
                .collect(),
            total_shares: shares(snapshot.total_shares()),
            user_shares: snapshot
                .user_shares()
                .iter()
                .map(|(user, position)| (user.to_string(), shares(position)))
                .collect(),
        }
    }

    fn into_snapshot(self) -> Result<AmmSnapshot, IndexerError> {
        let converter = num::Converter::ether();
        let shares = |position: BTreeMap<i64, String>| {
            position
                .into_iter()
                .map(|(i, s)| Ok((i, converter.parse_unsigned(&s)?)))
                .collect::<Result<Position, IndexerError>>()
        };

        let bands = self
            .bands
            .into_iter()
            .map(|band| {
                let users = band
                    .users
                    .iter()
                    .map(|user| parse_address(user))
                    .collect::<Result<BTreeSet<_>, _>>()?;
                let reserve_x = converter.parse_signed(&band.reserve_x)?;
                let reserve_y = converter.parse_signed(&band.reserve_y)?;
                Ok((band.index, Band::new(band.index, reserve_x, reserve_y).with_users(users)))
            })
            .collect::<Result<_, IndexerError>>()?;
        let total_shares = shares(self.total_shares)?;
        let user_shares = self
            .user_shares
            .into_iter()
            .map(|(user, position)| Ok((parse_address(&user)?, shares(position)?)))
            .collect::<Result<_, IndexerError>>()?;

        Ok(AmmSnapshot::new(
            parse_address(&self.market)?,
            self.block_number,
            bands,
            total_shares,
            user_shares,
        ))
    }
}

fn parse_address(value: &str) -> Result<Address, IndexerError> {
    Address::from_str(value)
        .map_err(|err| IndexerError::Decode(format!("stored address {value}: {err}")))
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{I256, address};

    use super::*;
    use crate::{
        state::ledger::apply_block,
        testing::{deposit, ether},
    };

    const AMM: Address = address!("0x136e783846ef68C8Bd00a3369F787dF8d683a696");
    const ALICE: Address = address!("0x00000000000000000000000000000000000a11ce");
    const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

    async fn temp_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("llamma-store-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root).await;
        root
    }

    fn snapshot(block_number: u64) -> AmmSnapshot {
        let fresh = [
            (-1, Band::new(-1, ether(1) + I256::ONE, I256::ZERO)),
            (0, Band::new(0, I256::ZERO, ether(3))),
        ]
        .into_iter()
        .collect();
        apply_block(
            AMM,
            None,
            block_number,
            fresh,
            &[deposit(block_number, 0, ALICE, 301, -1, 1), deposit(block_number, 1, BOB, 5, 0, 0)],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_is_exact() {
        let root = temp_root("round-trip").await;
        let store = FileStore::new(&root);
        let stored = snapshot(200);

        store.put(stored.clone()).await.unwrap();
        let loaded = store.latest(AMM).await.unwrap().unwrap();

        assert_eq!(loaded, stored);
        assert_eq!(loaded.bands()[&-1].reserve_x(), ether(1) + I256::ONE);
        assert!(loaded.bands()[&1].users().contains(&ALICE));

        fs::remove_dir_all(root).await.unwrap();
    }

    #[tokio::test]
    async fn test_ordering() {
        let root = temp_root("ordering").await;
        let store = FileStore::new(&root);

        assert!(store.latest(AMM).await.unwrap().is_none());
        store.put(snapshot(200)).await.unwrap();
        store.put(snapshot(250)).await.unwrap();
        assert!(matches!(store.put(snapshot(250)).await, Err(IndexerError::OutOfOrder { .. })));

        assert_eq!(store.blocks(AMM).await.unwrap().into_iter().collect::<Vec<_>>(), vec![200, 250]);
        assert_eq!(store.latest(AMM).await.unwrap().unwrap().block_number(), 250);
        assert_eq!(store.latest_at_or_before(AMM, 249).await.unwrap().unwrap().block_number(), 200);
        assert!(store.latest_at_or_before(AMM, 199).await.unwrap().is_none());

        fs::remove_dir_all(root).await.unwrap();
    }

    #[tokio::test]
    async fn test_index_is_loaded_once() {
        let root = temp_root("index").await;
        let store = FileStore::new(&root);
        store.put(snapshot(200)).await.unwrap();

        // A restarted store picks up what is on disk
        let restarted = FileStore::new(&root);
        assert_eq!(restarted.latest(AMM).await.unwrap().unwrap().block_number(), 200);

        // Once loaded, lookups are served from the index, not from listing the directory
        fs::copy(
            root.join(AMM.to_string()).join("200.json"),
            root.join(AMM.to_string()).join("300.json"),
        )
        .await
        .unwrap();
        assert_eq!(store.blocks(AMM).await.unwrap().into_iter().collect::<Vec<_>>(), vec![200]);
        assert_eq!(restarted.latest(AMM).await.unwrap().unwrap().block_number(), 200);

        // Clones share the index
        let clone = store.clone();
        clone.put(snapshot(400)).await.unwrap();
        assert_eq!(store.latest(AMM).await.unwrap().unwrap().block_number(), 400);

        fs::remove_dir_all(root).await.unwrap();
    }
}
