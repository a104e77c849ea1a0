use super::*;

/// Shares of a single user, per band.
pub type Position = BTreeMap<types::BandIndex, U256>;

/// Ledger state of a LLAMMA market at a block.
///
/// Snapshots are immutable: the state at a later block is a new snapshot
/// derived from the most recent prior one by [`ledger::apply_block`].
///
/// Holds, up to truncation dust of deposits split across bands:
/// * `total_shares[i]` is the sum of `user_shares[u][i]` over all users;
/// * `bands[i].users` is the set of users with shares in band `i`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AmmSnapshot {
    market: Address,
    block_number: u64,
    bands: BTreeMap<types::BandIndex, Band>,
    total_shares: BTreeMap<types::BandIndex, U256>,
    user_shares: BTreeMap<Address, Position>,
}

impl AmmSnapshot {
    pub(crate) fn new(
        market: Address,
        block_number: u64,
        bands: BTreeMap<types::BandIndex, Band>,
        total_shares: BTreeMap<types::BandIndex, U256>,
        user_shares: BTreeMap<Address, Position>,
    ) -> Self {
        Self { market, block_number, bands, total_shares, user_shares }
    }

    /// AMM address of the market.
    pub fn market(&self) -> Address { self.market }

    pub fn block_number(&self) -> u64 { self.block_number }

    /// Bands with liquidity or with users holding shares in them.
    pub fn bands(&self) -> &BTreeMap<types::BandIndex, Band> { &self.bands }

    /// Total shares per band, bands without shares are absent.
    pub fn total_shares(&self) -> &BTreeMap<types::BandIndex, U256> { &self.total_shares }

    /// Shares per user per band, users without position are absent.
    pub fn user_shares(&self) -> &BTreeMap<Address, Position> { &self.user_shares }

    pub fn position(&self, user: &Address) -> Option<&Position> { self.user_shares.get(user) }

    /// Sum of band reserves, `(x, y)`.
    pub fn total_reserves(&self) -> (I256, I256) {
        self.bands.values().fold((I256::ZERO, I256::ZERO), |(x, y), band| {
            (x + band.reserve_x(), y + band.reserve_y())
        })
    }

    pub(crate) fn into_parts(
        self,
    ) -> (BTreeMap<types::BandIndex, Band>, BTreeMap<types::BandIndex, U256>, BTreeMap<Address, Position>)
    {
        (self.bands, self.total_shares, self.user_shares)
    }
}

#[cfg(feature = "display")]
impl std::fmt::Display for AmmSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use colored::Colorize;
        use fastnum::D256;
        use tabled::{Table, Tabled, settings::Style};

        #[derive(Tabled)]
        struct BandRow {
            #[tabled(rename = "Band")]
            index: types::BandIndex,
            #[tabled(rename = "Reserve X")]
            reserve_x: D256,
            #[tabled(rename = "Reserve Y")]
            reserve_y: D256,
            #[tabled(rename = "Total Shares")]
            total_shares: String,
            #[tabled(rename = "Users")]
            users: usize,
        }

        let converter = num::Converter::ether();
        let (x, y) = self.total_reserves();
        writeln!(
            f,
            "{} at block #{}\n    Bands: {} | Users: {} | Reserve X: {} | Reserve Y: {}",
            format!("LLAMMA {}", self.market).blue(),
            self.block_number,
            self.bands.len(),
            self.user_shares.len(),
            converter.to_decimal(x).map_err(|_| std::fmt::Error)?.to_string().green(),
            converter.to_decimal(y).map_err(|_| std::fmt::Error)?.to_string().green(),
        )?;

        // Render bands in alternate mode
        if f.alternate() {
            let rows = self
                .bands
                .values()
                .map(|band| {
                    Ok(BandRow {
                        index: band.index(),
                        reserve_x: converter.to_decimal(band.reserve_x())?,
                        reserve_y: converter.to_decimal(band.reserve_y())?,
                        total_shares: match self.total_shares.get(&band.index()) {
                            Some(shares) => converter.to_unsigned_decimal(*shares)?.to_string(),
                            None => "-".to_string(),
                        },
                        users: band.users().len(),
                    })
                })
                .collect::<Result<Vec<_>, crate::error::IndexerError>>()
                .map_err(|_| std::fmt::Error)?;
            let mut table = Table::new(rows);
            table.with(Style::sharp());
            write!(f, "{table}")
        } else {
            Ok(())
        }
    }
}

#[cfg(all(test, feature = "display"))]
mod tests {
    use alloy::primitives::address;

    use super::*;

    #[test]
    fn test_display_renders_decimals() {
        let market = address!("0x136e783846ef68C8Bd00a3369F787dF8d683a696");
        let converter = num::Converter::ether();
        let half = converter.parse_signed("0.5").unwrap();
        let band = Band::new(-3, converter.parse_signed("-1.25").unwrap(), half);
        let snapshot = AmmSnapshot::new(
            market,
            100,
            BTreeMap::from([(-3, band)]),
            BTreeMap::from([(-3, converter.parse_unsigned("2.75").unwrap())]),
            BTreeMap::new(),
        );

        let short = snapshot.to_string();
        let full = format!("{snapshot:#}");

        assert!(short.contains("at block #100"));
        assert!(short.contains("-1.25"));
        assert!(short.contains("0.5"));
        assert!(!short.contains("Total Shares"));
        assert!(full.contains("Total Shares"));
        assert!(full.contains("2.75"));
        assert!(full.contains("-1.25"));
    }
}
