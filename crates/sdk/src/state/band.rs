use super::*;

/// Price band of a LLAMMA market.
///
/// Reserves are exact fixed-point values with 18 decimals, `x` is the
/// stablecoin side and `y` the collateral side. `users` are the addresses with
/// shares recorded in the band.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Band {
    index: types::BandIndex,
    #[debug("{}", num::Converter::ether().format_signed(*reserve_x))]
    reserve_x: I256,
    #[debug("{}", num::Converter::ether().format_signed(*reserve_y))]
    reserve_y: I256,
    users: BTreeSet<Address>,
}

impl Band {
    pub fn new(index: types::BandIndex, reserve_x: I256, reserve_y: I256) -> Self {
        Self { index, reserve_x, reserve_y, users: BTreeSet::new() }
    }

    pub(crate) fn with_users(mut self, users: BTreeSet<Address>) -> Self {
        self.users = users;
        self
    }

    /// Band without reserves, a placeholder for users depositing into a band
    /// the reserve read did not report.
    pub(crate) fn vacant(index: types::BandIndex) -> Self {
        Self::new(index, I256::ZERO, I256::ZERO)
    }

    pub fn index(&self) -> types::BandIndex { self.index }

    /// Stablecoin reserve of the band.
    pub fn reserve_x(&self) -> I256 { self.reserve_x }

    /// Collateral reserve of the band.
    pub fn reserve_y(&self) -> I256 { self.reserve_y }

    pub fn users(&self) -> &BTreeSet<Address> { &self.users }

    pub fn has_liquidity(&self) -> bool { !self.reserve_x.is_zero() || !self.reserve_y.is_zero() }

    /// No liquidity and nobody holding shares, such band is not part of a
    /// snapshot.
    pub fn is_vacant(&self) -> bool { !self.has_liquidity() && self.users.is_empty() }

    pub(crate) fn insert_user(&mut self, user: Address) { self.users.insert(user); }

    pub(crate) fn remove_user(&mut self, user: &Address) { self.users.remove(user); }
}
