use alloy::primitives::Address;

/// Index of the market in the controller factory.
pub type MarketId = u64;

/// LLAMMA market created by the controller factory.
///
/// Identified by its AMM address (equivalently by [`Market::id`]), never
/// changes once discovered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Market {
    id: MarketId,
    collateral_token: Address,
    controller: Address,
    amm: Address,
    monetary_policy: Address,
    created_at_block: u64,
}

impl Market {
    pub fn new(
        id: MarketId,
        collateral_token: Address,
        controller: Address,
        amm: Address,
        monetary_policy: Address,
        created_at_block: u64,
    ) -> Self {
        Self { id, collateral_token, controller, amm, monetary_policy, created_at_block }
    }

    pub fn id(&self) -> MarketId { self.id }

    /// Collateral token of the market.
    pub fn collateral_token(&self) -> Address { self.collateral_token }

    /// Controller contract managing loans of the market.
    pub fn controller(&self) -> Address { self.controller }

    /// LLAMMA contract holding the bands, the address snapshots are keyed by.
    pub fn amm(&self) -> Address { self.amm }

    pub fn monetary_policy(&self) -> Address { self.monetary_policy }

    /// Block of the `AddMarket` event, indexing of the market starts here.
    pub fn created_at_block(&self) -> u64 { self.created_at_block }
}
