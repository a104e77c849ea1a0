//! Event-sourced maintenance of the band ledger.
//!
//! The ledger of a block is derived from the ledger of the most recent prior
//! block with activity, the band reserves read at the block, and the
//! `Deposit`/`Withdraw` events of the block:
//!
//! * reserves always come from the chain, see [`merge_reserves`];
//! * shares are accumulated from events, a `Deposit(amount, n1, n2)` splits
//!   `amount` evenly over bands `n1..=n2` with floor division, the remainder is
//!   not distributed; a `Withdraw` always closes the whole position of the
//!   user.
//!
//! `TokenExchange` events move reserves only, which the reserve read already
//! reflects, so they do not take part in share accounting.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use super::*;
use crate::{
    abi::llamma::Llamma::{self, LlammaEvents},
    bands,
    error::IndexerError,
    reader::ChainReader,
};

/// Decoded LLAMMA event with its position in the block.
pub type LedgerEvent = types::EventContext<LlammaEvents>;

/// Merges freshly read reserves into the bands of the prior snapshot.
///
/// Bands present in `fresh` keep the users recorded in `prior` and take the
/// fresh reserves; bands new in `fresh` start without users. Bands missing from
/// `fresh` have no liquidity left and are dropped, their shares stay recorded
/// in the share maps until withdrawn.
pub fn merge_reserves(
    prior: &BTreeMap<types::BandIndex, Band>,
    fresh: BTreeMap<types::BandIndex, Band>,
) -> BTreeMap<types::BandIndex, Band> {
    fresh
        .into_iter()
        .map(|(index, band)| match prior.get(&index) {
            Some(known) => (index, band.with_users(known.users().clone())),
            None => (index, band),
        })
        .collect()
}

/// Produces the snapshot of `market` at `block_number` from the prior snapshot,
/// band reserves read at the block and the market's events of the block.
///
/// Pure and deterministic: the same inputs always produce equal snapshots.
pub fn apply_block(
    market: Address,
    prior: Option<&AmmSnapshot>,
    block_number: u64,
    fresh: BTreeMap<types::BandIndex, Band>,
    events: &[LedgerEvent],
) -> Result<AmmSnapshot, IndexerError> {
    if let Some(prior) = prior
        && (prior.market() != market || prior.block_number() >= block_number)
    {
        return Err(IndexerError::InvalidArgument(format!(
            "snapshot of {} at block {} cannot precede {} at block {}",
            prior.market(),
            prior.block_number(),
            market,
            block_number
        )));
    }
    if let Some(event) = events.iter().find(|e| e.block_number() != block_number) {
        return Err(IndexerError::InvalidArgument(format!(
            "event of block {} replayed at block {}",
            event.block_number(),
            block_number
        )));
    }

    let (prior_bands, mut total_shares, mut user_shares) = match prior {
        Some(prior) => prior.clone().into_parts(),
        None => Default::default(),
    };
    let mut bands = merge_reserves(&prior_bands, fresh);

    let mut ordered: Vec<&LedgerEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.log_index());

    // Everything a user did before their last withdrawal in the block is closed
    // by that withdrawal.
    let last_withdraw: HashMap<Address, usize> = ordered
        .iter()
        .enumerate()
        .filter_map(|(pos, e)| match e.event() {
            LlammaEvents::Withdraw(w) => Some((w.provider, pos)),
            _ => None,
        })
        .collect();

    let mut ledger = Ledger {
        market,
        block_number,
        bands: &mut bands,
        total_shares: &mut total_shares,
        user_shares: &mut user_shares,
        skipped: HashSet::new(),
    };
    for (pos, event) in ordered.into_iter().enumerate() {
        match event.event() {
            LlammaEvents::Deposit(deposit) => {
                if last_withdraw.get(&deposit.provider).is_some_and(|&w| w > pos) {
                    ledger.skipped.insert(deposit.provider);
                    continue;
                }
                ledger.deposit(deposit)?;
            },
            LlammaEvents::Withdraw(withdraw) => {
                if last_withdraw.get(&withdraw.provider).is_some_and(|&w| w > pos) {
                    continue;
                }
                ledger.withdraw(withdraw.provider);
            },
            LlammaEvents::TokenExchange(exchange) => {
                debug!(
                    market = %market,
                    block = block_number,
                    log_index = event.log_index(),
                    buyer = %exchange.buyer,
                    sold_id = %exchange.sold_id,
                    bought_id = %exchange.bought_id,
                    "token exchange"
                );
            },
        }
    }

    bands.retain(|_, band| !band.is_vacant());

    Ok(AmmSnapshot::new(market, block_number, bands, total_shares, user_shares))
}

/// Reads band reserves at `block_number` and applies the block's events on top
/// of `prior`, see [`apply_block`].
pub async fn advance<R: ChainReader>(
    reader: &R,
    market: Address,
    prior: Option<&AmmSnapshot>,
    block_number: u64,
    events: &[LedgerEvent],
) -> Result<AmmSnapshot, IndexerError> {
    let fresh = bands::fetch_bands(reader, market, block_number).await?;
    apply_block(market, prior, block_number, fresh, events)
}

struct Ledger<'a> {
    market: Address,
    block_number: u64,
    bands: &'a mut BTreeMap<types::BandIndex, Band>,
    total_shares: &'a mut BTreeMap<types::BandIndex, U256>,
    user_shares: &'a mut BTreeMap<Address, Position>,
    /// Users with deposits closed by a later withdrawal in the same block.
    skipped: HashSet<Address>,
}

impl Ledger<'_> {
    fn deposit(&mut self, deposit: &Llamma::Deposit) -> Result<(), IndexerError> {
        let n1 = num::band_index(deposit.n1)?;
        let n2 = num::band_index(deposit.n2)?;
        let count = num::band_span(n1, n2)?;
        let per_band = deposit.amount / U256::from(count);

        let position = self.user_shares.entry(deposit.provider).or_default();
        for index in n1..=n2 {
            self.bands.entry(index).or_insert_with(|| Band::vacant(index)).insert_user(deposit.provider);
            *self.total_shares.entry(index).or_default() += per_band;
            *position.entry(index).or_default() += per_band;
        }
        Ok(())
    }

    fn withdraw(&mut self, user: Address) {
        let Some(position) = self.user_shares.remove(&user) else {
            if self.skipped.contains(&user) {
                return;
            }
            warn!(
                market = %self.market,
                block = self.block_number,
                user = %user,
                "withdrawal without recorded shares, ledger is missing earlier deposits"
            );
            return;
        };

        for (index, shares) in position {
            if let Some(band) = self.bands.get_mut(&index) {
                band.remove_user(&user);
            }
            match self.total_shares.get(&index).map(|total| total.checked_sub(shares)) {
                Some(Some(rest)) if !rest.is_zero() => {
                    self.total_shares.insert(index, rest);
                },
                Some(Some(_)) => {
                    self.total_shares.remove(&index);
                },
                Some(None) | None => {
                    warn!(
                        market = %self.market,
                        block = self.block_number,
                        user = %user,
                        band = index,
                        "user shares exceed band total shares"
                    );
                    self.total_shares.remove(&index);
                },
            }
        }
    }
}
