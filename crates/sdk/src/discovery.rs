//! Discovery of markets created by the controller factory.

use std::collections::BTreeMap;

use alloy::{primitives::U256, sol_types::SolEvent};
use tracing::{debug, info};

use crate::{
    Chain,
    abi::factory::ControllerFactory::AddMarket,
    error::IndexerError,
    reader::{self, ChainReader, LogQuery},
    types::{Market, MarketId},
};

/// Scans `AddMarket` events of the chain's controller factory from
/// `from_block` up to the current head.
///
/// Returns markets created in the range by id, and the last scanned block, the
/// head read before the log query. The next scan should start right after it,
/// so no market created while the query was in flight is missed.
pub async fn discover<R: ChainReader>(
    reader: &R,
    chain: &Chain,
    from_block: u64,
) -> Result<(BTreeMap<MarketId, Market>, u64), IndexerError> {
    let head = reader.head_height().await?;
    let mut markets = BTreeMap::new();
    if head < from_block {
        return Ok((markets, head));
    }

    let query = LogQuery::new(from_block)
        .address(chain.factory())
        .events([AddMarket::SIGNATURE_HASH])
        .to_block(head);
    let mut logs = reader.logs(&query).await?;
    reader::sort_logs(&mut logs);

    for log in &logs {
        let block_number = log
            .block_number
            .ok_or_else(|| IndexerError::Decode("AddMarket log without block number".to_string()))?;
        let event = AddMarket::decode_log(&log.inner)?.data;
        if event.ix > U256::from(u64::MAX) {
            return Err(IndexerError::Decode(format!("market index {} out of range", event.ix)));
        }
        let market = Market::new(
            event.ix.to::<u64>(),
            event.collateral,
            event.controller,
            event.amm,
            event.monetary_policy,
            block_number,
        );
        info!(
            id = market.id(),
            amm = %market.amm(),
            collateral = %market.collateral_token(),
            block = block_number,
            "discovered market"
        );
        markets.insert(market.id(), market);
    }

    debug!(from = from_block, to = head, found = markets.len(), "scanned factory");
    Ok((markets, head))
}
