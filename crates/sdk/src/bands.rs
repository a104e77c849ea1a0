//! Band reserves of a LLAMMA market at a historical block.

use std::collections::BTreeMap;

use alloy::{
    primitives::{Address, Bytes, I256},
    sol_types::SolCall,
};
use tracing::debug;

use crate::{
    abi::llamma::Llamma,
    error::IndexerError,
    num,
    reader::ChainReader,
    state::Band,
    types::BandIndex,
};

/// Reads reserves of every band with liquidity at the given block.
///
/// Takes two round trips: `min_band()`/`max_band()` first, then
/// `bands_x(i)`/`bands_y(i)` for the whole range in one batch. Bands with both
/// reserves zero are omitted, absence means zero. Returned bands carry no
/// users, see [`crate::state::ledger::merge_reserves`].
pub async fn fetch_bands<R: ChainReader>(
    reader: &R,
    amm: Address,
    block_number: u64,
) -> Result<BTreeMap<BandIndex, Band>, IndexerError> {
    let range = reader
        .batch_call(
            vec![amm, amm],
            vec![
                Llamma::min_bandCall {}.abi_encode().into(),
                Llamma::max_bandCall {}.abi_encode().into(),
            ],
            block_number,
        )
        .await?;
    let [min_band, max_band] = range.as_slice() else {
        return Err(IndexerError::Decode(format!(
            "expected 2 results for band range, got {}",
            range.len()
        )));
    };
    let min_band = num::band_index(num::decode_int256(min_band)?)?;
    let max_band = num::band_index(num::decode_int256(max_band)?)?;

    let mut bands = BTreeMap::new();
    if max_band < min_band {
        return Ok(bands);
    }
    let span = num::band_span(min_band, max_band)?;

    let calls = (min_band..=max_band)
        .map(|i| {
            let n = I256::try_from(i)
                .map_err(|_| IndexerError::Decode(format!("band index {i} out of range")))?;
            Ok([
                Bytes::from(Llamma::bands_xCall { n }.abi_encode()),
                Bytes::from(Llamma::bands_yCall { n }.abi_encode()),
            ])
        })
        .collect::<Result<Vec<_>, IndexerError>>()?
        .concat();
    let results = reader.batch_call(vec![amm; calls.len()], calls, block_number).await?;

    let expected = span as usize * 2;
    if results.len() != expected {
        return Err(IndexerError::Decode(format!(
            "expected {expected} band reserve results, got {}",
            results.len()
        )));
    }

    for (index, pair) in (min_band..=max_band).zip(results.chunks_exact(2)) {
        let reserve_x = num::decode_int256(&pair[0])?;
        let reserve_y = num::decode_int256(&pair[1])?;
        if !reserve_x.is_zero() || !reserve_y.is_zero() {
            bands.insert(index, Band::new(index, reserve_x, reserve_y));
        }
    }

    debug!(
        market = %amm,
        block = block_number,
        min_band,
        max_band,
        with_liquidity = bands.len(),
        "fetched band reserves"
    );

    Ok(bands)
}
