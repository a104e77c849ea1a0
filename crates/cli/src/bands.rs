use alloy::primitives::Address;
use colored::Colorize;
use fastnum::D256;
use llamma_sdk::{bands, num, reader::ChainReader, types::StateInstant};
use tabled::{Table, Tabled, settings::Style};

pub(crate) async fn render<R: ChainReader>(
    reader: &R,
    market: Address,
    block: Option<u64>,
) -> anyhow::Result<()> {
    let block_number = match block {
        Some(block_number) => block_number,
        None => reader.head_height().await?,
    };
    let (timestamp, bands) = futures::try_join!(
        reader.block_timestamp(block_number),
        bands::fetch_bands(reader, market, block_number)
    )?;
    let timestamp = timestamp.ok_or_else(|| anyhow::anyhow!("block #{} not found", block_number))?;

    println!(
        "\n{}\n",
        format!("LLAMMA {} bands at {}", market, StateInstant::new(block_number, timestamp))
            .bold()
            .purple()
    );

    if bands.is_empty() {
        println!("{}", "No bands with liquidity".dimmed());
        return Ok(());
    }

    let converter = num::Converter::ether();
    let rows = bands
        .values()
        .map(|band| {
            Ok(BandRow {
                index: band.index(),
                reserve_x: converter.to_decimal(band.reserve_x())?,
                reserve_y: converter.to_decimal(band.reserve_y())?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);

    Ok(())
}

#[derive(Tabled)]
struct BandRow {
    #[tabled(rename = "Band")]
    index: i64,
    #[tabled(rename = "Reserve X")]
    reserve_x: D256,
    #[tabled(rename = "Reserve Y")]
    reserve_y: D256,
}
