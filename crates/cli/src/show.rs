use alloy::primitives::Address;
use colored::Colorize;
use fastnum::D256;
use llamma_sdk::{
    num,
    store::{self, FileStore},
    types::BlockSelector,
};
use tabled::{Table, Tabled, settings::Style};

pub(crate) async fn render(
    store: &FileStore,
    market: Address,
    block: BlockSelector,
    positions: bool,
) -> anyhow::Result<()> {
    let snapshot = store::lookup(store, market, block).await?;

    println!("\n{}\n", format!("{:#^96}", " LLAMMA Snapshot ").bold().purple());
    println!("{:#}", snapshot);

    if positions && !snapshot.user_shares().is_empty() {
        let converter = num::Converter::ether();
        let rows = snapshot
            .user_shares()
            .iter()
            .flat_map(|(user, position)| {
                position.iter().map(move |(band, shares)| {
                    Ok(PositionRow {
                        user: user.to_string(),
                        band: *band,
                        shares: converter.to_unsigned_decimal(*shares)?,
                    })
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let mut table = Table::new(rows);
        table.with(Style::sharp());
        println!("\n{}", "Positions".bold());
        println!("{}", table);
    }

    Ok(())
}

#[derive(Tabled)]
struct PositionRow {
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Band")]
    band: i64,
    #[tabled(rename = "Shares")]
    shares: D256,
}
