use colored::Colorize;
use llamma_sdk::{Chain, discovery, reader::ChainReader};
use tabled::{Table, Tabled, settings::Style};

pub(crate) async fn render<R: ChainReader>(chain: &Chain, reader: &R) -> anyhow::Result<()> {
    let (markets, scanned_to) =
        discovery::discover(reader, chain, chain.factory_deployed_at_block()).await?;

    println!(
        "\n{}\n",
        format!(
            "{} market(s) of factory {} up to block #{}",
            markets.len(),
            chain.factory(),
            scanned_to
        )
        .bold()
        .purple()
    );

    let mut table = Table::new(markets.values().map(|market| MarketRow {
        id: market.id(),
        amm: market.amm().to_string(),
        controller: market.controller().to_string(),
        collateral: market.collateral_token().to_string(),
        created_at: market.created_at_block(),
    }));
    table.with(Style::sharp());
    println!("{}", table);

    Ok(())
}

#[derive(Tabled)]
struct MarketRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "AMM")]
    amm: String,
    #[tabled(rename = "Controller")]
    controller: String,
    #[tabled(rename = "Collateral")]
    collateral: String,
    #[tabled(rename = "Created At")]
    created_at: u64,
}
