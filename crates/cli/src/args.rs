use std::path::PathBuf;

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use llamma_sdk::types;

pub(crate) const DEFAULT_RPC_PROVIDER: &str = "https://ethereum-rpc.publicnode.com";
pub(crate) const DEFAULT_RPC_THROTTLING: u32 = 15;

#[derive(Parser, Debug)]
#[command(name = "llamma-cli", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// RPC endpoint to connect to
    #[arg(long, global = true, env = "RPC_URL", default_value_t = DEFAULT_RPC_PROVIDER.to_string())]
    pub rpc: String,

    /// RPC throttling (req/sec) [default: 15 for default RPC provider and
    /// none for custom]
    #[arg(long, global = true, env = "RPC_THROTTLE")]
    pub rpc_throttle: Option<u32>,

    /// Controller factory address [default: mainnet crvUSD factory]
    #[arg(long, global = true, env = "FACTORY_ADDRESS")]
    pub factory: Option<Address>,

    /// Block to start market discovery from [default: mainnet factory
    /// deployment block]
    #[arg(long, global = true, env = "FACTORY_BLOCK")]
    pub factory_block: Option<u64>,

    /// Multicall aggregator address [default: mainnet aggregator]
    #[arg(long, global = true, env = "MULTICALL_ADDRESS")]
    pub multicall: Option<Address>,

    /// Directory snapshots are stored in
    #[arg(long, global = true, env = "STORE_DIR", default_value = "snapshots")]
    pub store: PathBuf,

    /// Number of blocks the head has to be ahead before a window is indexed
    #[arg(long, global = true, env = "CONFIRMATIONS", default_value_t = 300)]
    pub confirmations: u64,

    /// Maximum number of blocks per log query
    #[arg(long, global = true, env = "MAX_CHUNK", default_value_t = 10_000)]
    pub max_chunk: u64,

    /// Seconds to sleep when there is nothing to index
    #[arg(long, global = true, env = "IDLE_SECS", default_value_t = 60)]
    pub idle_secs: u64,

    /// Seconds between market discovery scans
    #[arg(long, global = true, env = "DISCOVERY_SECS", default_value_t = 86_400)]
    pub discovery_secs: u64,

    /// Log in JSON format
    #[arg(long, global = true, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover markets and index them until terminated (Ctrl+C)
    Index,
    /// List markets created by the controller factory
    Markets,
    /// Show live band reserves of a market
    Bands {
        /// AMM address of the market
        #[arg(long)]
        market: Address,

        /// Block number to read reserves at [default: latest block]
        #[arg(long)]
        block: Option<u64>,
    },
    /// Show stored snapshot of a market
    Show {
        /// AMM address of the market
        #[arg(long)]
        market: Address,

        /// Block number to show the most recent snapshot at, or `latest`
        #[arg(long, default_value_t = types::BlockSelector::Latest)]
        block: types::BlockSelector,

        /// Whether to list user positions
        #[arg(long, default_value_t = false)]
        positions: bool,
    },
}
