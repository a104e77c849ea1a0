//! Contract bindings.
//!
//! Only the subset of each contract's interface the indexer touches.

pub mod llamma {
    alloy::sol! {
        /// crvUSD LLAMMA (Lending-Liquidating AMM Algorithm) market.
        ///
        /// Liquidity is split into price bands indexed by signed integers,
        /// `bands_x` holds the stablecoin side and `bands_y` the collateral side
        /// of each band, both with 18 decimals.
        #[sol(rpc, all_derives)]
        contract Llamma {
            event TokenExchange(
                address indexed buyer,
                uint256 sold_id,
                uint256 tokens_sold,
                uint256 bought_id,
                uint256 tokens_bought
            );
            event Deposit(address indexed provider, uint256 amount, int256 n1, int256 n2);
            event Withdraw(address indexed provider, uint256 amount_borrowed, uint256 amount_collateral);

            function min_band() external view returns (int256);
            function max_band() external view returns (int256);
            function bands_x(int256 n) external view returns (int256);
            function bands_y(int256 n) external view returns (int256);
        }
    }
}

pub mod factory {
    alloy::sol! {
        /// crvUSD controller factory.
        #[sol(rpc, all_derives)]
        contract ControllerFactory {
            event AddMarket(
                address indexed collateral,
                address controller,
                address amm,
                address monetary_policy,
                uint256 ix
            );
        }
    }
}

pub mod multicall {
    alloy::sol! {
        /// Multicall aggregator executing a batch of calls within one `eth_call`.
        #[sol(rpc, all_derives)]
        contract Multicaller {
            function aggregate(
                address[] calldata targets,
                bytes[] calldata data,
                uint256[] calldata values
            ) external payable returns (bytes[] memory);
        }
    }
}
