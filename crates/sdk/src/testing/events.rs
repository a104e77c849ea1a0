use alloy::primitives::{Address, I256, U256};

use crate::{
    abi::llamma::Llamma::{self, LlammaEvents},
    state::ledger::LedgerEvent,
    types::EventContext,
};

/// `n` ether as a signed fixed-point amount.
pub fn ether(n: u64) -> I256 { I256::from_raw(U256::from(n) * U256::from(10).pow(U256::from(18))) }

pub fn deposit_event(provider: Address, amount: u64, n1: i64, n2: i64) -> Llamma::Deposit {
    Llamma::Deposit {
        provider,
        amount: U256::from(amount),
        n1: I256::try_from(n1).unwrap(),
        n2: I256::try_from(n2).unwrap(),
    }
}

pub fn withdraw_event(provider: Address) -> Llamma::Withdraw {
    Llamma::Withdraw { provider, amount_borrowed: U256::from(1), amount_collateral: U256::from(1) }
}

pub fn exchange_event(buyer: Address) -> Llamma::TokenExchange {
    Llamma::TokenExchange {
        buyer,
        sold_id: U256::ZERO,
        tokens_sold: U256::from(1),
        bought_id: U256::from(1),
        tokens_bought: U256::from(1),
    }
}

pub fn deposit(
    block_number: u64,
    log_index: u64,
    provider: Address,
    amount: u64,
    n1: i64,
    n2: i64,
) -> LedgerEvent {
    context(block_number, log_index, LlammaEvents::Deposit(deposit_event(provider, amount, n1, n2)))
}

pub fn withdraw(block_number: u64, log_index: u64, provider: Address) -> LedgerEvent {
    context(block_number, log_index, LlammaEvents::Withdraw(withdraw_event(provider)))
}

pub fn exchange(block_number: u64, log_index: u64, buyer: Address) -> LedgerEvent {
    context(block_number, log_index, LlammaEvents::TokenExchange(exchange_event(buyer)))
}

fn context(block_number: u64, log_index: u64, event: LlammaEvents) -> LedgerEvent {
    EventContext::new(block_number, log_index, event)
}
