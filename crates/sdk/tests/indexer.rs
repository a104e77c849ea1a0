use std::{sync::Arc, time::Duration};

use alloy::primitives::{Address, I256, U256, address};
use llamma_sdk::{
    Chain,
    abi::factory::ControllerFactory::AddMarket,
    indexer::Indexer,
    poller::PollConfig,
    store::{self, MemoryStore},
    testing::{MockChain, deposit_event, ether, withdraw_event},
    types::BlockSelector,
};
use tokio_util::sync::CancellationToken;

const FACTORY: Address = address!("0xC9332fdCB1C491Dcc683bAe86Fe3cb70360738BC");
const ALICE: Address = address!("0x00000000000000000000000000000000000a11ce");
const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

fn amm(ix: u8) -> Address { Address::with_last_byte(0xa0 + ix) }

fn add_market(ix: u8) -> AddMarket {
    AddMarket {
        collateral: Address::with_last_byte(ix + 1),
        controller: Address::with_last_byte(0xc0 + ix),
        amm: amm(ix),
        monetary_policy: Address::with_last_byte(0xe0 + ix),
        ix: U256::from(ix),
    }
}

fn config() -> PollConfig {
    PollConfig::default()
        .with_confirmations(5)
        .with_max_chunk(50)
        .with_idle_interval(Duration::from_millis(5))
        .with_discovery_interval(Duration::from_millis(5))
}

async fn wait_for(mut done: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_index_markets_end_to_end() {
    let chain = Arc::new(MockChain::new(400));
    chain.push_event(FACTORY, 100, 0, &add_market(0));
    chain.push_event(FACTORY, 120, 0, &add_market(1));

    chain.set_bands(amm(0), 200, -1, vec![(I256::ZERO, ether(1)); 3]);
    chain.push_event(amm(0), 200, 1, &deposit_event(ALICE, 300, -1, 1));
    chain.set_bands(amm(0), 250, -1, vec![(ether(1), I256::ZERO); 3]);
    chain.push_event(amm(0), 250, 0, &withdraw_event(ALICE));

    chain.set_bands(amm(1), 130, 4, vec![(ether(2), ether(2))]);
    chain.push_event(amm(1), 130, 0, &deposit_event(BOB, 7, 4, 4));

    let store = Arc::new(MemoryStore::new());
    let indexer = Arc::new(Indexer::new(
        chain.clone(),
        store.clone(),
        Chain::custom(1, FACTORY, 90, Address::ZERO),
        config(),
    ));
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let indexer = indexer.clone();
        let cancel = cancel.clone();
        async move { indexer.run(tokio::time::sleep, cancel).await }
    });

    wait_for(|| store.blocks(amm(0)) == vec![200, 250] && store.blocks(amm(1)) == vec![130]).await;

    // Market created later is picked up by the next discovery cycle
    chain.push_event(FACTORY, 401, 0, &add_market(2));
    chain.set_bands(amm(2), 410, 0, vec![(ether(3), I256::ZERO)]);
    chain.push_event(amm(2), 410, 0, &deposit_event(ALICE, 3, 0, 0));
    chain.set_head(500);
    wait_for(|| store.blocks(amm(2)) == vec![410]).await;

    cancel.cancel();
    task.await.unwrap();

    assert_eq!(indexer.markets().iter().map(|m| m.amm()).collect::<Vec<_>>(), vec![amm(0), amm(1), amm(2)]);

    let at_200 = store::lookup(store.as_ref(), amm(0), BlockSelector::AtOrBefore(249)).await.unwrap();
    assert_eq!(at_200.block_number(), 200);
    let position = at_200.position(&ALICE).unwrap();
    assert_eq!(position.values().copied().collect::<Vec<_>>(), vec![U256::from(100); 3]);
    for band in at_200.bands().values() {
        assert!(band.users().contains(&ALICE));
    }

    let latest = store::lookup(store.as_ref(), amm(0), BlockSelector::Latest).await.unwrap();
    assert_eq!(latest.block_number(), 250);
    assert!(latest.total_shares().is_empty());
    assert!(latest.user_shares().is_empty());
    assert_eq!(latest.total_reserves(), (ether(3), I256::ZERO));

    let bob = store::lookup(store.as_ref(), amm(1), BlockSelector::Latest).await.unwrap();
    assert_eq!(bob.total_shares().get(&4), Some(&U256::from(7)));
    assert_eq!(bob.bands()[&4].reserve_x(), ether(2));
}

#[tokio::test]
async fn test_indexer_survives_rpc_failures() {
    let chain = Arc::new(MockChain::new(400));
    chain.push_event(FACTORY, 100, 0, &add_market(0));
    chain.push_event(amm(0), 150, 0, &deposit_event(ALICE, 10, 0, 1));
    chain.fail_next(5);

    let store = Arc::new(MemoryStore::new());
    let indexer = Indexer::new(
        chain.clone(),
        store.clone(),
        Chain::custom(1, FACTORY, 90, Address::ZERO),
        config().with_max_error_backoff(Duration::from_millis(20)),
    );
    let cancel = CancellationToken::new();

    let run = indexer.run(tokio::time::sleep, cancel.clone());
    let check = async {
        wait_for(|| store.blocks(amm(0)) == vec![150]).await;
        cancel.cancel();
    };
    tokio::join!(run, check);

    let snapshot = store::lookup(store.as_ref(), amm(0), BlockSelector::Latest).await.unwrap();
    assert_eq!(snapshot.total_shares().values().copied().collect::<Vec<_>>(), vec![U256::from(5); 2]);
}
