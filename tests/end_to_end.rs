use std::sync::Arc;

use token_ledger::blockchain::{Blockchain, BlockchainError, ManualClock, TransactionKind, FAUCET_ALIAS};
use token_ledger::blockchain::{SchedulerConfig, MINING_REWARD};
use token_ledger::config::LedgerConfig;

fn ledger() -> (Blockchain, Arc<ManualClock>) {
    let config = LedgerConfig {
        initial_difficulty: 1,
        retarget_window: 1_000,
        ..LedgerConfig::default()
    };
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    (Blockchain::with_clock(config, clock.clone()), clock)
}

#[test]
fn fresh_ledger_is_valid() {
    let (ledger, _) = ledger();
    assert!(ledger.is_chain_valid());
    assert_eq!(ledger.height(), 1);
}

#[test]
fn faucet_claim_mine_and_overspend() {
    let (mut ledger, _) = ledger();
    ledger.create_account(Some("alice")).unwrap();
    ledger.create_account(Some("bob")).unwrap();
    ledger.create_account(Some("miner")).unwrap();
    let amount = ledger.config().faucet_amount;

    assert_eq!(ledger.get_balance("alice"), 0.0);

    let claim = ledger.claim("alice").unwrap();
    assert_eq!(claim.kind, TransactionKind::Faucet);
    assert_eq!(claim.amount, amount);
    assert_eq!(ledger.pending_count(), 1);

    let block = ledger.mine_pending_transactions("miner").unwrap();
    assert_eq!(block.transactions.len(), 1);
    assert_eq!(ledger.get_balance("alice"), amount);
    assert_eq!(ledger.get_balance("miner"), MINING_REWARD);

    let result = ledger.create_transfer("alice", "bob", amount + 1.0);
    assert!(matches!(result, Err(BlockchainError::InsufficientBalance { .. })));
    assert_eq!(ledger.pending_count(), 0);

    ledger.create_transfer("alice", "bob", 40.0).unwrap();
    ledger.mine_pending_transactions("miner").unwrap();
    assert_eq!(ledger.get_balance("alice"), amount - 40.0);
    assert_eq!(ledger.get_balance("bob"), 40.0);
    assert!(ledger.is_chain_valid());
}

#[test]
fn total_supply_grows_by_reward_per_block() {
    let (mut ledger, _) = ledger();
    let reserve = ledger.config().faucet_reserve;
    ledger.create_account(Some("alice")).unwrap();
    ledger.claim("alice").unwrap();
    ledger.mine_pending_transactions(FAUCET_ALIAS).unwrap();
    ledger.create_transfer("alice", FAUCET_ALIAS, 10.0).unwrap();
    ledger.mine_pending_transactions("alice").unwrap();

    let supply: f64 = ledger
        .accounts_with_balances()
        .iter()
        .map(|(_, balance)| balance)
        .sum();
    assert_eq!(supply, reserve + 2.0 * MINING_REWARD);
}

#[test]
fn auto_mining_competition() {
    let (mut ledger, clock) = ledger();
    ledger.create_account(Some("alice")).unwrap();
    ledger.create_account(Some("m1")).unwrap();
    ledger.create_account(Some("m2")).unwrap();
    ledger.register_miner("m1", 1.0).unwrap();
    ledger.register_miner("m2", 9.0).unwrap();

    ledger
        .start_scheduler(SchedulerConfig {
            check_interval_ms: 500,
            tx_threshold: 1,
            max_block_interval_ms: 1_000_000,
        })
        .unwrap();

    ledger.claim("alice").unwrap();
    clock.advance(500);
    let outcome = ledger.tick().unwrap();
    assert_eq!(outcome.transactions, 1);
    assert_eq!(ledger.get_balance(outcome.winner.as_str()), MINING_REWARD);

    let report = ledger.stop_scheduler().unwrap();
    assert_eq!(report.total_blocks_mined, 1);
    assert_eq!(report.total_rewards, MINING_REWARD);
    assert!(ledger.stop_scheduler().is_none());
    assert!(ledger.is_chain_valid());
}
