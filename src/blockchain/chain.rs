use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use std::sync::Arc;
use std::time::Instant;

use crate::config::LedgerConfig;

use super::account::{Account, AccountDirectory, AccountError};
use super::block::Block;
use super::clock::{Clock, SystemClock};
use super::crypto::Address;
use super::faucet::FaucetState;
use super::scheduler::MiningScheduler;
use super::transaction::{Transaction, TransactionError};
use super::{CONSENSUS, FAUCET_ADDRESS, FAUCET_ALIAS, MINING_REWARD};

/// Errors that can occur during blockchain operations
///
/// Every operation either completes or leaves the ledger untouched.
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Account error: {0}")]
    AccountError(#[from] AccountError),

    #[error("Both sender and recipient addresses are required")]
    MissingAddress,

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Amount must be positive: {0}")]
    InvalidAmount(f64),

    #[error("Invalid miner address: {0}")]
    InvalidMinerAddress(String),

    #[error("Faucet claim rejected: {reason}")]
    FaucetIneligible {
        reason: String,
        remaining_ms: Option<i64>,
    },

    #[error("Faucet is empty: required {required}, available {available}")]
    FaucetEmpty { required: f64, available: f64 },

    #[error("No pending transactions to mine")]
    NoPendingTransactions,

    #[error("No miners registered")]
    NoMinersRegistered,

    #[error("Auto-mining is already running")]
    SchedulerAlreadyRunning,
}

/// Snapshot of the chain state
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChainStats {
    pub height: usize,
    pub difficulty: u32,
    pub total_transactions: usize,
    pub total_accounts: usize,
    pub pending_transactions: usize,
    pub target_block_interval_ms: u64,
    pub retarget_window: usize,
    pub mining_reward: f64,
    pub consensus: String,
}

/// The ledger: chain of blocks, pending pool and account registry
///
/// Balances are never stored; every query folds the whole chain. All
/// mutating methods take `&mut self`, so callers sharing a ledger across
/// threads serialize them behind a single lock.
#[derive(Debug)]
pub struct Blockchain {
    /// The chain of blocks, genesis first
    pub(super) chain: Vec<Block>,

    /// Transactions waiting for the next block
    pub(super) pending_transactions: Vec<Transaction>,

    pub(super) accounts: AccountDirectory,

    /// Mining difficulty (number of leading zero hex characters)
    pub(super) difficulty: u32,

    pub(super) config: LedgerConfig,

    pub(super) clock: Arc<dyn Clock>,

    pub(super) faucet: FaucetState,

    pub(super) scheduler: MiningScheduler,
}

impl Blockchain {
    /// Creates a new ledger on the wall clock
    pub fn new(config: LedgerConfig) -> Self {
        Blockchain::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a new ledger with a genesis block and the faucet account
    ///
    /// # Arguments
    ///
    /// * `config` - Ledger parameters
    /// * `clock` - Time source for transactions, blocks and cooldowns
    pub fn with_clock(config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        let accounts = AccountDirectory::new();
        if let Err(err) = accounts.register(Address::from(FAUCET_ADDRESS), Some(FAUCET_ALIAS), 0) {
            warn!("Failed to register faucet account: {}", err);
        }

        let genesis = Block::genesis(config.faucet_reserve);
        info!(
            "Created genesis block {} minting {} to the faucet",
            genesis.hash, config.faucet_reserve
        );

        Blockchain {
            chain: vec![genesis],
            pending_transactions: Vec::new(),
            accounts,
            difficulty: config.initial_difficulty.max(1),
            config,
            clock,
            faucet: FaucetState::default(),
            scheduler: MiningScheduler::default(),
        }
    }

    /// Current time according to the ledger clock
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Creates an account with a generated address
    pub fn create_account(&self, alias: Option<&str>) -> Result<Account, BlockchainError> {
        let account = self.accounts.create(alias, self.now())?;
        info!("Created account {} ({:?})", account.address, account.alias);
        Ok(account)
    }

    /// Registers an existing address
    pub fn import_account(&self, address: &str, alias: Option<&str>) -> Result<Account, BlockchainError> {
        let account = self
            .accounts
            .register(Address::from(address.trim()), alias, self.now())?;
        info!("Imported account {} ({:?})", account.address, account.alias);
        Ok(account)
    }

    /// Every registered account with its derived balance
    pub fn accounts_with_balances(&self) -> Vec<(Account, f64)> {
        self.accounts
            .list()
            .into_iter()
            .map(|account| {
                let balance = self.balance_of(&account.address);
                (account, balance)
            })
            .collect()
    }

    /// Resolves an alias to its address; anything else is taken literally
    pub fn resolve_address(&self, alias_or_address: &str) -> Address {
        self.accounts.resolve(alias_or_address)
    }

    /// Derived balance of a registered account, 0 for unknown ones
    pub fn get_balance(&self, alias_or_address: &str) -> f64 {
        let address = self.resolve_address(alias_or_address);
        if !self.accounts.contains(&address) {
            return 0.0;
        }
        self.balance_of(&address)
    }

    /// Folds every transaction and block reward in the chain for `address`
    pub(super) fn balance_of(&self, address: &Address) -> f64 {
        let mut balance = 0.0;

        for block in &self.chain {
            for tx in &block.transactions {
                if tx.from.as_ref() == Some(address) {
                    balance -= tx.amount;
                }
                if &tx.to == address {
                    balance += tx.amount;
                }
            }

            if block.miner.as_ref() == Some(address) {
                balance += block.reward;
            }
        }

        balance
    }

    /// Validates a transaction and adds it to the pending pool
    ///
    /// On success the endpoints are rewritten to resolved addresses and the
    /// transaction is signed with the sender's address.
    pub fn submit_transaction(&mut self, mut transaction: Transaction) -> Result<Transaction, BlockchainError> {
        let from = match &transaction.from {
            Some(from) if !from.is_empty() => self.resolve_address(from.as_str()),
            _ => return Err(BlockchainError::MissingAddress),
        };
        if transaction.to.is_empty() {
            return Err(BlockchainError::MissingAddress);
        }
        let to = self.resolve_address(transaction.to.as_str());

        if !(transaction.amount > 0.0) {
            return Err(BlockchainError::InvalidAmount(transaction.amount));
        }

        for address in [&from, &to] {
            if !self.accounts.contains(address) {
                return Err(BlockchainError::UnknownAccount(address.0.clone()));
            }
        }

        let available = self.balance_of(&from);
        if available < transaction.amount {
            return Err(BlockchainError::InsufficientBalance {
                required: transaction.amount,
                available,
            });
        }

        transaction.from = Some(from.clone());
        transaction.to = to;
        transaction.sign(from.as_str())?;

        debug!(
            "Queued {} {} -> {} ({}), pending pool now {}",
            transaction.kind,
            from,
            transaction.to,
            transaction.amount,
            self.pending_transactions.len() + 1
        );
        self.pending_transactions.push(transaction.clone());

        Ok(transaction)
    }

    /// Builds a transfer stamped with the ledger clock and submits it
    pub fn create_transfer(&mut self, from: &str, to: &str, amount: f64) -> Result<Transaction, BlockchainError> {
        let transaction = Transaction::transfer(Address::from(from), Address::from(to), amount, self.now());
        self.submit_transaction(transaction)
    }

    /// Retargets difficulty from the mean mining time of the last window
    ///
    /// Blocks without a recorded duration are skipped. A mean below half the
    /// target raises difficulty by one; above twice the target lowers it by
    /// one, never below 1.
    pub fn adjust_difficulty(&mut self) {
        let window = self.config.retarget_window;
        if window == 0 || self.chain.len() < window {
            return;
        }

        let durations: Vec<u64> = self.chain[self.chain.len() - window..]
            .iter()
            .filter_map(|block| block.mining_duration_ms)
            .collect();
        if durations.is_empty() || self.config.target_block_interval_ms == 0 {
            return;
        }

        let mean = durations.iter().sum::<u64>() as f64 / durations.len() as f64;
        let ratio = mean / self.config.target_block_interval_ms as f64;
        let previous = self.difficulty;

        if ratio < 0.5 {
            self.difficulty += 1;
        } else if ratio > 2.0 {
            self.difficulty = self.difficulty.saturating_sub(1).max(1);
        }

        if self.difficulty != previous {
            info!(
                "Difficulty {} -> {} (mean block time {:.0}ms, target {}ms)",
                previous, self.difficulty, mean, self.config.target_block_interval_ms
            );
        } else {
            debug!("Difficulty stays at {} (ratio {:.2})", self.difficulty, ratio);
        }
    }

    /// Mines every pending transaction into a new block
    ///
    /// The reward is carried by the block's `miner`/`reward` fields, not by a
    /// separate transaction. The proof-of-work search is unbounded.
    pub fn mine_pending_transactions(&mut self, miner: &str) -> Result<Block, BlockchainError> {
        let miner = self.resolve_address(miner);
        if !self.accounts.contains(&miner) {
            return Err(BlockchainError::UnknownAccount(miner.0));
        }

        self.adjust_difficulty();

        let transactions = std::mem::take(&mut self.pending_transactions);
        let mut block = Block::new(self.now(), transactions, self.last_block().hash.clone());

        let started = Instant::now();
        block.mine(self.difficulty, &miner);
        let duration_ms = started.elapsed().as_millis() as u64;

        block.mining_duration_ms = Some(duration_ms);
        block.hash_rate = Some(block.nonce as f64 / (duration_ms.max(1) as f64 / 1000.0));

        info!(
            "Mined block #{} {} with {} transactions for {} (nonce {}, {}ms, difficulty {})",
            self.chain.len(),
            block.hash,
            block.transactions.len(),
            miner,
            block.nonce,
            duration_ms,
            self.difficulty
        );

        self.chain.push(block.clone());
        Ok(block)
    }

    /// Validates the whole chain: genesis, linkage, signatures and hashes
    pub fn is_chain_valid(&self) -> bool {
        let genesis = Block::genesis(self.config.faucet_reserve);
        match self.chain.first() {
            Some(first) if *first == genesis => {}
            _ => {
                warn!("Chain validation failed: genesis block mismatch");
                return false;
            }
        }

        for i in 1..self.chain.len() {
            let current = &self.chain[i];
            let previous = &self.chain[i - 1];

            if current.previous_hash != previous.hash {
                warn!("Chain validation failed: block {} is not linked to its parent", i);
                return false;
            }

            match current.transactions_valid() {
                Ok(true) => {}
                Ok(false) => {
                    warn!("Chain validation failed: block {} holds an invalid signature", i);
                    return false;
                }
                Err(err) => {
                    warn!("Chain validation failed: block {}: {}", i, err);
                    return false;
                }
            }

            if current.hash != current.compute_hash() {
                warn!("Chain validation failed: block {} hash does not match its contents", i);
                return false;
            }
        }

        true
    }

    /// The tip of the chain; the chain always holds at least the genesis block
    pub fn last_block(&self) -> &Block {
        &self.chain[self.chain.len() - 1]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    /// Block at a zero-based height
    pub fn block(&self, index: usize) -> Option<&Block> {
        self.chain.get(index)
    }

    pub fn height(&self) -> usize {
        self.chain.len()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn pending_count(&self) -> usize {
        self.pending_transactions.len()
    }

    pub fn total_transactions(&self) -> usize {
        self.chain.iter().map(|block| block.transactions.len()).sum()
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            height: self.height(),
            difficulty: self.difficulty,
            total_transactions: self.total_transactions(),
            total_accounts: self.accounts.len(),
            pending_transactions: self.pending_count(),
            target_block_interval_ms: self.config.target_block_interval_ms,
            retarget_window: self.config.retarget_window,
            mining_reward: MINING_REWARD,
            consensus: CONSENSUS.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::testing::{funded_ledger, test_ledger};
    use crate::blockchain::TransactionKind;

    fn block_with_duration(ledger: &Blockchain, duration_ms: u64) -> Block {
        let mut block = Block::new(ledger.now(), Vec::new(), ledger.last_block().hash.clone());
        block.mining_duration_ms = Some(duration_ms);
        block
    }

    #[test]
    fn test_new_blockchain() {
        let (ledger, _) = test_ledger();

        assert_eq!(ledger.height(), 1);
        assert!(ledger.is_chain_valid());
        assert_eq!(ledger.get_balance(FAUCET_ALIAS), ledger.config().faucet_reserve);
        assert_eq!(ledger.get_balance(FAUCET_ADDRESS), ledger.config().faucet_reserve);
        assert_eq!(ledger.stats().consensus, CONSENSUS);
    }

    #[test]
    fn test_unknown_account_has_zero_balance() {
        let (ledger, _) = test_ledger();
        assert_eq!(ledger.get_balance("nobody"), 0.0);
    }

    #[test]
    fn test_submit_requires_addresses() {
        let (mut ledger, _) = test_ledger();
        ledger.create_account(Some("alice")).unwrap();

        let tx = Transaction::new(None, Address::from("alice"), 1.0, TransactionKind::Transfer, 0);
        assert!(matches!(ledger.submit_transaction(tx), Err(BlockchainError::MissingAddress)));

        let result = ledger.create_transfer("alice", "", 1.0);
        assert!(matches!(result, Err(BlockchainError::MissingAddress)));
        assert_eq!(ledger.pending_count(), 0);
    }

    #[test]
    fn test_submit_rejects_unknown_accounts() {
        let (mut ledger, _) = test_ledger();
        ledger.create_account(Some("alice")).unwrap();

        let result = ledger.create_transfer("alice", "ghost", 1.0);
        assert!(matches!(result, Err(BlockchainError::UnknownAccount(a)) if a == "ghost"));
    }

    #[test]
    fn test_submit_rejects_non_positive_amount() {
        let (mut ledger, _) = funded_ledger(&["alice", "bob"]);

        assert!(matches!(
            ledger.create_transfer("alice", "bob", 0.0),
            Err(BlockchainError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.create_transfer("alice", "bob", -5.0),
            Err(BlockchainError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_submit_resolves_and_signs() {
        let (mut ledger, _) = funded_ledger(&["alice", "bob"]);
        let alice = ledger.resolve_address("alice");
        let bob = ledger.resolve_address("bob");

        let tx = ledger.create_transfer("alice", "bob", 10.0).unwrap();

        assert_eq!(tx.from, Some(alice));
        assert_eq!(tx.to, bob);
        assert!(tx.verify().unwrap());
        assert_eq!(ledger.pending_count(), 1);
    }

    #[test]
    fn test_insufficient_balance_leaves_pool_unchanged() {
        let (mut ledger, _) = funded_ledger(&["alice", "bob"]);
        let before = ledger.pending_count();

        let result = ledger.create_transfer("alice", "bob", 1_000.0);
        assert!(matches!(
            result,
            Err(BlockchainError::InsufficientBalance { required, available })
                if required == 1_000.0 && available == 100.0
        ));
        assert_eq!(ledger.pending_count(), before);
    }

    #[test]
    fn test_mine_block() {
        let (mut ledger, _) = funded_ledger(&["alice", "bob", "miner"]);
        let height = ledger.height();
        ledger.create_transfer("alice", "bob", 30.0).unwrap();

        let block = ledger.mine_pending_transactions("miner").unwrap();

        assert_eq!(ledger.height(), height + 1);
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.previous_hash, ledger.blocks()[height - 1].hash);
        assert_eq!(block.miner, Some(ledger.resolve_address("miner")));
        assert!(block.mining_duration_ms.is_some());
        assert!(block.hash_rate.is_some());
        assert_eq!(ledger.pending_count(), 0);

        assert_eq!(ledger.get_balance("alice"), 70.0);
        assert_eq!(ledger.get_balance("bob"), 130.0);
        assert_eq!(ledger.get_balance("miner"), 100.0 + MINING_REWARD);
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn test_mine_requires_registered_miner() {
        let (mut ledger, _) = funded_ledger(&["alice", "bob"]);
        ledger.create_transfer("alice", "bob", 1.0).unwrap();

        let result = ledger.mine_pending_transactions("stranger");
        assert!(matches!(result, Err(BlockchainError::UnknownAccount(_))));
        assert_eq!(ledger.pending_count(), 1);
    }

    #[test]
    fn test_balance_conservation() {
        let (mut ledger, _) = funded_ledger(&["alice", "bob", "carol", "miner"]);
        let total = |l: &Blockchain| ["alice", "bob", "carol"].iter().map(|a| l.get_balance(a)).sum::<f64>();
        let before = total(&ledger);
        let miner_before = ledger.get_balance("miner");

        ledger.create_transfer("alice", "bob", 25.0).unwrap();
        ledger.create_transfer("bob", "carol", 40.0).unwrap();
        ledger.mine_pending_transactions("miner").unwrap();
        ledger.create_transfer("carol", "alice", 12.5).unwrap();
        ledger.mine_pending_transactions("miner").unwrap();

        assert_eq!(total(&ledger), before);
        assert_eq!(ledger.get_balance("miner"), miner_before + 2.0 * MINING_REWARD);
    }

    #[test]
    fn test_linkage_of_valid_chain() {
        let (mut ledger, _) = funded_ledger(&["alice", "bob"]);
        ledger.create_transfer("alice", "bob", 5.0).unwrap();
        ledger.mine_pending_transactions("alice").unwrap();

        let chain = ledger.blocks();
        for i in 1..chain.len() {
            assert_eq!(chain[i].previous_hash, chain[i - 1].hash);
        }
    }

    #[test]
    fn test_tamper_detection() {
        let (mut ledger, _) = funded_ledger(&["alice", "bob"]);
        ledger.create_transfer("alice", "bob", 5.0).unwrap();
        ledger.mine_pending_transactions("alice").unwrap();
        assert!(ledger.is_chain_valid());

        let last = ledger.chain.len() - 1;
        ledger.chain[last].transactions[0].amount = 500.0;
        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn test_unsigned_transfer_in_block_detected() {
        let (mut ledger, _) = funded_ledger(&["alice", "bob"]);
        let unsigned = Transaction::transfer(
            ledger.resolve_address("alice"),
            ledger.resolve_address("bob"),
            1.0,
            ledger.now(),
        );

        let last = ledger.chain.len() - 1;
        ledger.chain[last].transactions.push(unsigned);
        ledger.chain[last].hash = ledger.chain[last].compute_hash();
        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn test_tampered_genesis_detected() {
        let (mut ledger, _) = test_ledger();
        ledger.chain[0].transactions[0].amount += 1.0;
        ledger.chain[0].hash = ledger.chain[0].compute_hash();
        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn test_broken_link_detected() {
        let (mut ledger, _) = funded_ledger(&["alice"]);
        ledger.chain[1].previous_hash = "deadbeef".to_string();
        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn test_retarget_increases_when_fast() {
        let (mut ledger, _) = test_ledger();
        ledger.config.retarget_window = 5;
        ledger.difficulty = 2;
        let fast = ledger.config.target_block_interval_ms / 10;

        for _ in 0..5 {
            let block = block_with_duration(&ledger, fast);
            ledger.chain.push(block);
        }

        ledger.adjust_difficulty();
        assert_eq!(ledger.difficulty(), 3);
    }

    #[test]
    fn test_retarget_decreases_when_slow() {
        let (mut ledger, _) = test_ledger();
        ledger.config.retarget_window = 5;
        ledger.difficulty = 3;
        let slow = ledger.config.target_block_interval_ms * 3;

        for _ in 0..5 {
            let block = block_with_duration(&ledger, slow);
            ledger.chain.push(block);
        }

        ledger.adjust_difficulty();
        assert_eq!(ledger.difficulty(), 2);

        ledger.difficulty = 1;
        ledger.adjust_difficulty();
        assert_eq!(ledger.difficulty(), 1);
    }

    #[test]
    fn test_retarget_needs_full_window_and_durations() {
        let (mut ledger, _) = test_ledger();
        ledger.config.retarget_window = 5;
        ledger.difficulty = 2;

        for _ in 0..3 {
            let block = block_with_duration(&ledger, 0);
            ledger.chain.push(block);
        }
        ledger.adjust_difficulty();
        assert_eq!(ledger.difficulty(), 2);

        for _ in 0..5 {
            let block = Block::new(ledger.now(), Vec::new(), ledger.last_block().hash.clone());
            ledger.chain.push(block);
        }
        ledger.adjust_difficulty();
        assert_eq!(ledger.difficulty(), 2);
    }

    #[test]
    fn test_retarget_keeps_difficulty_near_target() {
        let (mut ledger, _) = test_ledger();
        ledger.config.retarget_window = 5;
        ledger.difficulty = 2;
        let on_target = ledger.config.target_block_interval_ms;

        for _ in 0..5 {
            let block = block_with_duration(&ledger, on_target);
            ledger.chain.push(block);
        }
        ledger.adjust_difficulty();
        assert_eq!(ledger.difficulty(), 2);
    }

    #[test]
    fn test_stats() {
        let (mut ledger, _) = funded_ledger(&["alice", "bob"]);
        ledger.create_transfer("alice", "bob", 1.0).unwrap();

        let stats = ledger.stats();
        assert_eq!(stats.height, ledger.height());
        assert_eq!(stats.total_accounts, 3);
        assert_eq!(stats.pending_transactions, 1);
        assert_eq!(stats.total_transactions, ledger.total_transactions());
        assert_eq!(stats.mining_reward, MINING_REWARD);
    }
}
