use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::crypto::{self, Address};
use super::transaction::{Transaction, TransactionError, TransactionKind};
use super::{FAUCET_ADDRESS, GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP, MINING_REWARD};

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Creation time in milliseconds since the Unix epoch
    pub created_at: i64,

    /// List of transactions included in this block
    pub transactions: Vec<Transaction>,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Hash of the current block
    pub hash: String,

    /// Proof of work
    pub nonce: u64,

    /// Address credited with the block reward
    pub miner: Option<Address>,

    /// Reward paid to the miner
    pub reward: f64,

    /// Wall time spent searching for the nonce
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mining_duration_ms: Option<u64>,

    /// Nonces tried per second during the search
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_rate: Option<f64>,
}

impl Block {
    /// Creates a new, unmined block
    ///
    /// # Arguments
    ///
    /// * `created_at` - Creation time in milliseconds
    /// * `transactions` - The transactions to include
    /// * `previous_hash` - The hash of the previous block
    pub fn new(created_at: i64, transactions: Vec<Transaction>, previous_hash: String) -> Self {
        let mut block = Block {
            created_at,
            transactions,
            previous_hash,
            hash: String::new(),
            nonce: 0,
            miner: None,
            reward: 0.0,
            mining_duration_ms: None,
            hash_rate: None,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Builds the genesis block
    ///
    /// Every field is fixed, so two calls with the same reserve produce
    /// identical blocks. The only transaction mints `faucet_reserve` to the
    /// faucet account.
    pub fn genesis(faucet_reserve: f64) -> Self {
        let mint = Transaction {
            id: "genesis".to_string(),
            from: None,
            to: Address::from(FAUCET_ADDRESS),
            amount: faucet_reserve,
            kind: TransactionKind::Genesis,
            created_at: GENESIS_TIMESTAMP,
            signature: None,
        };

        Block::new(GENESIS_TIMESTAMP, vec![mint], GENESIS_PREVIOUS_HASH.to_string())
    }

    /// SHA-256 over previous hash, timestamp, transactions, nonce and miner
    ///
    /// The reward and the mining statistics are not covered.
    pub fn compute_hash(&self) -> String {
        let txs_json = serde_json::to_string(&self.transactions).unwrap_or_default();
        let miner = self.miner.as_ref().map(Address::as_str).unwrap_or("");
        let preimage = format!(
            "{}:{}:{}:{}:{}",
            self.previous_hash, self.created_at, txs_json, self.nonce, miner
        );
        crypto::digest(preimage.as_bytes())
    }

    /// Performs proof of work for `miner`
    ///
    /// The miner is part of the hash preimage, so it is recorded before the
    /// search starts. The search has no upper bound: it returns only once the
    /// hash starts with `difficulty` zero hex characters.
    pub fn mine(&mut self, difficulty: u32, miner: &Address) {
        self.miner = Some(miner.clone());
        self.nonce = 0;
        self.hash = self.compute_hash();

        while !meets_difficulty(&self.hash, difficulty) {
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.compute_hash();
        }

        self.reward = MINING_REWARD;
    }

    /// Whether every transaction in the block verifies
    pub fn transactions_valid(&self) -> Result<bool, TransactionError> {
        for tx in &self.transactions {
            if !tx.verify()? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Whether `hash` starts with `difficulty` zero hex characters
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    hash.len() >= difficulty as usize && hash.chars().take(difficulty as usize).all(|c| c == '0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_transfer(amount: f64) -> Transaction {
        let mut tx = Transaction::transfer(Address::from("0xaaa"), Address::from("0xbbb"), amount, 10);
        tx.sign("0xaaa").unwrap();
        tx
    }

    #[test]
    fn test_new_block() {
        let block = Block::new(42, vec![signed_transfer(1.0)], "previous_hash".to_string());

        assert_eq!(block.created_at, 42);
        assert_eq!(block.nonce, 0);
        assert_eq!(block.previous_hash, "previous_hash");
        assert!(block.miner.is_none());
        assert_eq!(block.hash, block.compute_hash());
        assert_eq!(block.hash.len(), 64);
    }

    #[test]
    fn test_genesis_is_reproducible() {
        assert_eq!(Block::genesis(1_000.0), Block::genesis(1_000.0));
        assert_ne!(Block::genesis(1_000.0).hash, Block::genesis(2_000.0).hash);

        let genesis = Block::genesis(1_000.0);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(genesis.transactions[0].is_system());
        assert!(genesis.transactions_valid().unwrap());
    }

    #[test]
    fn test_mining_produces_leading_zeros() {
        let miner = Address::from("0xminer");
        let mut block = Block::new(1, vec![signed_transfer(1.0)], "prev".to_string());
        block.mine(2, &miner);

        assert!(block.hash.starts_with("00"));
        assert_eq!(block.hash, block.compute_hash());
        assert_eq!(block.miner, Some(miner));
        assert_eq!(block.reward, MINING_REWARD);
    }

    #[test]
    fn test_hash_changes_when_mutated() {
        let mut block = Block::new(1, vec![signed_transfer(1.0)], "prev".to_string());
        block.mine(1, &Address::from("0xminer"));
        let old_hash = block.hash.clone();

        block.transactions[0].amount = 99.0;
        assert_ne!(old_hash, block.compute_hash());
        assert!(!block.transactions_valid().unwrap());
    }

    #[test]
    fn test_unsigned_transaction_propagates() {
        let tx = Transaction::transfer(Address::from("0xaaa"), Address::from("0xbbb"), 1.0, 10);
        let block = Block::new(1, vec![tx], "prev".to_string());
        assert!(matches!(
            block.transactions_valid(),
            Err(TransactionError::MissingSignature)
        ));
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(meets_difficulty("00ab", 2));
        assert!(!meets_difficulty("0ab0", 2));
        assert!(meets_difficulty("abc", 0));
        assert!(!meets_difficulty("0", 2));
    }
}
