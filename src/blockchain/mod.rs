// Blockchain module
//
// This module contains the ledger engine:
// - Hashing and keyed-MAC primitives
// - Transaction and block structures
// - Account directory
// - The ledger itself (chain, pending pool, balances, difficulty)
// - Token faucet
// - Simulated multi-miner auto-mining

pub mod account;
pub mod block;
pub mod chain;
pub mod clock;
pub mod crypto;
pub mod faucet;
pub mod scheduler;
pub mod transaction;

// Re-export main components for easier access
pub use account::{Account, AccountDirectory};
pub use block::Block;
pub use chain::{Blockchain, BlockchainError, ChainStats};
pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::Address;
pub use faucet::{FaucetEligibility, FaucetInfo};
pub use scheduler::{CompetitionOutcome, Miner, SchedulerConfig, SchedulerReport, SchedulerStatus};
pub use transaction::{Transaction, TransactionKind};

/// Reward credited to the miner of every block
pub const MINING_REWARD: f64 = 50.0;

/// Account holding the faucet reserve
pub const FAUCET_ADDRESS: &str = "0x000000000000000000000000000000000000fa0c";

/// Alias of the faucet account
pub const FAUCET_ALIAS: &str = "faucet";

/// Timestamp of the genesis block and its mint transaction
pub const GENESIS_TIMESTAMP: i64 = 0;

/// Parent hash recorded in the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Consensus label reported in chain stats
pub const CONSENSUS: &str = "Proof of Work";
