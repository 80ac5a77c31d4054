use log::{debug, error, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use utoipa::ToSchema;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::chain::{Blockchain, BlockchainError};
use super::crypto::Address;

/// Bounds applied to a miner's hash power weight
pub const MIN_HASH_POWER: f64 = 1.0;
pub const MAX_HASH_POWER: f64 = 100.0;

/// A simulated miner taking part in auto-mining competitions
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Miner {
    pub address: Address,
    /// Relative chance of winning a competition
    pub hash_power: f64,
    pub blocks_mined: u64,
    pub total_rewards: f64,
    pub joined_at: i64,
}

/// Auto-mining parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SchedulerConfig {
    /// Minimum time between two checks
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: i64,

    /// Pending transactions that trigger a competition
    #[serde(default = "default_tx_threshold")]
    pub tx_threshold: usize,

    /// Time since the last block that triggers a competition
    #[serde(default = "default_max_block_interval_ms")]
    pub max_block_interval_ms: i64,
}

fn default_check_interval_ms() -> i64 {
    5_000
}

fn default_tx_threshold() -> usize {
    3
}

fn default_max_block_interval_ms() -> i64 {
    60_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            check_interval_ms: default_check_interval_ms(),
            tx_threshold: default_tx_threshold(),
            max_block_interval_ms: default_max_block_interval_ms(),
        }
    }
}

impl SchedulerConfig {
    fn normalized(self) -> Self {
        SchedulerConfig {
            check_interval_ms: self.check_interval_ms.max(1),
            tx_threshold: self.tx_threshold.max(1),
            max_block_interval_ms: self.max_block_interval_ms.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum SchedulerState {
    #[default]
    Stopped,
    Running {
        config: SchedulerConfig,
        last_check_at: i64,
        /// Start time; the block interval is never measured from before it
        started_at: i64,
    },
}

/// Miner registry and auto-mining state, owned by the ledger
#[derive(Debug, Clone, Default)]
pub struct MiningScheduler {
    state: SchedulerState,
    miners: Vec<Miner>,
    total_blocks_mined: u64,
    total_rewards: f64,
    competitions: u64,
}

impl MiningScheduler {
    /// Draws a miner index with probability proportional to hash power
    pub fn select_miner<R: Rng>(&self, rng: &mut R) -> Option<usize> {
        let total: f64 = self.miners.iter().map(|m| m.hash_power).sum();
        if self.miners.is_empty() || total <= 0.0 {
            return None;
        }

        let mut draw = rng.gen_range(0.0..total);
        for (index, miner) in self.miners.iter().enumerate() {
            if draw < miner.hash_power {
                return Some(index);
            }
            draw -= miner.hash_power;
        }

        // Rounding can leave a sliver past the last bucket
        Some(self.miners.len() - 1)
    }

    pub fn miners(&self) -> &[Miner] {
        &self.miners
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SchedulerState::Running { .. })
    }

    fn config(&self) -> Option<SchedulerConfig> {
        match self.state {
            SchedulerState::Running { config, .. } => Some(config),
            SchedulerState::Stopped => None,
        }
    }

    fn report(&self) -> SchedulerReport {
        SchedulerReport {
            total_blocks_mined: self.total_blocks_mined,
            total_rewards: self.total_rewards,
            competitions: self.competitions,
            miners: self.miners.clone(),
        }
    }
}

/// Result of a mining competition
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompetitionOutcome {
    pub winner: Address,
    pub hash_power: f64,
    pub block_height: usize,
    pub block_hash: String,
    pub reward: f64,
    pub transactions: usize,
}

/// Statistics returned when auto-mining stops
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchedulerReport {
    pub total_blocks_mined: u64,
    pub total_rewards: f64,
    pub competitions: u64,
    pub miners: Vec<Miner>,
}

/// Snapshot of the scheduler
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchedulerStatus {
    pub running: bool,
    pub config: Option<SchedulerConfig>,
    pub miners: Vec<Miner>,
    pub total_blocks_mined: u64,
    pub total_rewards: f64,
    pub competitions: u64,
    pub last_block_at: i64,
    pub pending_transactions: usize,
}

fn clamp_hash_power(hash_power: f64) -> f64 {
    if hash_power.is_finite() {
        hash_power.clamp(MIN_HASH_POWER, MAX_HASH_POWER)
    } else {
        MIN_HASH_POWER
    }
}

impl Blockchain {
    /// Registers a miner, or updates the hash power of a registered one
    ///
    /// Only registered accounts can mine.
    pub fn register_miner(&mut self, alias_or_address: &str, hash_power: f64) -> Result<Miner, BlockchainError> {
        let address = self.resolve_address(alias_or_address);
        if address.is_empty() || !self.accounts.contains(&address) {
            return Err(BlockchainError::InvalidMinerAddress(alias_or_address.to_string()));
        }

        let hash_power = clamp_hash_power(hash_power);

        if let Some(miner) = self.scheduler.miners.iter_mut().find(|m| m.address == address) {
            miner.hash_power = hash_power;
            info!("Miner {} hash power set to {}", address, hash_power);
            return Ok(miner.clone());
        }

        let miner = Miner {
            address: address.clone(),
            hash_power,
            blocks_mined: 0,
            total_rewards: 0.0,
            joined_at: self.now(),
        };
        self.scheduler.miners.push(miner.clone());
        info!(
            "Miner {} joined with hash power {} ({} miners)",
            address,
            hash_power,
            self.scheduler.miners.len()
        );

        Ok(miner)
    }

    /// Removes a miner; removing the last one stops auto-mining
    pub fn deregister_miner(&mut self, alias_or_address: &str) -> Result<Miner, BlockchainError> {
        let address = self.resolve_address(alias_or_address);
        let index = self
            .scheduler
            .miners
            .iter()
            .position(|m| m.address == address)
            .ok_or_else(|| BlockchainError::InvalidMinerAddress(alias_or_address.to_string()))?;

        let miner = self.scheduler.miners.remove(index);
        info!("Miner {} left", miner.address);

        if self.scheduler.miners.is_empty() && self.scheduler.is_running() {
            warn!("Last miner left, stopping auto-mining");
            self.scheduler.state = SchedulerState::Stopped;
        }

        Ok(miner)
    }

    pub fn miners(&self) -> &[Miner] {
        self.scheduler.miners()
    }

    /// Starts auto-mining
    pub fn start_scheduler(&mut self, config: SchedulerConfig) -> Result<(), BlockchainError> {
        if self.scheduler.is_running() {
            return Err(BlockchainError::SchedulerAlreadyRunning);
        }
        if self.scheduler.miners.is_empty() {
            return Err(BlockchainError::NoMinersRegistered);
        }

        let config = config.normalized();
        let now = self.now();
        self.scheduler.state = SchedulerState::Running {
            config,
            last_check_at: now,
            started_at: now,
        };
        info!(
            "Auto-mining started: check every {}ms, threshold {} txs, max block interval {}ms",
            config.check_interval_ms, config.tx_threshold, config.max_block_interval_ms
        );

        Ok(())
    }

    /// Stops auto-mining; `None` if it was not running
    pub fn stop_scheduler(&mut self) -> Option<SchedulerReport> {
        if !self.scheduler.is_running() {
            return None;
        }

        self.scheduler.state = SchedulerState::Stopped;
        let report = self.scheduler.report();
        info!(
            "Auto-mining stopped after {} blocks ({} rewards paid)",
            report.total_blocks_mined, report.total_rewards
        );

        Some(report)
    }

    pub fn is_scheduler_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// One periodic check; call it from a timer
    pub fn tick(&mut self) -> Option<CompetitionOutcome> {
        self.tick_with(&mut rand::thread_rng())
    }

    /// Periodic check with an explicit random source
    ///
    /// Does nothing while stopped or before the check interval has elapsed.
    /// A competition runs when the pending pool reaches the threshold or the
    /// last block is older than the maximum interval, and only if at least
    /// one transaction is pending. Blocks from before `start` count as mined
    /// at start time.
    pub fn tick_with<R: Rng>(&mut self, rng: &mut R) -> Option<CompetitionOutcome> {
        let (config, last_check_at, started_at) = match self.scheduler.state {
            SchedulerState::Running {
                config,
                last_check_at,
                started_at,
            } => (config, last_check_at, started_at),
            SchedulerState::Stopped => return None,
        };

        if self.scheduler.miners.is_empty() {
            warn!("No miners left, stopping auto-mining");
            self.scheduler.state = SchedulerState::Stopped;
            return None;
        }

        let now = self.now();
        if now - last_check_at < config.check_interval_ms {
            return None;
        }
        self.scheduler.state = SchedulerState::Running {
            config,
            last_check_at: now,
            started_at,
        };

        let pending = self.pending_count();
        let since_last_block = now - self.last_block().created_at.max(started_at);
        let triggered = pending >= config.tx_threshold || since_last_block >= config.max_block_interval_ms;

        if !triggered || pending == 0 {
            debug!(
                "Scheduler check: {} pending, {}ms since last block, no competition",
                pending, since_last_block
            );
            return None;
        }

        match self.run_competition_with(rng) {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                warn!("Mining competition failed: {}", err);
                None
            }
        }
    }

    /// Runs a mining competition now
    pub fn run_competition(&mut self) -> Result<CompetitionOutcome, BlockchainError> {
        self.run_competition_with(&mut rand::thread_rng())
    }

    /// Picks a weighted-random winner and mines the pending pool for it
    pub fn run_competition_with<R: Rng>(&mut self, rng: &mut R) -> Result<CompetitionOutcome, BlockchainError> {
        if self.scheduler.miners.is_empty() {
            return Err(BlockchainError::NoMinersRegistered);
        }
        if self.pending_count() == 0 {
            return Err(BlockchainError::NoPendingTransactions);
        }

        let index = self
            .scheduler
            .select_miner(rng)
            .ok_or(BlockchainError::NoMinersRegistered)?;
        let winner = self.scheduler.miners[index].address.clone();
        let hash_power = self.scheduler.miners[index].hash_power;

        let block = self.mine_pending_transactions(winner.as_str())?;

        let miner = &mut self.scheduler.miners[index];
        miner.blocks_mined += 1;
        miner.total_rewards += block.reward;
        self.scheduler.total_blocks_mined += 1;
        self.scheduler.total_rewards += block.reward;
        self.scheduler.competitions += 1;

        info!(
            "Competition #{} won by {} (hash power {}), block {}",
            self.scheduler.competitions, winner, hash_power, block.hash
        );

        Ok(CompetitionOutcome {
            winner,
            hash_power,
            block_height: self.height() - 1,
            block_hash: block.hash,
            reward: block.reward,
            transactions: block.transactions.len(),
        })
    }

    pub fn scheduler_status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.scheduler.is_running(),
            config: self.scheduler.config(),
            miners: self.scheduler.miners.clone(),
            total_blocks_mined: self.scheduler.total_blocks_mined,
            total_rewards: self.scheduler.total_rewards,
            competitions: self.scheduler.competitions,
            last_block_at: self.last_block().created_at,
            pending_transactions: self.pending_count(),
        }
    }
}

/// Calls [`Blockchain::tick`] every `poll` until the ledger lock is poisoned
///
/// Each tick runs on the blocking pool and is awaited before the next one,
/// so ticks never overlap. Mining inside a tick holds the ledger lock.
pub async fn drive(ledger: Arc<Mutex<Blockchain>>, poll: Duration) {
    let mut interval = tokio::time::interval(poll);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let shared = Arc::clone(&ledger);
        let result = tokio::task::spawn_blocking(move || {
            let mut ledger = shared.lock().map_err(|_| ())?;
            Ok::<_, ()>(ledger.tick())
        })
        .await;

        match result {
            Ok(Ok(Some(outcome))) => debug!(
                "Auto-mined block #{} for {}",
                outcome.block_height, outcome.winner
            ),
            Ok(Ok(None)) => {}
            Ok(Err(())) => {
                error!("Ledger lock poisoned, scheduler driver exiting");
                break;
            }
            Err(err) => warn!("Scheduler tick failed: {}", err),
        }
    }
}
