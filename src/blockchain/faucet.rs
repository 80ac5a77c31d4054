use log::{info, warn};
use serde::Serialize;
use utoipa::ToSchema;

use std::collections::HashMap;

use super::chain::{Blockchain, BlockchainError};
use super::crypto::Address;
use super::transaction::{Transaction, TransactionKind};
use super::FAUCET_ADDRESS;

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Claim history of the faucet
///
/// Entries are only ever added or refreshed, never removed.
#[derive(Debug, Default, Clone)]
pub struct FaucetState {
    last_claims: HashMap<Address, i64>,
    total_claims: u64,
}

/// Result of an eligibility check
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FaucetEligibility {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<i64>,
}

impl FaucetEligibility {
    fn eligible() -> Self {
        FaucetEligibility {
            eligible: true,
            reason: None,
            remaining_ms: None,
        }
    }

    fn rejected(reason: String, remaining_ms: Option<i64>) -> Self {
        FaucetEligibility {
            eligible: false,
            reason: Some(reason),
            remaining_ms,
        }
    }
}

/// Public facts about the faucet
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FaucetInfo {
    pub amount: f64,
    pub reserve_address: Address,
    pub reserve_balance: f64,
    pub cooldown_hours: f64,
    pub total_claims: u64,
}

impl Blockchain {
    /// Checks whether an account may claim from the faucet now
    pub fn can_claim(&self, alias_or_address: &str) -> FaucetEligibility {
        let address = self.resolve_address(alias_or_address);
        if !self.accounts.contains(&address) {
            return FaucetEligibility::rejected(
                format!("Account {} is not registered", address),
                None,
            );
        }

        if let Some(last_claim) = self.faucet.last_claims.get(&address) {
            let elapsed = self.now() - last_claim;
            let remaining = self.config.faucet_cooldown_ms - elapsed;
            if remaining > 0 {
                let hours = (remaining + MILLIS_PER_HOUR - 1) / MILLIS_PER_HOUR;
                return FaucetEligibility::rejected(
                    format!("Cooldown active, try again in {} hour(s)", hours),
                    Some(remaining),
                );
            }
        }

        FaucetEligibility::eligible()
    }

    /// Queues a faucet payout to the claimant
    ///
    /// The payout is a regular pending transaction from the faucet account,
    /// so it only counts once mined.
    pub fn claim(&mut self, alias_or_address: &str) -> Result<Transaction, BlockchainError> {
        let eligibility = self.can_claim(alias_or_address);
        if !eligibility.eligible {
            let reason = eligibility.reason.unwrap_or_default();
            warn!("Faucet claim by {} rejected: {}", alias_or_address, reason);
            return Err(BlockchainError::FaucetIneligible {
                reason,
                remaining_ms: eligibility.remaining_ms,
            });
        }

        let faucet = Address::from(FAUCET_ADDRESS);
        let amount = self.config.faucet_amount;
        let available = self.balance_of(&faucet);
        if available < amount {
            return Err(BlockchainError::FaucetEmpty {
                required: amount,
                available,
            });
        }

        let claimant = self.resolve_address(alias_or_address);
        let now = self.now();
        let mut transaction = Transaction::new(
            Some(faucet.clone()),
            claimant.clone(),
            amount,
            TransactionKind::Faucet,
            now,
        );
        transaction.sign(faucet.as_str())?;

        self.faucet.last_claims.insert(claimant.clone(), now);
        self.faucet.total_claims += 1;
        self.pending_transactions.push(transaction.clone());

        info!("Faucet queued {} tokens for {}", amount, claimant);
        Ok(transaction)
    }

    pub fn faucet_info(&self) -> FaucetInfo {
        FaucetInfo {
            amount: self.config.faucet_amount,
            reserve_address: Address::from(FAUCET_ADDRESS),
            reserve_balance: self.balance_of(&Address::from(FAUCET_ADDRESS)),
            cooldown_hours: self.config.faucet_cooldown_ms as f64 / MILLIS_PER_HOUR as f64,
            total_claims: self.faucet.total_claims,
        }
    }
}
