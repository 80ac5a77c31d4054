use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{Account, Block, Transaction};

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable message
    pub error: String,

    /// Time left before the operation may be retried, if it is time-bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<i64>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
            remaining_ms: None,
        }
    }
}

/// Response for the validate endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ValidateResponse {
    pub valid: bool,
    pub height: usize,
}

/// Request for the create account endpoint
///
/// Without an address a fresh one is generated.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct CreateAccountRequest {
    pub alias: Option<String>,
    pub address: Option<String>,
}

/// An account with its derived balance
#[derive(Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub address: String,
    pub alias: Option<String>,
    pub balance: f64,
    pub created_at: i64,
}

impl AccountResponse {
    pub fn new(account: Account, balance: f64) -> Self {
        AccountResponse {
            address: account.address.0,
            alias: account.alias,
            balance,
            created_at: account.created_at,
        }
    }
}

/// Response for the balance endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    /// The alias or address that was asked for
    pub query: String,
    /// The resolved address
    pub address: String,
    pub balance: f64,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// Sender alias or address
    pub from: String,

    /// Recipient alias or address
    pub to: String,

    /// The amount to transfer
    pub amount: f64,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub message: String,
    pub transaction: Transaction,
}

/// Request for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineRequest {
    /// Miner alias or address
    pub miner: String,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    pub message: String,
    pub height: usize,
    pub block: Block,
}

/// Request for the faucet claim endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct FaucetClaimRequest {
    /// Claimant alias or address
    pub address: String,
}

/// Request for the register miner endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterMinerRequest {
    /// Miner alias or address
    pub address: String,

    /// Relative weight, clamped to 1..=100
    #[serde(default = "default_hash_power")]
    pub hash_power: f64,
}

fn default_hash_power() -> f64 {
    1.0
}
