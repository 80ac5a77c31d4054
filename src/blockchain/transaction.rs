use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use std::fmt;

use super::crypto::{self, Address, CryptoError};

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Transaction is not signed")]
    MissingSignature,

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

/// What a transaction represents on the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Transfer,
    Faucet,
    Genesis,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::Faucet => "faucet",
            TransactionKind::Genesis => "genesis",
        };
        write!(f, "{}", label)
    }
}

/// Represents a token transfer on the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Unique identifier for the transaction
    pub id: String,

    /// Sender's address, `None` for system-issued transactions
    pub from: Option<Address>,

    /// Recipient's address
    pub to: Address,

    /// Amount being transferred
    pub amount: f64,

    /// Kind of transfer
    pub kind: TransactionKind,

    /// Creation time in milliseconds since the Unix epoch
    pub created_at: i64,

    /// Keyed MAC over the fingerprint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Transaction {
    /// Creates a new unsigned transaction
    ///
    /// # Arguments
    ///
    /// * `from` - The sender, `None` for a system transaction
    /// * `to` - The recipient
    /// * `amount` - The amount to transfer
    /// * `kind` - The kind of transfer
    /// * `created_at` - Creation time in milliseconds
    pub fn new(
        from: Option<Address>,
        to: Address,
        amount: f64,
        kind: TransactionKind,
        created_at: i64,
    ) -> Self {
        Transaction {
            id: Uuid::new_v4().to_string(),
            from,
            to,
            amount,
            kind,
            created_at,
            signature: None,
        }
    }

    /// Creates an unsigned transfer between two accounts
    pub fn transfer(from: Address, to: Address, amount: f64, created_at: i64) -> Self {
        Transaction::new(Some(from), to, amount, TransactionKind::Transfer, created_at)
    }

    /// Whether this transaction was issued by the system and carries no sender
    pub fn is_system(&self) -> bool {
        self.from.is_none()
    }

    /// Deterministic digest over (from, to, amount, created_at, kind)
    ///
    /// The id and signature are not part of the fingerprint.
    pub fn compute_fingerprint(&self) -> String {
        let from = self.from.as_ref().map(Address::as_str).unwrap_or("");
        let preimage = format!(
            "{}:{}:{}:{}:{}",
            from, self.to, self.amount, self.created_at, self.kind
        );
        crypto::digest(preimage.as_bytes())
    }

    /// Signs the fingerprint with `signing_secret` and stores the tag,
    /// replacing any previous signature.
    pub fn sign(&mut self, signing_secret: &str) -> Result<(), TransactionError> {
        let fingerprint = self.compute_fingerprint();
        let signature = crypto::keyed_digest(signing_secret.as_bytes(), fingerprint.as_bytes())?;
        self.signature = Some(signature);
        Ok(())
    }

    /// Verifies the transaction's signature
    ///
    /// System transactions are always valid. Otherwise the tag is recomputed
    /// with the sender's address as key. Since addresses are public, anyone
    /// can produce a tag that passes this check: it detects tampering with a
    /// signed transaction, it does not authenticate the sender.
    pub fn verify(&self) -> Result<bool, TransactionError> {
        let from = match &self.from {
            Some(from) => from,
            None => return Ok(true),
        };

        let signature = match &self.signature {
            Some(sig) => sig,
            None => return Err(TransactionError::MissingSignature),
        };

        let fingerprint = self.compute_fingerprint();
        crypto::verify_keyed_digest(from.as_str().as_bytes(), fingerprint.as_bytes(), signature)
            .map_err(TransactionError::from)
    }
}
