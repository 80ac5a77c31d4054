use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use std::sync::Arc;

use super::crypto::Address;

/// Errors that can occur during account operations
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Duplicate account: alias '{0}' is already taken")]
    DuplicateAlias(String),

    #[error("Duplicate account: address {0} is already registered")]
    DuplicateAddress(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Represents a registered account
///
/// The balance is not stored here; it is derived from the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Account {
    /// The account's address
    pub address: Address,

    /// Optional unique handle
    pub alias: Option<String>,

    /// Registration time in milliseconds since the Unix epoch
    pub created_at: i64,
}

/// Registry of known addresses and their aliases
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    accounts: Arc<DashMap<Address, Account>>,
    aliases: Arc<DashMap<String, Address>>,
}

fn normalize_alias(alias: Option<&str>) -> Option<String> {
    alias
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
}

impl AccountDirectory {
    pub fn new() -> Self {
        AccountDirectory::default()
    }

    /// Creates an account with a freshly generated address
    ///
    /// # Arguments
    ///
    /// * `alias` - Optional handle; blank aliases are ignored
    /// * `created_at` - Registration time in milliseconds
    pub fn create(&self, alias: Option<&str>, created_at: i64) -> Result<Account, AccountError> {
        let mut address = Address::generate();
        while self.accounts.contains_key(&address) {
            address = Address::generate();
        }
        self.register(address, alias, created_at)
    }

    /// Registers a literal address, optionally under an alias
    pub fn register(
        &self,
        address: Address,
        alias: Option<&str>,
        created_at: i64,
    ) -> Result<Account, AccountError> {
        if address.is_empty() {
            return Err(AccountError::InvalidAddress("address must not be empty".to_string()));
        }

        let alias = normalize_alias(alias);

        if self.accounts.contains_key(&address) {
            return Err(AccountError::DuplicateAddress(address.0));
        }
        // A literal address may not collide with an alias
        if self.aliases.contains_key(address.as_str()) {
            return Err(AccountError::DuplicateAlias(address.0));
        }

        if let Some(alias) = &alias {
            // An alias may not shadow another account's address either
            if self.aliases.contains_key(alias) || self.accounts.contains_key(&Address::from(alias.as_str())) {
                return Err(AccountError::DuplicateAlias(alias.clone()));
            }
        }

        let account = Account {
            address: address.clone(),
            alias: alias.clone(),
            created_at,
        };

        if let Some(alias) = alias {
            self.aliases.insert(alias, address.clone());
        }
        self.accounts.insert(address, account.clone());

        Ok(account)
    }

    /// Maps an alias to its address, or treats the input as a literal address
    pub fn resolve(&self, alias_or_address: &str) -> Address {
        let key = alias_or_address.trim();
        match self.aliases.get(key) {
            Some(address) => address.value().clone(),
            None => Address::from(key),
        }
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    /// All accounts, oldest first
    pub fn list(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.address.cmp(&b.address))
        });
        accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_account() {
        let directory = AccountDirectory::new();
        let account = directory.create(Some("alice"), 5).unwrap();

        assert!(account.address.is_well_formed());
        assert_eq!(account.alias.as_deref(), Some("alice"));
        assert_eq!(account.created_at, 5);
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.resolve("alice"), account.address);
    }

    #[test]
    fn test_resolve_falls_back_to_input() {
        let directory = AccountDirectory::new();
        assert_eq!(directory.resolve("0xunknown"), Address::from("0xunknown"));
        assert_eq!(directory.resolve(" bob "), Address::from("bob"));
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let directory = AccountDirectory::new();
        directory.create(Some("alice"), 0).unwrap();

        let result = directory.create(Some(" alice "), 1);
        assert!(matches!(result, Err(AccountError::DuplicateAlias(_))));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let directory = AccountDirectory::new();
        let address = Address::generate();
        directory.register(address.clone(), None, 0).unwrap();

        let result = directory.register(address, Some("carol"), 1);
        assert!(matches!(result, Err(AccountError::DuplicateAddress(_))));
        assert!(directory.list().iter().all(|a| a.alias.is_none()));
    }

    #[test]
    fn test_alias_cannot_shadow_address() {
        let directory = AccountDirectory::new();
        let first = directory.create(None, 0).unwrap();

        let result = directory.create(Some(first.address.as_str()), 1);
        assert!(matches!(result, Err(AccountError::DuplicateAlias(_))));
    }

    #[test]
    fn test_address_cannot_shadow_alias() {
        let directory = AccountDirectory::new();
        let bob = directory.create(Some("bob"), 0).unwrap();

        let result = directory.register(Address::from("bob"), None, 1);
        assert!(matches!(result, Err(AccountError::DuplicateAlias(_))));
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.resolve("bob"), bob.address);
    }

    #[test]
    fn test_blank_alias_is_none() {
        let directory = AccountDirectory::new();
        let a = directory.create(Some("  "), 0).unwrap();
        let b = directory.create(Some(""), 0).unwrap();

        assert!(a.alias.is_none());
        assert!(b.alias.is_none());
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn test_list_is_ordered_by_creation() {
        let directory = AccountDirectory::new();
        directory.create(Some("late"), 20).unwrap();
        directory.create(Some("early"), 10).unwrap();

        let aliases: Vec<_> = directory
            .list()
            .into_iter()
            .filter_map(|a| a.alias)
            .collect();
        assert_eq!(aliases, vec!["early".to_string(), "late".to_string()]);
    }
}
