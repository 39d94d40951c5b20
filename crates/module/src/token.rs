//! Fungible token ledger used to move bids, fees and prizes.
//!
//! The auction never mints or burns; it only moves balances between its
//! treasury account and user accounts.

use auction_types::Address;
use std::collections::HashMap;
use thiserror::Error;

/// Transfer failures reported by a token ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Insufficient token balance: need {required}, have {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Insufficient allowance: need {required}, allowed {allowed}")]
    InsufficientAllowance { required: u64, allowed: u64 },

    #[error("Balance overflow")]
    Overflow,
}

impl TokenError {
    /// Stable identifier for front-ends and indexers.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::InsufficientFunds { .. } => "TokenInsufficientFunds",
            TokenError::InsufficientAllowance { .. } => "TokenInsufficientAllowance",
            TokenError::Overflow => "TokenOverflow",
        }
    }
}

/// ERC-20 style account interface.
pub trait TokenLedger {
    /// Balance held by `owner`.
    fn balance_of(&self, owner: &Address) -> u64;

    /// Amount `spender` may still pull from `owner`.
    fn allowance(&self, owner: &Address, spender: &Address) -> u64;

    /// Move `amount` from `from` to `to`.
    fn transfer(&mut self, from: &Address, to: &Address, amount: u64) -> Result<(), TokenError>;

    /// Pull `amount` from `from` into `to`, spending `spender`'s allowance.
    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenError>;
}

/// In-memory token ledger for local chains and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryToken {
    balances: HashMap<Address, u64>,
    allowances: HashMap<(Address, Address), u64>,
    total_supply: u64,
}

impl InMemoryToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create tokens out of thin air. Only hosts and tests call this.
    pub fn mint(&mut self, to: Address, amount: u64) -> Result<(), TokenError> {
        let balance = self.balances.entry(to).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(TokenError::Overflow)?;
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        Ok(())
    }

    /// Set the allowance `owner` grants `spender`.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: u64) {
        self.allowances.insert((owner, spender), amount);
    }

    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    fn move_balance(&mut self, from: &Address, to: &Address, amount: u64) -> Result<(), TokenError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(TokenError::InsufficientFunds {
                required: amount,
                available,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        self.balances.insert(*from, available - amount);
        self.balances.insert(*to, credited);
        Ok(())
    }
}

impl TokenLedger for InMemoryToken {
    fn balance_of(&self, owner: &Address) -> u64 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u64) -> Result<(), TokenError> {
        self.move_balance(from, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenError> {
        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                required: amount,
                allowed,
            });
        }
        self.move_balance(from, to, amount)?;
        self.allowances.insert((*from, *spender), allowed - amount);
        Ok(())
    }
}
