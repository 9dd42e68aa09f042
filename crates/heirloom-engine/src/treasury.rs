//! In-memory token balances for home-chain accounts.

use crate::ports::Treasury;
use heirloom_core::{Address, ErrorKind, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreasuryError {
    #[error("Insufficient balance for {account}: has {available} of {token}, needs {requested}")]
    InsufficientBalance {
        account: Address,
        token: TokenId,
        available: u128,
        requested: u128,
    },

    #[error("Balance overflow for {account} in {token}")]
    Overflow { account: Address, token: TokenId },
}

impl TreasuryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TreasuryError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            TreasuryError::Overflow { .. } => ErrorKind::InvalidParameter,
        }
    }
}

/// Account → token → balance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountBook {
    balances: BTreeMap<Address, BTreeMap<TokenId, u128>>,
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account from outside the ledger (a home-chain deposit).
    pub fn fund(
        &mut self,
        account: Address,
        token: TokenId,
        amount: u128,
    ) -> Result<u128, TreasuryError> {
        let balance = self
            .balances
            .entry(account)
            .or_default()
            .entry(token)
            .or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(TreasuryError::Overflow { account, token })?;
        Ok(*balance)
    }

    /// Non-zero balances of an account.
    pub fn holdings(&self, account: &Address) -> Vec<(TokenId, u128)> {
        self.balances
            .get(account)
            .map(|tokens| {
                tokens
                    .iter()
                    .filter(|(_, amount)| **amount > 0)
                    .map(|(token, amount)| (*token, *amount))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Treasury for AccountBook {
    fn balance_of(&self, account: &Address, token: &TokenId) -> u128 {
        self.balances
            .get(account)
            .and_then(|tokens| tokens.get(token))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        token: TokenId,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), TreasuryError> {
        let available = self.balance_of(&from, &token);
        if available < amount {
            return Err(TreasuryError::InsufficientBalance {
                account: from,
                token,
                available,
                requested: amount,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let receiver = self.balance_of(&to, &token);
        let credited = receiver
            .checked_add(amount)
            .ok_or(TreasuryError::Overflow { account: to, token })?;

        self.balances
            .entry(from)
            .or_default()
            .insert(token, available - amount);
        self.balances.entry(to).or_default().insert(token, credited);
        Ok(())
    }
}
