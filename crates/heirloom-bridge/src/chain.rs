//! Supported chain registry entries

use heirloom_core::{Address, ChainId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain_id: ChainId,
    pub name: String,
    /// Native asset symbol (ETH, MATIC, ...)
    pub symbol: String,
    /// Bridge contract on that chain, if deployed
    pub bridge_contract: Option<Address>,
    pub is_active: bool,
}

impl ChainInfo {
    pub fn new(chain_id: ChainId, name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            chain_id,
            name: name.into(),
            symbol: symbol.into(),
            bridge_contract: None,
            is_active: true,
        }
    }

    pub fn with_bridge_contract(mut self, contract: Address) -> Self {
        self.bridge_contract = Some(contract);
        self
    }
}
