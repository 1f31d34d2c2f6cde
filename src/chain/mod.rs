pub mod abi;
pub mod privy;
pub mod simulated;

pub use privy::{PrivyConfig, PrivyWalletAdapter};
pub use simulated::SimulatedWallet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("ABI encoding failed: {0}")]
    Encoding(String),

    #[error("Wallet provider rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Operation not supported by this wallet: {0}")]
    Unsupported(String),

    #[error("Wallet transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    pub from_chain: String,
    pub to_chain: String,
    pub from_token: String,
    pub to_token: String,
    pub amount: String,
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCall {
    pub contract_address: String,
    /// Either a bare method name or a full signature such as `deposit(uint256)`.
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    pub wallet_id: String,
    pub balances: BTreeMap<String, String>,
}

/// Port onto the custodial server wallet that signs and submits transactions.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn execute_bridge(&self, request: &BridgeRequest) -> Result<TxReceipt, ChainError>;

    async fn execute_contract_interaction(
        &self,
        call: &ContractCall,
    ) -> Result<TxReceipt, ChainError>;

    async fn get_wallet_balance(&self) -> Result<WalletBalance, ChainError>;

    async fn sign_message(&self, message: &str) -> Result<String, ChainError>;
}
