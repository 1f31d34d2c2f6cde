use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::abi::to_hex;
use super::{BridgeRequest, ChainAdapter, ChainError, ContractCall, TxReceipt, WalletBalance};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashSource {
    Random,
    Sequential,
}

/// Test double for the custodial server wallet. Every call succeeds and
/// returns a fabricated 32-byte hash; nothing touches a chain.
pub struct SimulatedWallet {
    wallet_id: String,
    source: HashSource,
    counter: AtomicU64,
}

impl SimulatedWallet {
    pub fn new(wallet_id: impl Into<String>) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            source: HashSource::Random,
            counter: AtomicU64::new(0),
        }
    }

    /// Hashes are `0x00..01`, `0x00..02`, ... in call order.
    pub fn deterministic(wallet_id: impl Into<String>) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            source: HashSource::Sequential,
            counter: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    fn next_hash(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        match self.source {
            HashSource::Random => {
                let mut bytes = [0u8; 32];
                bytes[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
                bytes[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
                to_hex(&bytes)
            }
            HashSource::Sequential => format!("0x{:064x}", n),
        }
    }
}

#[async_trait]
impl ChainAdapter for SimulatedWallet {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn execute_bridge(&self, request: &BridgeRequest) -> Result<TxReceipt, ChainError> {
        log::info!(
            "[simulated wallet {}] bridge {} {} ({}) -> {} ({})",
            self.wallet_id,
            request.amount,
            request.from_token,
            request.from_chain,
            request.to_token,
            request.to_chain
        );

        let tx_hash = self.next_hash();
        let order_hash = self.next_hash();
        Ok(TxReceipt {
            tx_hash,
            status: "submitted".to_string(),
            details: Some(json!({
                "orderHash": order_hash,
                "fromChain": request.from_chain,
                "toChain": request.to_chain,
                "amount": request.amount,
                "simulated": true,
            })),
        })
    }

    async fn execute_contract_interaction(
        &self,
        call: &ContractCall,
    ) -> Result<TxReceipt, ChainError> {
        log::info!(
            "[simulated wallet {}] call {}.{} args={:?}",
            self.wallet_id,
            call.contract_address,
            call.method,
            call.args
        );

        Ok(TxReceipt {
            tx_hash: self.next_hash(),
            status: "confirmed".to_string(),
            details: Some(json!({
                "contractAddress": call.contract_address,
                "method": call.method,
                "simulated": true,
            })),
        })
    }

    async fn get_wallet_balance(&self) -> Result<WalletBalance, ChainError> {
        log::info!("[simulated wallet {}] balance lookup", self.wallet_id);

        let mut balances = BTreeMap::new();
        balances.insert("FLOW".to_string(), "100.0".to_string());
        balances.insert("USDC".to_string(), "500.0".to_string());
        Ok(WalletBalance {
            wallet_id: self.wallet_id.clone(),
            balances,
        })
    }

    async fn sign_message(&self, message: &str) -> Result<String, ChainError> {
        log::info!(
            "[simulated wallet {}] sign {} bytes",
            self.wallet_id,
            message.len()
        );
        // 65-byte signature shape: two hashes plus a recovery byte
        let r = self.next_hash();
        let s = self.next_hash();
        Ok(format!("{}{}1b", r, &s[2..]))
    }
}
