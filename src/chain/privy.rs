use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::abi::{encode_call, to_hex};
use super::{BridgeRequest, ChainAdapter, ChainError, ContractCall, TxReceipt, WalletBalance};

const PRIVY_BASE_URL: &str = "https://api.privy.io/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivyConfig {
    pub app_id: String,
    pub app_secret: String,
}

/// Server-wallet client over Privy's wallet RPC endpoint.
pub struct PrivyWalletAdapter {
    config: PrivyConfig,
    wallet_id: String,
    chain_id: u64,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    data: Value,
}

impl PrivyWalletAdapter {
    pub fn new(config: PrivyConfig, wallet_id: impl Into<String>, chain_id: u64) -> Self {
        Self {
            config,
            wallet_id: wallet_id.into(),
            chain_id,
            base_url: PRIVY_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn caip2(&self) -> String {
        format!("eip155:{}", self.chain_id)
    }

    async fn rpc(&self, body: Value) -> Result<Value, ChainError> {
        let response = self
            .client
            .post(format!("{}/wallets/{}/rpc", self.base_url, self.wallet_id))
            .basic_auth(&self.config.app_id, Some(&self.config.app_secret))
            .header("privy-app-id", &self.config.app_id)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::Rejected { status, body });
        }

        let parsed: RpcResponse = response.json().await?;
        Ok(parsed.data)
    }

    fn transaction_for(&self, call: &ContractCall) -> Result<Value, ChainError> {
        let data = encode_call(&call.method, &call.args)?;
        let mut tx = json!({
            "to": call.contract_address,
            "data": to_hex(&data),
        });
        if let Some(value) = &call.value {
            tx["value"] = json!(value);
        }
        Ok(tx)
    }
}

#[async_trait]
impl ChainAdapter for PrivyWalletAdapter {
    fn name(&self) -> &str {
        "privy"
    }

    async fn execute_bridge(&self, request: &BridgeRequest) -> Result<TxReceipt, ChainError> {
        Err(ChainError::Unsupported(format!(
            "bridging {} from {} to {} needs a cross-chain resolver",
            request.from_token, request.from_chain, request.to_chain
        )))
    }

    async fn execute_contract_interaction(
        &self,
        call: &ContractCall,
    ) -> Result<TxReceipt, ChainError> {
        let transaction = self.transaction_for(call)?;
        log::info!(
            "Submitting {} to {} via Privy wallet {}",
            call.method,
            call.contract_address,
            self.wallet_id
        );

        let data = self
            .rpc(json!({
                "method": "eth_sendTransaction",
                "caip2": self.caip2(),
                "params": { "transaction": transaction },
            }))
            .await?;

        let tx_hash = data
            .get("hash")
            .and_then(|h| h.as_str())
            .ok_or_else(|| ChainError::Rejected {
                status: 200,
                body: format!("missing hash in {}", data),
            })?
            .to_string();

        Ok(TxReceipt {
            tx_hash,
            status: "submitted".to_string(),
            details: Some(data),
        })
    }

    async fn get_wallet_balance(&self) -> Result<WalletBalance, ChainError> {
        let response = self
            .client
            .get(format!("{}/wallets/{}/balance", self.base_url, self.wallet_id))
            .basic_auth(&self.config.app_id, Some(&self.config.app_secret))
            .header("privy-app-id", &self.config.app_id)
            .query(&[("asset", "eth"), ("chain", "base")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::Rejected { status, body });
        }

        let body: Value = response.json().await?;
        let mut balances = BTreeMap::new();
        if let Some(entries) = body.get("balances").and_then(|b| b.as_array()) {
            for entry in entries {
                let asset = entry.get("asset").and_then(|a| a.as_str());
                let amount = entry
                    .get("display_values")
                    .and_then(|d| d.get(asset.unwrap_or_default()))
                    .and_then(|v| v.as_str())
                    .or_else(|| entry.get("raw_value").and_then(|v| v.as_str()));
                if let (Some(asset), Some(amount)) = (asset, amount) {
                    balances.insert(asset.to_uppercase(), amount.to_string());
                }
            }
        }

        Ok(WalletBalance {
            wallet_id: self.wallet_id.clone(),
            balances,
        })
    }

    async fn sign_message(&self, message: &str) -> Result<String, ChainError> {
        let data = self
            .rpc(json!({
                "method": "personal_sign",
                "params": { "message": message, "encoding": "utf-8" },
            }))
            .await?;

        data.get("signature")
            .and_then(|s| s.as_str())
            .map(str::to_string)
            .ok_or_else(|| ChainError::Rejected {
                status: 200,
                body: format!("missing signature in {}", data),
            })
    }
}
