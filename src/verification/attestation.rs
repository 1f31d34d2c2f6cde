use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{AttestationReceipt, VerificationMethod};

const DEFAULT_FLARE_VERIFIER_URL: &str = "https://fdc-verifiers-testnet.flare.network";

/// Claim that a wallet is controlled by a Twitter account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationRequest {
    pub wallet_address: String,
    pub twitter_handle: String,
    pub twitter_user_id: String,
    pub method: VerificationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
}

#[async_trait]
pub trait AttestationService: Send + Sync {
    fn name(&self) -> &str;
    async fn submit(&self, request: &AttestationRequest) -> Result<AttestationReceipt>;
}

pub struct FlareAttestationClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlareResponse {
    #[serde(alias = "id")]
    attestation_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "votingRound")]
    round_id: Option<u64>,
}

impl FlareAttestationClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_FLARE_VERIFIER_URL.to_string()),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AttestationService for FlareAttestationClient {
    fn name(&self) -> &str {
        "flare"
    }

    async fn submit(&self, request: &AttestationRequest) -> Result<AttestationReceipt> {
        let response = self
            .client
            .post(format!("{}/attestations", self.base_url.trim_end_matches('/')))
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({
                "attestationType": "TwitterVerification",
                "request": request,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            anyhow::bail!("Flare verifier error {}: {}", status, body);
        }

        let body: FlareResponse = response.json().await?;
        log::info!(
            "Attestation {} submitted for {}",
            body.attestation_id,
            request.wallet_address
        );

        Ok(AttestationReceipt {
            attestation_id: body.attestation_id,
            status: body.status.unwrap_or_else(|| "pending".to_string()),
            provider: self.name().to_string(),
            round_id: body.round_id,
            submitted_at: Utc::now(),
        })
    }
}

/// Deterministic receipts numbered from 1.
#[derive(Default)]
pub struct MockAttestationService {
    counter: AtomicU64,
}

impl MockAttestationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttestationService for MockAttestationService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(&self, request: &AttestationRequest) -> Result<AttestationReceipt> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!(
            "[mock attestation] {} -> @{} via {}",
            request.wallet_address,
            request.twitter_handle,
            request.method.as_str()
        );
        Ok(AttestationReceipt {
            attestation_id: format!("mock-attestation-{}", n),
            status: "confirmed".to_string(),
            provider: self.name().to_string(),
            round_id: Some(n),
            submitted_at: Utc::now(),
        })
    }
}
