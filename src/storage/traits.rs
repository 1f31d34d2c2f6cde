use anyhow::Result;
use async_trait::async_trait;

use crate::types::{AgentPlan, BioChallenge, OAuthSession, PlanStatus, VerificationRecord};

/// Normalised key for wallet-indexed entries.
pub fn wallet_key(wallet_address: &str) -> String {
    wallet_address.trim().to_lowercase()
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn save_plan(&self, plan: &AgentPlan) -> Result<()>;
    async fn get_plan(&self, id: &str) -> Result<Option<AgentPlan>>;
    async fn list_plans(&self, status: Option<PlanStatus>) -> Result<Vec<AgentPlan>>;
}

/// Verified wallets plus the short-lived challenges that lead to them.
///
/// Verified records never expire. OAuth sessions and bio challenges carry an
/// `expires_at`; expired entries are never returned and are removed by
/// `purge_expired`.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    // Verified records
    async fn get_verification(&self, wallet_address: &str) -> Result<Option<VerificationRecord>>;
    /// Stores `record` unless the wallet is already verified. Returns whether
    /// it was inserted; the check and the write are one atomic step.
    async fn insert_verification(&self, record: &VerificationRecord) -> Result<bool>;

    // OAuth sessions, keyed by state
    async fn save_oauth_session(&self, session: &OAuthSession) -> Result<()>;
    async fn take_oauth_session(&self, state: &str) -> Result<Option<OAuthSession>>;

    // Bio challenges, keyed by wallet
    async fn save_bio_challenge(&self, challenge: &BioChallenge) -> Result<()>;
    async fn get_bio_challenge(&self, wallet_address: &str) -> Result<Option<BioChallenge>>;
    async fn remove_bio_challenge(&self, wallet_address: &str) -> Result<()>;

    /// Drops expired sessions and challenges, returning how many went.
    async fn purge_expired(&self) -> Result<usize>;
}
