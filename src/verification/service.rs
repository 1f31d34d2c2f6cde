use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::attestation::{AttestationRequest, AttestationService};
use super::twitter::TwitterClient;
use super::validation::{
    bio_contains_code, generate_bio_code, has_required_hashtags, is_valid_tweet_id,
    is_valid_twitter_handle, is_valid_wallet_address, normalize_handle,
};
use crate::storage::{wallet_key, VerificationStore};
use crate::types::{BioChallenge, OAuthSession, VerificationMethod, VerificationRecord};

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Wallet address already verified")]
    AlreadyVerified,

    #[error("{operation} failed: {message}")]
    Upstream {
        operation: &'static str,
        message: String,
    },
}

impl VerificationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            VerificationError::Validation(_) => StatusCode::BAD_REQUEST,
            VerificationError::NotFound(_) => StatusCode::NOT_FOUND,
            VerificationError::AlreadyVerified => StatusCode::CONFLICT,
            VerificationError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn upstream(operation: &'static str) -> impl Fn(anyhow::Error) -> Self {
        move |err| {
            log::error!("{} failed: {:#}", operation, err);
            VerificationError::Upstream {
                operation,
                message: err.to_string(),
            }
        }
    }
}

pub type VerificationResult<T> = std::result::Result<T, VerificationError>;

#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub oauth_ttl: Duration,
    pub bio_ttl: Duration,
    pub sweep_interval: std::time::Duration,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            oauth_ttl: Duration::minutes(10),
            bio_ttl: Duration::minutes(30),
            sweep_interval: std::time::Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatus {
    pub wallet_address: String,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthInitiation {
    pub auth_url: String,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BioInitiation {
    pub verification_code: String,
    pub instructions: String,
    pub expires_at: DateTime<Utc>,
}

/// Proves wallet ownership of a Twitter account and records an attestation.
pub struct VerificationService {
    store: Arc<dyn VerificationStore>,
    twitter: Arc<dyn TwitterClient>,
    attestation: Arc<dyn AttestationService>,
    config: VerificationConfig,
}

fn require_wallet(wallet_address: &str) -> VerificationResult<()> {
    if wallet_address.is_empty() {
        return Err(VerificationError::Validation(
            "walletAddress is required".to_string(),
        ));
    }
    if !is_valid_wallet_address(wallet_address) {
        return Err(VerificationError::Validation(
            "Invalid wallet address format".to_string(),
        ));
    }
    Ok(())
}

fn require_handle(handle: &str) -> VerificationResult<String> {
    let handle = handle.trim();
    if handle.is_empty() {
        return Err(VerificationError::Validation(
            "twitterHandle is required".to_string(),
        ));
    }
    if !is_valid_twitter_handle(handle) {
        return Err(VerificationError::Validation(
            "Invalid Twitter handle format".to_string(),
        ));
    }
    Ok(normalize_handle(handle))
}

fn pkce_verifier() -> String {
    // 64 unreserved characters, within the 43..=128 PKCE bounds
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

impl VerificationService {
    pub fn new(
        store: Arc<dyn VerificationStore>,
        twitter: Arc<dyn TwitterClient>,
        attestation: Arc<dyn AttestationService>,
        config: VerificationConfig,
    ) -> Self {
        Self {
            store,
            twitter,
            attestation,
            config,
        }
    }

    pub fn twitter_mode(&self) -> &str {
        self.twitter.mode()
    }

    pub fn attestation_provider(&self) -> &str {
        self.attestation.name()
    }

    pub async fn status(&self, wallet_address: &str) -> VerificationResult<VerificationStatus> {
        require_wallet(wallet_address)?;
        let verification = self
            .store
            .get_verification(wallet_address)
            .await
            .map_err(VerificationError::upstream("Status lookup"))?;

        Ok(VerificationStatus {
            wallet_address: wallet_key(wallet_address),
            verified: verification.is_some(),
            verification,
        })
    }

    async fn ensure_unverified(
        &self,
        wallet_address: &str,
        operation: &'static str,
    ) -> VerificationResult<()> {
        let existing = self
            .store
            .get_verification(wallet_address)
            .await
            .map_err(VerificationError::upstream(operation))?;
        match existing {
            Some(_) => Err(VerificationError::AlreadyVerified),
            None => Ok(()),
        }
    }

    async fn attest_and_store(
        &self,
        request: AttestationRequest,
        tweet_id: Option<String>,
        operation: &'static str,
    ) -> VerificationResult<VerificationRecord> {
        let receipt = self
            .attestation
            .submit(&request)
            .await
            .map_err(VerificationError::upstream(operation))?;

        let record = VerificationRecord {
            wallet_address: wallet_key(&request.wallet_address),
            twitter_handle: request.twitter_handle,
            twitter_user_id: request.twitter_user_id,
            method: request.method,
            tweet_id,
            attestation: receipt,
            verified_at: Utc::now(),
        };
        // A concurrent flow may have verified the wallet since the early check
        let inserted = self
            .store
            .insert_verification(&record)
            .await
            .map_err(VerificationError::upstream(operation))?;
        if !inserted {
            return Err(VerificationError::AlreadyVerified);
        }

        log::info!(
            "Verified {} as @{} via {}",
            record.wallet_address,
            record.twitter_handle,
            record.method.as_str()
        );
        Ok(record)
    }

    /// Verifies a public tweet carrying the required hashtags.
    pub async fn verify_tweet(
        &self,
        wallet_address: &str,
        twitter_handle: &str,
        tweet_id: &str,
    ) -> VerificationResult<VerificationRecord> {
        const OP: &str = "Verification";

        if wallet_address.is_empty() || twitter_handle.is_empty() || tweet_id.is_empty() {
            return Err(VerificationError::Validation(
                "walletAddress, twitterHandle, and tweetId are required".to_string(),
            ));
        }
        require_wallet(wallet_address)?;
        let handle = require_handle(twitter_handle)?;
        if !is_valid_tweet_id(tweet_id) {
            return Err(VerificationError::Validation(
                "Invalid tweet ID format".to_string(),
            ));
        }

        self.ensure_unverified(wallet_address, OP).await?;

        let tweet = self
            .twitter
            .get_tweet(tweet_id)
            .await
            .map_err(VerificationError::upstream(OP))?;

        if !has_required_hashtags(&tweet.text) {
            return Err(VerificationError::Validation(
                "Tweet must contain both #FlareVerified and #AIETF hashtags".to_string(),
            ));
        }

        // The author is only checked when the lookup expanded it
        if let Some(author) = &tweet.author_username {
            if !author.eq_ignore_ascii_case(&handle) {
                return Err(VerificationError::Validation(
                    "Tweet author does not match the provided Twitter handle".to_string(),
                ));
            }
        }

        let request = AttestationRequest {
            wallet_address: wallet_address.to_string(),
            twitter_handle: handle,
            twitter_user_id: tweet.author_id,
            method: VerificationMethod::Tweet,
            proof: Some(tweet.id.clone()),
        };
        self.attest_and_store(request, Some(tweet.id), OP).await
    }

    pub async fn oauth_initiate(&self, wallet_address: &str) -> VerificationResult<OAuthInitiation> {
        const OP: &str = "OAuth initiation";

        require_wallet(wallet_address)?;
        self.ensure_unverified(wallet_address, OP).await?;

        let now = Utc::now();
        let session = OAuthSession {
            state: Uuid::new_v4().simple().to_string(),
            wallet_address: wallet_key(wallet_address),
            code_verifier: pkce_verifier(),
            created_at: now,
            expires_at: now + self.config.oauth_ttl,
        };

        let auth_url = self
            .twitter
            .authorize_url(&session.state, &session.code_verifier)
            .map_err(VerificationError::upstream(OP))?;
        self.store
            .save_oauth_session(&session)
            .await
            .map_err(VerificationError::upstream(OP))?;

        Ok(OAuthInitiation {
            auth_url,
            state: session.state,
        })
    }

    pub async fn oauth_callback(
        &self,
        code: &str,
        state: &str,
    ) -> VerificationResult<VerificationRecord> {
        const OP: &str = "OAuth callback";

        if code.is_empty() || state.is_empty() {
            return Err(VerificationError::Validation(
                "code and state are required".to_string(),
            ));
        }

        let session = self
            .store
            .take_oauth_session(state)
            .await
            .map_err(VerificationError::upstream(OP))?
            .ok_or_else(|| {
                VerificationError::Validation("Invalid or expired OAuth state".to_string())
            })?;

        self.ensure_unverified(&session.wallet_address, OP).await?;

        let token = self
            .twitter
            .exchange_code(code, &session.code_verifier)
            .await
            .map_err(VerificationError::upstream(OP))?;
        let user = self
            .twitter
            .get_authenticated_user(&token)
            .await
            .map_err(VerificationError::upstream(OP))?;

        let request = AttestationRequest {
            wallet_address: session.wallet_address,
            twitter_handle: user.username,
            twitter_user_id: user.id,
            method: VerificationMethod::OAuth,
            proof: None,
        };
        self.attest_and_store(request, None, OP).await
    }

    pub async fn bio_initiate(
        &self,
        wallet_address: &str,
        twitter_handle: &str,
    ) -> VerificationResult<BioInitiation> {
        const OP: &str = "Bio verification initiation";

        require_wallet(wallet_address)?;
        let handle = require_handle(twitter_handle)?;
        self.ensure_unverified(wallet_address, OP).await?;

        let now = Utc::now();
        let challenge = BioChallenge {
            wallet_address: wallet_key(wallet_address),
            twitter_handle: handle.clone(),
            code: generate_bio_code(),
            created_at: now,
            expires_at: now + self.config.bio_ttl,
        };
        self.store
            .save_bio_challenge(&challenge)
            .await
            .map_err(VerificationError::upstream(OP))?;

        Ok(BioInitiation {
            instructions: format!(
                "Add the code {} to the bio of @{}, then complete verification within {} minutes.",
                challenge.code,
                handle,
                self.config.bio_ttl.num_minutes()
            ),
            verification_code: challenge.code,
            expires_at: challenge.expires_at,
        })
    }

    pub async fn bio_complete(&self, wallet_address: &str) -> VerificationResult<VerificationRecord> {
        const OP: &str = "Bio verification";

        require_wallet(wallet_address)?;
        self.ensure_unverified(wallet_address, OP).await?;

        let challenge = self
            .store
            .get_bio_challenge(wallet_address)
            .await
            .map_err(VerificationError::upstream(OP))?
            .ok_or_else(|| {
                VerificationError::NotFound(
                    "No pending bio verification found for this wallet".to_string(),
                )
            })?;

        let user = self
            .twitter
            .get_user_by_username(&challenge.twitter_handle)
            .await
            .map_err(VerificationError::upstream(OP))?;

        if !bio_contains_code(&user.description, &challenge.code) {
            return Err(VerificationError::Validation(format!(
                "Verification code {} not found in the bio of @{}",
                challenge.code, challenge.twitter_handle
            )));
        }

        let request = AttestationRequest {
            wallet_address: challenge.wallet_address.clone(),
            twitter_handle: user.username,
            twitter_user_id: user.id,
            method: VerificationMethod::Bio,
            proof: Some(challenge.code.clone()),
        };
        let record = self.attest_and_store(request, None, OP).await?;

        self.store
            .remove_bio_challenge(wallet_address)
            .await
            .map_err(VerificationError::upstream(OP))?;
        Ok(record)
    }

    /// Periodically drops expired OAuth sessions and bio challenges.
    pub fn spawn_expiry_sweep(&self) -> JoinHandle<()> {
        let store = self.store.clone();
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(n) => log::debug!("Purged {} expired verification entries", n),
                    Err(e) => log::warn!("Expiry sweep failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use crate::verification::attestation::MockAttestationService;
    use crate::verification::twitter::{MockTwitterClient, Tweet, TwitterUser};

    const WALLET: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    fn create_test_service(
        twitter: MockTwitterClient,
    ) -> (VerificationService, InMemoryStore, Arc<MockAttestationService>) {
        let store = InMemoryStore::new();
        let attestation = Arc::new(MockAttestationService::new());
        let service = VerificationService::new(
            Arc::new(store.clone()),
            Arc::new(twitter),
            attestation.clone(),
            VerificationConfig::default(),
        );
        (service, store, attestation)
    }

    fn tweet(id: &str, text: &str, author: Option<&str>) -> Tweet {
        Tweet {
            id: id.to_string(),
            text: text.to_string(),
            author_id: "42".to_string(),
            author_username: author.map(str::to_string),
        }
    }

    fn user(username: &str, bio: &str) -> TwitterUser {
        TwitterUser {
            id: "42".to_string(),
            username: username.to_string(),
            name: username.to_string(),
            description: bio.to_string(),
            followers_count: 10,
            verified: false,
        }
    }

    /// Reads as if no wallet were verified yet, like a request racing another.
    struct StaleReadStore(InMemoryStore);

    #[async_trait::async_trait]
    impl VerificationStore for StaleReadStore {
        async fn get_verification(&self, _: &str) -> anyhow::Result<Option<VerificationRecord>> {
            Ok(None)
        }
        async fn insert_verification(&self, record: &VerificationRecord) -> anyhow::Result<bool> {
            self.0.insert_verification(record).await
        }
        async fn save_oauth_session(&self, session: &OAuthSession) -> anyhow::Result<()> {
            self.0.save_oauth_session(session).await
        }
        async fn take_oauth_session(&self, state: &str) -> anyhow::Result<Option<OAuthSession>> {
            self.0.take_oauth_session(state).await
        }
        async fn save_bio_challenge(&self, challenge: &BioChallenge) -> anyhow::Result<()> {
            self.0.save_bio_challenge(challenge).await
        }
        async fn get_bio_challenge(&self, wallet: &str) -> anyhow::Result<Option<BioChallenge>> {
            self.0.get_bio_challenge(wallet).await
        }
        async fn remove_bio_challenge(&self, wallet: &str) -> anyhow::Result<()> {
            self.0.remove_bio_challenge(wallet).await
        }
        async fn purge_expired(&self) -> anyhow::Result<usize> {
            self.0.purge_expired().await
        }
    }

    #[tokio::test]
    async fn test_racing_verifications_conflict() {
        let twitter = MockTwitterClient::new();
        twitter
            .add_tweet(tweet("100", "gm #FlareVerified #AIETF", Some("alice")))
            .await;
        twitter
            .add_tweet(tweet("200", "gm #FlareVerified #AIETF", Some("bob")))
            .await;
        let store = InMemoryStore::new();
        let service = VerificationService::new(
            Arc::new(StaleReadStore(store.clone())),
            Arc::new(twitter),
            Arc::new(MockAttestationService::new()),
            VerificationConfig::default(),
        );

        let (first, second) = tokio::join!(
            service.verify_tweet(WALLET, "alice", "100"),
            service.verify_tweet(WALLET, "bob", "200"),
        );

        let outcomes = [first, second];
        let winners: Vec<&VerificationRecord> =
            outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(VerificationError::AlreadyVerified))));

        let stored = store.get_verification(WALLET).await.unwrap().unwrap();
        assert_eq!(stored.twitter_handle, winners[0].twitter_handle);
    }

    #[tokio::test]
    async fn test_verify_tweet_then_conflict() {
        let twitter = MockTwitterClient::new();
        twitter
            .add_tweet(tweet("100", "gm #FlareVerified #AIETF", Some("Alice")))
            .await;
        let (service, _, attestation) = create_test_service(twitter);

        let record = service.verify_tweet(WALLET, "@alice", "100").await.unwrap();
        assert_eq!(record.wallet_address, WALLET.to_lowercase());
        assert_eq!(record.twitter_handle, "alice");
        assert_eq!(record.tweet_id.as_deref(), Some("100"));

        let err = service
            .verify_tweet(WALLET, "alice", "100")
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::AlreadyVerified));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(attestation.submitted(), 1);

        let status = service.status(&WALLET.to_lowercase()).await.unwrap();
        assert!(status.verified);
    }

    #[tokio::test]
    async fn test_verify_tweet_rejects_missing_hashtag() {
        let twitter = MockTwitterClient::new();
        twitter.add_tweet(tweet("100", "gm #AIETF", None)).await;
        let (service, _, _) = create_test_service(twitter);

        let err = service.verify_tweet(WALLET, "alice", "100").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Tweet must contain both #FlareVerified and #AIETF hashtags"
        );
    }

    #[tokio::test]
    async fn test_verify_tweet_rejects_other_author() {
        let twitter = MockTwitterClient::new();
        twitter
            .add_tweet(tweet("100", "#FlareVerified #AIETF", Some("mallory")))
            .await;
        let (service, store, _) = create_test_service(twitter);

        let err = service.verify_tweet(WALLET, "alice", "100").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(store.get_verification(WALLET).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_tweet_is_upstream_failure() {
        let (service, _, _) = create_test_service(MockTwitterClient::new());
        let err = service.verify_tweet(WALLET, "alice", "100").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("Verification failed: "));
    }

    #[tokio::test]
    async fn test_input_validation() {
        let (service, _, _) = create_test_service(MockTwitterClient::permissive());

        let err = service.status("0xBADADDRESS").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = service.verify_tweet(WALLET, "alice", "12ab").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid tweet ID format");

        let err = service
            .verify_tweet(WALLET, "not-a-handle", "1")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid Twitter handle format");

        let err = service.verify_tweet("", "alice", "1").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "walletAddress, twitterHandle, and tweetId are required"
        );
    }

    #[tokio::test]
    async fn test_oauth_flow() {
        let twitter = MockTwitterClient::new();
        twitter.add_user(user("alice", "")).await;
        let (service, store, _) = create_test_service(twitter);

        let initiation = service.oauth_initiate(WALLET).await.unwrap();
        assert!(initiation
            .auth_url
            .contains(&format!("code=mock_code_{}", initiation.state)));
        assert_eq!(store.pending_count().await, 1);

        let record = service
            .oauth_callback(&format!("mock_code_{}", initiation.state), &initiation.state)
            .await
            .unwrap();
        assert_eq!(record.method, VerificationMethod::OAuth);
        assert_eq!(record.twitter_handle, "alice");
        assert_eq!(store.pending_count().await, 0);

        // State is single use
        let err = service
            .oauth_callback("mock_code_x", &initiation.state)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired OAuth state");
    }

    #[tokio::test]
    async fn test_bio_flow() {
        let (service, store, _) = create_test_service(MockTwitterClient::new());

        let err = service.bio_complete(WALLET).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let initiation = service.bio_initiate(WALLET, "@alice").await.unwrap();
        assert_eq!(initiation.verification_code.len(), 8);
        assert!(initiation
            .instructions
            .contains(&initiation.verification_code));
        assert!(store.get_bio_challenge(WALLET).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_bio_complete_matches_code_case_insensitively() {
        let store = InMemoryStore::new();
        let twitter = Arc::new(MockTwitterClient::new());
        let service = VerificationService::new(
            Arc::new(store.clone()),
            twitter.clone(),
            Arc::new(MockAttestationService::new()),
            VerificationConfig::default(),
        );

        let initiation = service.bio_initiate(WALLET, "alice").await.unwrap();

        twitter.add_user(user("alice", "building things | gm")).await;
        let err = service.bio_complete(WALLET).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let bio = format!("verify {} | gm", initiation.verification_code.to_lowercase());
        twitter.add_user(user("alice", &bio)).await;
        let record = service.bio_complete(WALLET).await.unwrap();
        assert_eq!(record.method, VerificationMethod::Bio);
        assert!(store.get_bio_challenge(WALLET).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_initiate_rejects_verified_wallet() {
        let (service, _, _) = create_test_service(MockTwitterClient::permissive());
        service.verify_tweet(WALLET, "alice", "7").await.unwrap();

        let err = service.bio_initiate(WALLET, "alice").await.unwrap_err();
        assert!(matches!(err, VerificationError::AlreadyVerified));
        let err = service.oauth_initiate(WALLET).await.unwrap_err();
        assert!(matches!(err, VerificationError::AlreadyVerified));
    }
}
