use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api::{handlers, verification};
use crate::config::Config;
use crate::engine::ExecutorConfig;
use crate::providers::LLMProvider;
use crate::storage::{InMemoryStore, PlanStore, PostgresStore, VerificationStore};
use crate::verification::{
    AttestationService, FlareAttestationClient, MockAttestationService, MockTwitterClient,
    TwitterApiClient, TwitterClient, TwitterConfig, VerificationConfig, VerificationService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub plans: Arc<dyn PlanStore>,
    pub verification: Arc<VerificationService>,
    /// Model configured at startup; requests may supply their own key.
    pub llm: Option<Arc<dyn LLMProvider>>,
    pub executor: ExecutorConfig,
}

impl AppState {
    /// Wires live or mock collaborators depending on which credentials are set.
    pub async fn from_config(config: Config) -> Result<Self> {
        let memory = InMemoryStore::new();

        let verification_store: Arc<dyn VerificationStore> = match &config.database_url {
            Some(url) => {
                let store = PostgresStore::new(url).await?;
                store.run_migrations().await?;
                log::info!("Verification records stored in PostgreSQL");
                Arc::new(store)
            }
            None => {
                log::info!("DATABASE_URL not set, verification records kept in memory");
                Arc::new(memory.clone())
            }
        };

        let twitter: Arc<dyn TwitterClient> = match &config.twitter_bearer_token {
            Some(token) => Arc::new(TwitterApiClient::new(TwitterConfig {
                bearer_token: token.clone(),
                client_id: config.twitter_client_id.clone(),
                client_secret: config.twitter_client_secret.clone(),
                redirect_uri: config.twitter_redirect_uri.clone(),
            })),
            None => {
                log::warn!("TWITTER_BEARER_TOKEN not set, using mock Twitter client");
                let callback = config.twitter_redirect_uri.clone().unwrap_or_else(|| {
                    format!(
                        "http://localhost:{}/api/verify-twitter/oauth/callback",
                        config.port
                    )
                });
                Arc::new(MockTwitterClient::permissive().with_callback_url(callback))
            }
        };

        let attestation: Arc<dyn AttestationService> = match &config.flare_api_key {
            Some(key) => Arc::new(FlareAttestationClient::new(
                key.clone(),
                config.flare_verifier_url.clone(),
            )),
            None => {
                log::warn!("FLARE_API_KEY not set, using mock attestation service");
                Arc::new(MockAttestationService::new())
            }
        };

        let llm: Option<Arc<dyn LLMProvider>> = config
            .gemini_api_key
            .as_ref()
            .map(|key| Arc::new(config.gemini_provider(key)) as Arc<dyn LLMProvider>);

        Ok(Self {
            executor: config.executor_config(),
            plans: Arc::new(memory),
            verification: Arc::new(VerificationService::new(
                verification_store,
                twitter,
                attestation,
                VerificationConfig::default(),
            )),
            llm,
            config: Arc::new(config),
        })
    }

    /// A request-supplied key takes precedence over the configured model.
    pub fn llm_for(&self, api_key: Option<&str>) -> Option<Arc<dyn LLMProvider>> {
        match api_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Some(Arc::new(self.config.gemini_provider(key))),
            None => self.llm.clone(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/auto-agent/plan", post(handlers::create_plan))
        .route("/api/auto-agent/execute", post(handlers::execute_plan))
        .route("/api/auto-agent/plans/:id", get(handlers::get_plan))
        .route("/api/auto-agent/explain", post(handlers::explain_action))
        .route("/api/auto-agent/suggestions", post(handlers::suggestions))
        .route(
            "/api/verification/status/:wallet_address",
            get(verification::status),
        )
        .route("/api/verify-twitter", post(verification::verify_tweet))
        .route(
            "/api/verify-twitter/oauth/initiate",
            post(verification::oauth_initiate),
        )
        .route(
            "/api/verify-twitter/oauth/callback",
            get(verification::oauth_callback),
        )
        .route(
            "/api/verify-twitter/bio/initiate",
            post(verification::bio_initiate),
        )
        .route(
            "/api/verify-twitter/bio/complete",
            post(verification::bio_complete),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let _sweeper = state.verification.spawn_expiry_sweep();
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    log::info!("ETF agent API listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}
