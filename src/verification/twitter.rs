use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

const TWITTER_API_URL: &str = "https://api.twitter.com/2";
const TWITTER_AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
const OAUTH_SCOPES: &str = "tweet.read users.read";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub author_username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwitterUser {
    pub id: String,
    pub username: String,
    pub name: String,
    pub description: String,
    pub followers_count: u64,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[async_trait]
pub trait TwitterClient: Send + Sync {
    /// "live" or "mock"
    fn mode(&self) -> &str;

    async fn get_tweet(&self, tweet_id: &str) -> Result<Tweet>;
    async fn get_user_by_username(&self, username: &str) -> Result<TwitterUser>;

    fn authorize_url(&self, state: &str, code_challenge: &str) -> Result<String>;
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<OAuthToken>;
    async fn get_authenticated_user(&self, token: &OAuthToken) -> Result<TwitterUser>;
}

#[derive(Debug, Clone, Default)]
pub struct TwitterConfig {
    pub bearer_token: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

/// Twitter API v2 client.
pub struct TwitterApiClient {
    config: TwitterConfig,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    followers_count: u64,
}

impl From<ApiUser> for TwitterUser {
    fn from(user: ApiUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            name: user.name,
            description: user.description,
            followers_count: user.public_metrics.map(|m| m.followers_count).unwrap_or(0),
            verified: user.verified,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    data: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    text: String,
    author_id: String,
}

#[derive(Debug, Deserialize)]
struct TweetIncludes {
    #[serde(default)]
    users: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct TweetEnvelope {
    data: Option<ApiTweet>,
    includes: Option<TweetIncludes>,
}

impl TwitterApiClient {
    pub fn new(config: TwitterConfig) -> Self {
        Self {
            config,
            base_url: TWITTER_API_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn client_id(&self) -> Result<&str> {
        self.config
            .client_id
            .as_deref()
            .ok_or_else(|| anyhow!("TWITTER_CLIENT_ID is not configured"))
    }

    fn redirect_uri(&self) -> Result<&str> {
        self.config
            .redirect_uri
            .as_deref()
            .ok_or_else(|| anyhow!("TWITTER_REDIRECT_URI is not configured"))
    }
}

/// Stand-in profile returned when the user lookup is rate limited.
fn rate_limited_profile(username: &str) -> TwitterUser {
    TwitterUser {
        id: format!("rate_limited_{}", username.to_lowercase()),
        username: username.to_string(),
        name: username.to_string(),
        description: String::new(),
        followers_count: 0,
        verified: false,
    }
}

#[async_trait]
impl TwitterClient for TwitterApiClient {
    fn mode(&self) -> &str {
        "live"
    }

    async fn get_tweet(&self, tweet_id: &str) -> Result<Tweet> {
        let response = self
            .client
            .get(format!("{}/tweets/{}", self.base_url, tweet_id))
            .bearer_auth(&self.config.bearer_token)
            .query(&[
                ("expansions", "author_id"),
                ("user.fields", "username,description"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            anyhow::bail!("Twitter API error {}: {}", status, body);
        }

        let envelope: TweetEnvelope = response.json().await?;
        let tweet = envelope
            .data
            .ok_or_else(|| anyhow!("Tweet {} not found", tweet_id))?;
        let author_username = envelope
            .includes
            .and_then(|inc| inc.users.into_iter().find(|u| u.id == tweet.author_id))
            .map(|u| u.username);

        Ok(Tweet {
            id: tweet.id,
            text: tweet.text,
            author_id: tweet.author_id,
            author_username,
        })
    }

    async fn get_user_by_username(&self, username: &str) -> Result<TwitterUser> {
        let response = self
            .client
            .get(format!("{}/users/by/username/{}", self.base_url, username))
            .bearer_auth(&self.config.bearer_token)
            .query(&[("user.fields", "description,public_metrics,verified")])
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            log::warn!(
                "Twitter rate limit hit looking up @{}, substituting a placeholder profile",
                username
            );
            return Ok(rate_limited_profile(username));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            anyhow::bail!("Twitter API error {}: {}", status, body);
        }

        let envelope: UserEnvelope = response.json().await?;
        envelope
            .data
            .map(TwitterUser::from)
            .ok_or_else(|| anyhow!("Twitter user @{} not found", username))
    }

    fn authorize_url(&self, state: &str, code_challenge: &str) -> Result<String> {
        let url = url::Url::parse_with_params(
            TWITTER_AUTHORIZE_URL,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id()?),
                ("redirect_uri", self.redirect_uri()?),
                ("scope", OAUTH_SCOPES),
                ("state", state),
                ("code_challenge", code_challenge),
                ("code_challenge_method", "plain"),
            ],
        )?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<OAuthToken> {
        let client_id = self.client_id()?;
        let mut request = self
            .client
            .post(format!("{}/oauth2/token", self.base_url))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri()?),
                ("client_id", client_id),
                ("code_verifier", code_verifier),
            ]);
        if let Some(secret) = &self.config.client_secret {
            request = request.basic_auth(client_id, Some(secret));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            anyhow::bail!("Twitter token exchange error {}: {}", status, body);
        }

        Ok(response.json().await?)
    }

    async fn get_authenticated_user(&self, token: &OAuthToken) -> Result<TwitterUser> {
        let response = self
            .client
            .get(format!("{}/users/me", self.base_url))
            .bearer_auth(&token.access_token)
            .query(&[("user.fields", "description,public_metrics,verified")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            anyhow::bail!("Twitter API error {}: {}", status, body);
        }

        let envelope: UserEnvelope = response.json().await?;
        envelope
            .data
            .map(TwitterUser::from)
            .ok_or_else(|| anyhow!("Twitter returned no authenticated user"))
    }
}

/// In-memory Twitter used when no bearer token is configured and in tests.
///
/// Seeded tweets and users are served as-is. In permissive mode unknown
/// tweets and users are fabricated so the flows can be exercised locally.
pub struct MockTwitterClient {
    tweets: RwLock<HashMap<String, Tweet>>,
    users: RwLock<HashMap<String, TwitterUser>>,
    permissive: bool,
    callback_url: String,
}

impl MockTwitterClient {
    pub fn new() -> Self {
        Self {
            tweets: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            permissive: false,
            callback_url: "http://localhost:3001/api/verify-twitter/oauth/callback".to_string(),
        }
    }

    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Self::new()
        }
    }

    pub fn with_callback_url(mut self, callback_url: String) -> Self {
        self.callback_url = callback_url;
        self
    }

    pub async fn add_tweet(&self, tweet: Tweet) {
        self.tweets.write().await.insert(tweet.id.clone(), tweet);
    }

    pub async fn add_user(&self, user: TwitterUser) {
        self.users
            .write()
            .await
            .insert(user.username.to_lowercase(), user);
    }

    fn fabricated_user(username: &str) -> TwitterUser {
        TwitterUser {
            id: format!("mock_{}", username.to_lowercase()),
            username: username.to_string(),
            name: username.to_string(),
            description: String::new(),
            followers_count: 0,
            verified: false,
        }
    }
}

impl Default for MockTwitterClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TwitterClient for MockTwitterClient {
    fn mode(&self) -> &str {
        "mock"
    }

    async fn get_tweet(&self, tweet_id: &str) -> Result<Tweet> {
        if let Some(tweet) = self.tweets.read().await.get(tweet_id) {
            return Ok(tweet.clone());
        }
        if self.permissive {
            log::info!("[mock twitter] fabricating tweet {}", tweet_id);
            return Ok(Tweet {
                id: tweet_id.to_string(),
                text: "Verifying my wallet for the AI ETF #FlareVerified #AIETF".to_string(),
                author_id: "mock_author".to_string(),
                author_username: None,
            });
        }
        Err(anyhow!("Tweet {} not found", tweet_id))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<TwitterUser> {
        if let Some(user) = self.users.read().await.get(&username.to_lowercase()) {
            return Ok(user.clone());
        }
        if self.permissive {
            return Ok(Self::fabricated_user(username));
        }
        Err(anyhow!("Twitter user @{} not found", username))
    }

    fn authorize_url(&self, state: &str, _code_challenge: &str) -> Result<String> {
        let url = url::Url::parse_with_params(
            &self.callback_url,
            &[("code", format!("mock_code_{}", state).as_str()), ("state", state)],
        )?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str, _code_verifier: &str) -> Result<OAuthToken> {
        Ok(OAuthToken {
            access_token: format!("mock_token_{}", code),
            token_type: "bearer".to_string(),
            scope: Some(OAUTH_SCOPES.to_string()),
            expires_in: Some(7200),
        })
    }

    async fn get_authenticated_user(&self, _token: &OAuthToken) -> Result<TwitterUser> {
        let users = self.users.read().await;
        match users.values().next() {
            Some(user) => Ok(user.clone()),
            None => Ok(Self::fabricated_user("mock_user")),
        }
    }
}
