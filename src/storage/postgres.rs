use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::storage::traits::{wallet_key, VerificationStore};
use crate::types::{BioChallenge, OAuthSession, VerificationMethod, VerificationRecord};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("../../migrations/V001__verification_schema.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn record_from_row(row: &PgRow) -> Result<VerificationRecord> {
        let method: String = row.get("method");
        Ok(VerificationRecord {
            wallet_address: row.get("wallet_address"),
            twitter_handle: row.get("twitter_handle"),
            twitter_user_id: row.get("twitter_user_id"),
            method: VerificationMethod::parse(&method)
                .ok_or_else(|| anyhow!("unknown verification method '{}'", method))?,
            tweet_id: row.get("tweet_id"),
            attestation: serde_json::from_value(row.get("attestation"))?,
            verified_at: row.get("verified_at"),
        })
    }
}

#[async_trait]
impl VerificationStore for PostgresStore {
    async fn get_verification(&self, wallet_address: &str) -> Result<Option<VerificationRecord>> {
        let row = sqlx::query(
            r#"
            SELECT wallet_address, twitter_handle, twitter_user_id, method, tweet_id,
                   attestation, verified_at
            FROM twitter_verifications
            WHERE wallet_address = $1
            "#,
        )
        .bind(wallet_key(wallet_address))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn insert_verification(&self, record: &VerificationRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO twitter_verifications
                (wallet_address, twitter_handle, twitter_user_id, method, tweet_id, attestation, verified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (wallet_address) DO NOTHING
            "#,
        )
        .bind(wallet_key(&record.wallet_address))
        .bind(&record.twitter_handle)
        .bind(&record.twitter_user_id)
        .bind(record.method.as_str())
        .bind(&record.tweet_id)
        .bind(serde_json::to_value(&record.attestation)?)
        .bind(record.verified_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn save_oauth_session(&self, session: &OAuthSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO oauth_sessions (state, wallet_address, code_verifier, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (state) DO UPDATE SET
                wallet_address = EXCLUDED.wallet_address,
                code_verifier = EXCLUDED.code_verifier,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&session.state)
        .bind(wallet_key(&session.wallet_address))
        .bind(&session.code_verifier)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn take_oauth_session(&self, state: &str) -> Result<Option<OAuthSession>> {
        let row = sqlx::query(
            r#"
            DELETE FROM oauth_sessions
            WHERE state = $1 AND expires_at > NOW()
            RETURNING state, wallet_address, code_verifier, created_at, expires_at
            "#,
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| OAuthSession {
            state: r.get("state"),
            wallet_address: r.get("wallet_address"),
            code_verifier: r.get("code_verifier"),
            created_at: r.get("created_at"),
            expires_at: r.get("expires_at"),
        }))
    }

    async fn save_bio_challenge(&self, challenge: &BioChallenge) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bio_challenges (wallet_address, twitter_handle, code, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (wallet_address) DO UPDATE SET
                twitter_handle = EXCLUDED.twitter_handle,
                code = EXCLUDED.code,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(wallet_key(&challenge.wallet_address))
        .bind(&challenge.twitter_handle)
        .bind(&challenge.code)
        .bind(challenge.created_at)
        .bind(challenge.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_bio_challenge(&self, wallet_address: &str) -> Result<Option<BioChallenge>> {
        let row = sqlx::query(
            r#"
            SELECT wallet_address, twitter_handle, code, created_at, expires_at
            FROM bio_challenges
            WHERE wallet_address = $1 AND expires_at > NOW()
            "#,
        )
        .bind(wallet_key(wallet_address))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| BioChallenge {
            wallet_address: r.get("wallet_address"),
            twitter_handle: r.get("twitter_handle"),
            code: r.get("code"),
            created_at: r.get("created_at"),
            expires_at: r.get("expires_at"),
        }))
    }

    async fn remove_bio_challenge(&self, wallet_address: &str) -> Result<()> {
        sqlx::query("DELETE FROM bio_challenges WHERE wallet_address = $1")
            .bind(wallet_key(wallet_address))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let sessions = sqlx::query("DELETE FROM oauth_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?
            .rows_affected();
        let challenges = sqlx::query("DELETE FROM bio_challenges WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok((sessions + challenges) as usize)
    }
}
