use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::server::AppState;
use crate::types::VerificationRecord;
use crate::verification::{BioInitiation, OAuthInitiation, VerificationStatus};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTweetRequest {
    #[serde(default)]
    pub wallet_address: String,
    #[serde(default)]
    pub twitter_handle: String,
    #[serde(default)]
    pub tweet_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRequest {
    #[serde(default)]
    pub wallet_address: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BioInitiateRequest {
    #[serde(default)]
    pub wallet_address: String,
    #[serde(default)]
    pub twitter_handle: String,
}

#[derive(Deserialize)]
pub struct OAuthCallbackQuery {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
    pub error: Option<String>,
}

pub async fn status(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
) -> Result<Json<VerificationStatus>, ApiError> {
    Ok(Json(state.verification.status(&wallet_address).await?))
}

pub async fn verify_tweet(
    State(state): State<AppState>,
    payload: Result<Json<VerifyTweetRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = payload.map_err(ApiError::invalid_body)?;
    let record = state
        .verification
        .verify_tweet(
            &request.wallet_address,
            &request.twitter_handle,
            &request.tweet_id,
        )
        .await?;
    Ok(Json(verified_body(&record)))
}

pub async fn oauth_initiate(
    State(state): State<AppState>,
    payload: Result<Json<WalletRequest>, JsonRejection>,
) -> Result<Json<OAuthInitiation>, ApiError> {
    let Json(request) = payload.map_err(ApiError::invalid_body)?;
    Ok(Json(
        state
            .verification
            .oauth_initiate(&request.wallet_address)
            .await?,
    ))
}

pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Response {
    let outcome = match query.error {
        Some(error) => Err(format!("Twitter authorization was denied: {}", error)),
        None => state
            .verification
            .oauth_callback(&query.code, &query.state)
            .await
            .map_err(|e| e.to_string()),
    };

    if let Some(frontend) = &state.config.frontend_url {
        let target = match &outcome {
            Ok(record) => url::Url::parse_with_params(
                frontend,
                &[
                    ("verified", "true"),
                    ("handle", record.twitter_handle.as_str()),
                ],
            ),
            Err(message) => url::Url::parse_with_params(
                frontend,
                &[("verified", "false"), ("error", message.as_str())],
            ),
        };
        match target {
            Ok(url) => return Redirect::to(url.as_str()).into_response(),
            Err(e) => log::warn!("FRONTEND_URL {} is not a valid URL: {}", frontend, e),
        }
    }

    Html(callback_page(&outcome)).into_response()
}

pub async fn bio_initiate(
    State(state): State<AppState>,
    payload: Result<Json<BioInitiateRequest>, JsonRejection>,
) -> Result<Json<BioInitiation>, ApiError> {
    let Json(request) = payload.map_err(ApiError::invalid_body)?;
    Ok(Json(
        state
            .verification
            .bio_initiate(&request.wallet_address, &request.twitter_handle)
            .await?,
    ))
}

pub async fn bio_complete(
    State(state): State<AppState>,
    payload: Result<Json<WalletRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = payload.map_err(ApiError::invalid_body)?;
    let record = state
        .verification
        .bio_complete(&request.wallet_address)
        .await?;
    Ok(Json(verified_body(&record)))
}

fn verified_body(record: &VerificationRecord) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "verified": true,
        "walletAddress": record.wallet_address,
        "twitterHandle": record.twitter_handle,
        "attestationId": record.attestation.attestation_id,
        "verification": record,
    })
}

fn callback_page(outcome: &Result<VerificationRecord, String>) -> String {
    let (title, detail) = match outcome {
        Ok(record) => (
            "Verification complete",
            format!(
                "Wallet {} is now linked to @{}. You can close this window.",
                html_escape::encode_text(&record.wallet_address),
                html_escape::encode_text(&record.twitter_handle)
            ),
        ),
        Err(message) => (
            "Verification failed",
            html_escape::encode_text(message).into_owned(),
        ),
    };
    format!(
        "<!DOCTYPE html><html><head><title>{title}</title></head>\
         <body><h1>{title}</h1><p>{detail}</p></body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_page_escapes_errors() {
        let page = callback_page(&Err("<script>alert(1)</script>".to_string()));
        assert!(page.contains("Verification failed"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }
}
