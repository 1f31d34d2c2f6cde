use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMethod {
    Tweet,
    OAuth,
    Bio,
}

impl VerificationMethod {
    pub fn as_str(&self) -> &str {
        match self {
            VerificationMethod::Tweet => "tweet",
            VerificationMethod::OAuth => "oauth",
            VerificationMethod::Bio => "bio",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tweet" => Some(VerificationMethod::Tweet),
            "oauth" => Some(VerificationMethod::OAuth),
            "bio" => Some(VerificationMethod::Bio),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationReceipt {
    pub attestation_id: String,
    pub status: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_id: Option<u64>,
    pub submitted_at: DateTime<Utc>,
}

/// A wallet address proven to belong to a Twitter account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    /// Lower-cased
    pub wallet_address: String,
    pub twitter_handle: String,
    pub twitter_user_id: String,
    pub method: VerificationMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tweet_id: Option<String>,
    pub attestation: AttestationReceipt,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthSession {
    pub state: String,
    pub wallet_address: String,
    pub code_verifier: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BioChallenge {
    pub wallet_address: String,
    pub twitter_handle: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub trait Expiring {
    fn expires_at(&self) -> DateTime<Utc>;

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() <= now
    }
}

impl Expiring for OAuthSession {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl Expiring for BioChallenge {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_method_round_trip_names() {
        for method in [
            VerificationMethod::Tweet,
            VerificationMethod::OAuth,
            VerificationMethod::Bio,
        ] {
            assert_eq!(VerificationMethod::parse(method.as_str()), Some(method));
            assert_eq!(serde_json::to_value(method).unwrap(), method.as_str());
        }
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let challenge = BioChallenge {
            wallet_address: "0xabc".to_string(),
            twitter_handle: "alice".to_string(),
            code: "ABCD1234".to_string(),
            created_at: now,
            expires_at: now + Duration::minutes(30),
        };
        assert!(!challenge.is_expired(now));
        assert!(challenge.is_expired(now + Duration::minutes(31)));
    }
}
