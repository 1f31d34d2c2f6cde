use regex::Regex;
use std::sync::OnceLock;

pub const REQUIRED_HASHTAGS: [&str; 2] = ["#FlareVerified", "#AIETF"];
pub const BIO_CODE_LENGTH: usize = 8;

fn wallet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("wallet pattern is valid"))
}

fn handle_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^@?[A-Za-z0-9_]{1,15}$").expect("handle pattern is valid"))
}

fn tweet_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,20}$").expect("tweet id pattern is valid"))
}

pub fn is_valid_wallet_address(address: &str) -> bool {
    wallet_regex().is_match(address)
}

pub fn is_valid_twitter_handle(handle: &str) -> bool {
    handle_regex().is_match(handle)
}

pub fn is_valid_tweet_id(tweet_id: &str) -> bool {
    tweet_id_regex().is_match(tweet_id)
}

/// Strips a leading `@`.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_string()
}

pub fn has_required_hashtags(text: &str) -> bool {
    let lowered = text.to_lowercase();
    REQUIRED_HASHTAGS
        .iter()
        .all(|tag| lowered.contains(&tag.to_lowercase()))
}

pub fn generate_bio_code() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(BIO_CODE_LENGTH)
        .collect()
}

pub fn bio_contains_code(bio: &str, code: &str) -> bool {
    !code.is_empty() && bio.to_lowercase().contains(&code.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_address_validation() {
        assert!(is_valid_wallet_address(
            "0x52908400098527886E0F7030069857D2E4169EE7"
        ));
        assert!(is_valid_wallet_address(
            "0xde709f2102306220921060314715629080e2fb77"
        ));
        // 39 and 41 hex characters
        assert!(!is_valid_wallet_address(
            "0x52908400098527886E0F7030069857D2E4169EE"
        ));
        assert!(!is_valid_wallet_address(
            "0x52908400098527886E0F7030069857D2E4169EE77"
        ));
        assert!(!is_valid_wallet_address(
            "0xZZ908400098527886E0F7030069857D2E4169EE7"
        ));
        assert!(!is_valid_wallet_address("52908400098527886E0F7030069857D2E4169EE7"));
        assert!(!is_valid_wallet_address("0xBADADDRESS"));
    }

    #[test]
    fn test_handle_validation() {
        assert!(is_valid_twitter_handle("flare_etf"));
        assert!(is_valid_twitter_handle("@flare_etf"));
        assert!(!is_valid_twitter_handle("this_handle_is_too_long"));
        assert!(!is_valid_twitter_handle("bad-handle"));
        assert!(!is_valid_twitter_handle(""));
        assert_eq!(normalize_handle(" @alice "), "alice");
    }

    #[test]
    fn test_tweet_id_validation() {
        assert!(is_valid_tweet_id("1790000000000000000"));
        assert!(!is_valid_tweet_id("12a"));
        assert!(!is_valid_tweet_id(""));
    }

    #[test]
    fn test_hashtags() {
        assert!(has_required_hashtags("Joining #FlareVerified #AIETF 0xabc"));
        assert!(has_required_hashtags("#flareverified and #aietf"));
        assert!(!has_required_hashtags("Only #AIETF here"));
    }

    #[test]
    fn test_bio_code() {
        let code = generate_bio_code();
        assert_eq!(code.len(), BIO_CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(code, code.to_uppercase());

        assert!(bio_contains_code("builder | verify: ab12cd34 | gm", "AB12CD34"));
        assert!(!bio_contains_code("builder | gm", "AB12CD34"));
        assert!(!bio_contains_code("anything", ""));
    }
}
