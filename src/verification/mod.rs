pub mod attestation;
pub mod service;
pub mod twitter;
pub mod validation;

pub use attestation::{
    AttestationRequest, AttestationService, FlareAttestationClient, MockAttestationService,
};
pub use service::{
    BioInitiation, OAuthInitiation, VerificationConfig, VerificationError, VerificationService,
    VerificationStatus,
};
pub use twitter::{MockTwitterClient, TwitterApiClient, TwitterClient, TwitterConfig};
