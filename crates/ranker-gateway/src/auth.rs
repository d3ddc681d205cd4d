//! Identity token verification and issuance.
//!
//! Access credentials are HS256 JWTs scoping one participant to exactly one
//! poll. Expiry is connection-level: an expired token rejects the initial
//! subscribe, but an already-subscribed connection is not evicted
//! mid-session.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use ranker_engine::ErrorKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Token verification/issuance failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("token creation failed")]
    TokenCreation,
}

impl AuthError {
    /// All auth failures surface as `unauthenticated` to clients.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Unauthenticated
    }
}

/// JWT claim set carried by every access credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Participant id.
    pub sub: String,
    /// Display name chosen at join time.
    pub name: String,
    /// The single poll this credential is scoped to.
    pub poll_id: String,
    /// Expiry, seconds since the epoch.
    pub exp: usize,
}

/// Verified participant identity extracted from a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authed {
    pub participant_id: String,
    pub display_name: String,
    pub poll_id: String,
    /// Expiry, seconds since the epoch.
    pub expires_at: usize,
}

/// Stateless verifier/issuer around a shared HS256 secret.
pub struct TokenVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenVerifier {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Mint a credential scoping `participant_id` to `poll_id`.
    pub fn issue(
        &self,
        poll_id: &str,
        participant_id: &str,
        display_name: &str,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: participant_id.to_string(),
            name: display_name.to_string(),
            poll_id: poll_id.to_string(),
            exp: (chrono::Utc::now().timestamp() as u64 + self.ttl.as_secs()) as usize,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|_| AuthError::TokenCreation)
    }

    /// Validate an opaque bearer string and extract the identity it carries.
    pub fn verify(&self, token: &str) -> Result<Authed, AuthError> {
        self.decode_with(token, &Validation::default())
    }

    /// Like [`verify`](Self::verify), but accept an expired token.
    ///
    /// The signature must still check out. Used by the credential-refresh
    /// boundary, where a lapsed token proves a prior enrollment rather than
    /// granting access itself.
    pub fn verify_allow_expired(&self, token: &str) -> Result<Authed, AuthError> {
        let mut validation = Validation::default();
        validation.validate_exp = false;
        self.decode_with(token, &validation)
    }

    fn decode_with(&self, token: &str, validation: &Validation) -> Result<Authed, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            }
        })?;
        let claims = data.claims;
        Ok(Authed {
            participant_id: claims.sub,
            display_name: claims.name,
            poll_id: claims.poll_id,
            expires_at: claims.exp,
        })
    }
}
