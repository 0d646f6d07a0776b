//! Stateless session tokens.
//!
//! A session is an HS256-signed JWT carrying the user's email and an expiry one hour
//! after issue. There is no server-side store and no revocation; a token is good
//! until it expires.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

pub const SESSION_TTL_SECONDS: i64 = 3600;
pub const SESSION_COOKIE_NAME: &str = "session_token";

#[derive(Debug, Error)]
pub enum SessionError {
    /// Bad signature, malformed token and expiry are deliberately indistinguishable.
    #[error("invalid or expired session")]
    Invalid,
    #[error("missing required configuration: {0}")]
    ConfigurationMissing(&'static str),
    #[error("failed to sign session token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    email: String,
    iat: i64,
    exp: i64,
}

#[derive(Clone)]
pub struct SessionTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens").finish_non_exhaustive()
    }
}

impl SessionTokens {
    /// Build an issuer/verifier from the signing secret.
    ///
    /// # Errors
    /// Returns `SessionError::ConfigurationMissing` if the secret is empty.
    pub fn new(secret: &SecretString) -> Result<Self, SessionError> {
        let secret = secret.expose_secret().as_bytes();
        if secret.is_empty() {
            return Err(SessionError::ConfigurationMissing("session secret"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against our own clock in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Issue a session token for an authenticated email.
    ///
    /// # Errors
    /// Returns `SessionError::Signing` if the token cannot be encoded.
    pub fn issue(&self, email: &str) -> Result<String, SessionError> {
        self.issue_at(email, Utc::now())
    }

    #[instrument(skip(self))]
    fn issue_at(&self, email: &str, issued_at: DateTime<Utc>) -> Result<String, SessionError> {
        let iat = issued_at.timestamp();
        let claims = TokenClaims {
            email: email.to_string(),
            iat,
            exp: iat + SESSION_TTL_SECONDS,
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }

    /// Verify a session token and return its claims.
    ///
    /// # Errors
    /// Returns `SessionError::Invalid` for any signature, structure or expiry failure.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        self.verify_at(token, Utc::now())
    }

    #[instrument(skip_all)]
    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, SessionError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!("Session token rejected: {e}");
            SessionError::Invalid
        })?;

        let claims = data.claims;
        if now.timestamp() >= claims.exp {
            debug!("Session token expired");
            return Err(SessionError::Invalid);
        }

        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(SessionError::Invalid)?;

        Ok(SessionClaims {
            email: claims.email,
            expires_at,
        })
    }
}
