//! Two-phase registration: pending record first, verified user on confirmation.

use crate::directory::{
    Collection, DirectoryClient, DirectoryError, PendingRegistration, RecordId,
};
use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use secrecy::SecretString;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

pub const PENDING_TTL_HOURS: i64 = 24;

/// Raw bytes of entropy in a verification token; hex doubles the length.
const VERIFICATION_TOKEN_BYTES: usize = 16;

/// Which collection already holds the email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateIdentity {
    Verified,
    Pending,
}

impl DuplicateIdentity {
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Verified => "already exists, please log in.",
            Self::Pending => "awaiting verification.",
        }
    }
}

impl fmt::Display for DuplicateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("user {0}")]
    Duplicate(DuplicateIdentity),
    #[error("invalid verification token")]
    InvalidVerificationToken,
    #[error("verification token expired")]
    VerificationExpired,
    #[error("failed to generate verification token: {0}")]
    TokenGeneration(#[from] rand::Error),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

#[derive(Debug, Clone)]
pub struct Registration {
    directory: DirectoryClient,
    verified_user_role: Option<String>,
}

impl Registration {
    #[must_use]
    pub fn new(directory: DirectoryClient) -> Self {
        Self {
            directory,
            verified_user_role: None,
        }
    }

    /// Role assigned to users created on confirmation; the directory default applies when unset.
    #[must_use]
    pub fn with_verified_user_role(mut self, role: Option<String>) -> Self {
        self.verified_user_role = role;
        self
    }

    /// Register an email as a pending user.
    ///
    /// Verified users are checked before pending ones and the first match stops the
    /// flow. On success the stored record is returned so the caller can send the
    /// verification token out of band.
    ///
    /// # Errors
    /// Returns `Duplicate` when the email is taken, `Directory` when a check or the
    /// write fails, and `TokenGeneration` if the OS random source fails.
    pub async fn register(
        &self,
        email: &str,
        password: SecretString,
    ) -> Result<PendingRegistration, RegistrationError> {
        self.register_at(email, password, Utc::now()).await
    }

    #[instrument(skip(self, password, now))]
    async fn register_at(
        &self,
        email: &str,
        password: SecretString,
        now: DateTime<Utc>,
    ) -> Result<PendingRegistration, RegistrationError> {
        if self
            .directory
            .email_exists_in(email, Collection::Users)
            .await?
        {
            debug!("Email already belongs to a verified user");
            return Err(RegistrationError::Duplicate(DuplicateIdentity::Verified));
        }

        if self
            .directory
            .email_exists_in(email, Collection::PENDING)
            .await?
        {
            debug!("Email already has a pending registration");
            return Err(RegistrationError::Duplicate(DuplicateIdentity::Pending));
        }

        let pending = PendingRegistration {
            email: email.to_string(),
            password,
            verification_token: generate_verification_token()?,
            expiration_date: now + Duration::hours(PENDING_TTL_HOURS),
        };

        self.directory.create_pending_user(&pending).await?;

        info!(expires = %pending.expiration_date, "Pending registration created");

        Ok(pending)
    }

    /// Promote the pending registration owning `verification_token` to a verified user.
    ///
    /// # Errors
    /// Returns `InvalidVerificationToken` if no pending record matches,
    /// `VerificationExpired` once its expiration date has passed, `Duplicate` if the
    /// email was verified in the meantime, and `Directory` for directory failures
    /// before the verified user exists.
    ///
    /// An expired record is deleted so the email can register again. Once the
    /// verified user is created, removing the pending record is best effort: a
    /// failed delete is logged and the new user id is still returned.
    pub async fn confirm(&self, verification_token: &str) -> Result<RecordId, RegistrationError> {
        self.confirm_at(verification_token, Utc::now()).await
    }

    #[instrument(skip_all)]
    async fn confirm_at(
        &self,
        verification_token: &str,
        now: DateTime<Utc>,
    ) -> Result<RecordId, RegistrationError> {
        let stored = self
            .directory
            .find_pending_by_token(verification_token)
            .await?
            .ok_or(RegistrationError::InvalidVerificationToken)?;

        let pending = stored.registration;
        if now >= pending.expiration_date {
            debug!("Pending registration expired at {}", pending.expiration_date);
            self.discard_pending(&stored.id).await;
            return Err(RegistrationError::VerificationExpired);
        }

        if self
            .directory
            .email_exists_in(&pending.email, Collection::Users)
            .await?
        {
            return Err(RegistrationError::Duplicate(DuplicateIdentity::Verified));
        }

        let id = self
            .directory
            .create_verified_user(
                &pending.email,
                &pending.password,
                self.verified_user_role.as_deref(),
            )
            .await?;

        self.discard_pending(&stored.id).await;

        info!(user_id = %id, "Registration verified");

        Ok(id)
    }

    async fn discard_pending(&self, id: &RecordId) {
        if let Err(e) = self.directory.delete_pending_user(id).await {
            error!(pending_id = %id, "Failed to delete pending registration: {e}");
        }
    }
}

/// Hex-encoded token from the OS CSPRNG.
///
/// # Errors
/// Returns an error if the OS random source is unavailable.
pub fn generate_verification_token() -> Result<String, rand::Error> {
    let mut bytes = [0u8; VERIFICATION_TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}
