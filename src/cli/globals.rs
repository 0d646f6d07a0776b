use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_DIRECTORY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),
    #[error("invalid directory URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Process-wide settings, read-only once the server starts.
#[derive(Clone)]
pub struct GlobalArgs {
    pub directory_url: String,
    pub directory_admin_token: SecretString,
    pub directory_timeout: Duration,
    pub session_secret: SecretString,
    pub verified_user_role: Option<String>,
}

impl GlobalArgs {
    /// Validate and assemble the settings shared by every request.
    ///
    /// # Errors
    /// Returns `ConfigError::Missing` for an empty URL, admin token or session secret, and
    /// `ConfigError::InvalidUrl` when the directory URL is not an absolute http(s) URL.
    pub fn new(
        directory_url: &str,
        directory_admin_token: SecretString,
        session_secret: SecretString,
    ) -> Result<Self, ConfigError> {
        let directory_url = directory_url.trim();
        if directory_url.is_empty() {
            return Err(ConfigError::Missing("directory URL"));
        }

        let parsed = Url::parse(directory_url).map_err(|e| ConfigError::InvalidUrl {
            url: directory_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: directory_url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        if directory_admin_token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Missing("directory admin token"));
        }

        if session_secret.expose_secret().is_empty() {
            return Err(ConfigError::Missing("session secret"));
        }

        Ok(Self {
            directory_url: directory_url.trim_end_matches('/').to_string(),
            directory_admin_token,
            directory_timeout: DEFAULT_DIRECTORY_TIMEOUT,
            session_secret,
            verified_user_role: None,
        })
    }

    #[must_use]
    pub fn with_directory_timeout(mut self, timeout: Duration) -> Self {
        self.directory_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_verified_user_role(mut self, role: Option<String>) -> Self {
        self.verified_user_role = role;
        self
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("directory_url", &self.directory_url)
            .field("directory_admin_token", &"***")
            .field("directory_timeout", &self.directory_timeout)
            .field("session_secret", &"***")
            .field("verified_user_role", &self.verified_user_role)
            .finish()
    }
}
