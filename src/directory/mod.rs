//! HTTP client for the Directus directory.
//!
//! Every method performs exactly one request. Nothing is retried or cached; callers
//! decide what a failure means.

pub mod types;

pub use self::types::{PendingRegistration, RecordId, StoredPending};

use self::types::{
    AuthResponse, CreatedRecord, ItemResponse, ListResponse, LoginRequest, NewUser, PendingRow,
    parse_timestamp,
};
use crate::{APP_USER_AGENT, cli::globals::GlobalArgs};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, instrument};
use url::Url;

/// Collection holding registrations that still await email verification.
pub const TEMP_USERS: &str = "temp_users";

const EMAIL_FILTER: &str = "filter[email][_eq]";
const TOKEN_FILTER: &str = "filter[verification_token][_eq]";

/// Where a record lives: the built-in users endpoint or a custom item collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection<'a> {
    Users,
    Items(&'a str),
}

impl Collection<'static> {
    pub const PENDING: Self = Collection::Items(TEMP_USERS);
}

impl Collection<'_> {
    fn path(&self) -> String {
        match self {
            Self::Users => "/users".to_string(),
            Self::Items(name) => format!("/items/{name}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory rejected the request with status {status}: {body}")]
    UpstreamRejected { status: StatusCode, body: String },
    #[error("directory request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode directory response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid directory response: {0}")]
    InvalidResponse(String),
    #[error("invalid directory URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Clone)]
pub struct DirectoryClient {
    http: Client,
    base_url: String,
    admin_token: SecretString,
}

impl std::fmt::Debug for DirectoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryClient")
            .field("base_url", &self.base_url)
            .field("admin_token", &"***")
            .finish_non_exhaustive()
    }
}

impl DirectoryClient {
    /// Build a client from the process settings.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(globals: &GlobalArgs) -> Result<Self, DirectoryError> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(globals.directory_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: globals.directory_url.clone(),
            admin_token: globals.directory_admin_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, DirectoryError> {
        Ok(Url::parse(&format!("{}{path}", self.base_url))?)
    }

    /// Log in against the directory and return its access token.
    ///
    /// Only `200 OK` counts as success; every other status is reported as
    /// `UpstreamRejected` with the raw body.
    ///
    /// # Errors
    /// Returns `UpstreamRejected`, `Transport` or `Decode`.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<String, DirectoryError> {
        let url = self.endpoint("/auth/login")?;

        let response = self
            .http
            .post(url)
            .json(&LoginRequest {
                email,
                password: password.expose_secret(),
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            debug!("Directory login rejected: {}", status);
            return Err(DirectoryError::UpstreamRejected { status, body });
        }

        let auth: AuthResponse = serde_json::from_str(&body)?;

        Ok(auth.data.access_token)
    }

    /// Check whether any record in `collection` has this email.
    ///
    /// A failed lookup is an error, never `false`.
    ///
    /// # Errors
    /// Returns `UpstreamRejected`, `Transport` or `Decode`.
    #[instrument(skip(self))]
    pub async fn email_exists_in(
        &self,
        email: &str,
        collection: Collection<'_>,
    ) -> Result<bool, DirectoryError> {
        let mut url = self.endpoint(&collection.path())?;
        url.query_pairs_mut()
            .append_pair(EMAIL_FILTER, email)
            .append_pair("limit", "1");

        let response = self
            .http
            .get(url)
            .bearer_auth(self.admin_token.expose_secret())
            .send()
            .await?;

        let found: ListResponse<Value> = decode_success(response).await?;

        Ok(!found.data.is_empty())
    }

    /// Store a pending registration in `temp_users`.
    ///
    /// # Errors
    /// Returns `UpstreamRejected` on a non-2xx answer, or `Transport`.
    #[instrument(skip(self, pending), fields(email = %pending.email))]
    pub async fn create_pending_user(
        &self,
        pending: &PendingRegistration,
    ) -> Result<(), DirectoryError> {
        let url = self.endpoint(&Collection::PENDING.path())?;

        let response = self
            .http
            .post(url)
            .bearer_auth(self.admin_token.expose_secret())
            .json(&pending.to_wire())
            .send()
            .await?;

        ensure_success(response).await.map(|_| ())
    }

    /// Create a verified directory user and return its id.
    ///
    /// # Errors
    /// Returns `UpstreamRejected`, `Transport` or `Decode`.
    #[instrument(skip(self, password))]
    pub async fn create_verified_user(
        &self,
        email: &str,
        password: &SecretString,
        role: Option<&str>,
    ) -> Result<RecordId, DirectoryError> {
        let url = self.endpoint(&Collection::Users.path())?;

        let response = self
            .http
            .post(url)
            .bearer_auth(self.admin_token.expose_secret())
            .json(&NewUser {
                email,
                password: password.expose_secret(),
                role,
            })
            .send()
            .await?;

        let created: ItemResponse<CreatedRecord> = decode_success(response).await?;

        Ok(created.data.id)
    }

    /// Look up a pending registration by its verification token.
    ///
    /// # Errors
    /// Returns `UpstreamRejected`, `Transport`, `Decode`, or `InvalidResponse` when the
    /// stored expiration date cannot be parsed.
    #[instrument(skip_all)]
    pub async fn find_pending_by_token(
        &self,
        verification_token: &str,
    ) -> Result<Option<StoredPending>, DirectoryError> {
        let mut url = self.endpoint(&Collection::PENDING.path())?;
        url.query_pairs_mut()
            .append_pair(TOKEN_FILTER, verification_token)
            .append_pair("limit", "1");

        let response = self
            .http
            .get(url)
            .bearer_auth(self.admin_token.expose_secret())
            .send()
            .await?;

        let rows: ListResponse<PendingRow> = decode_success(response).await?;

        let Some(row) = rows
            .data
            .into_iter()
            .find(|row| row.verification_token == verification_token)
        else {
            return Ok(None);
        };

        let expiration_date = parse_timestamp(&row.expiration_date).ok_or_else(|| {
            DirectoryError::InvalidResponse(format!(
                "unparseable expiration_date: {}",
                row.expiration_date
            ))
        })?;

        Ok(Some(StoredPending {
            id: row.id,
            registration: PendingRegistration {
                email: row.email,
                password: SecretString::from(row.password),
                verification_token: row.verification_token,
                expiration_date,
            },
        }))
    }

    /// Remove a pending registration.
    ///
    /// # Errors
    /// Returns `UpstreamRejected` on a non-2xx answer, or `Transport`.
    #[instrument(skip(self))]
    pub async fn delete_pending_user(&self, id: &RecordId) -> Result<(), DirectoryError> {
        let url = self.endpoint(&format!("{}/{id}", Collection::PENDING.path()))?;

        let response = self
            .http
            .delete(url)
            .bearer_auth(self.admin_token.expose_secret())
            .send()
            .await?;

        ensure_success(response).await.map(|_| ())
    }

    /// Reachability probe used by the health endpoint.
    ///
    /// # Errors
    /// Returns `UpstreamRejected` on a non-2xx answer, or `Transport`.
    pub async fn ping(&self) -> Result<(), DirectoryError> {
        let url = self.endpoint("/server/ping")?;

        let response = self.http.get(url).send().await?;

        ensure_success(response).await.map(|_| ())
    }
}

async fn ensure_success(response: Response) -> Result<String, DirectoryError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        error!("Directory request failed: {}", status);
        return Err(DirectoryError::UpstreamRejected { status, body });
    }

    Ok(body)
}

async fn decode_success<T: DeserializeOwned>(response: Response) -> Result<T, DirectoryError> {
    let body = ensure_success(response).await?;
    Ok(serde_json::from_str(&body)?)
}
