//! Wire shapes exchanged with the directory and the records built from them.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directus primary keys are integers or UUID strings depending on the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// An unverified registration stored in the `temp_users` collection.
#[derive(Debug, Clone)]
pub struct PendingRegistration {
    pub email: String,
    pub password: SecretString,
    pub verification_token: String,
    pub expiration_date: DateTime<Utc>,
}

impl PendingRegistration {
    pub(crate) fn to_wire(&self) -> NewPendingUser<'_> {
        NewPendingUser {
            email: &self.email,
            password: self.password.expose_secret(),
            verification_token: &self.verification_token,
            expiration_date: self
                .expiration_date
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// A pending registration as read back from the directory.
#[derive(Debug, Clone)]
pub struct StoredPending {
    pub id: RecordId,
    pub registration: PendingRegistration,
}

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct AuthResponse {
    pub data: AuthData,
}

#[derive(Deserialize)]
pub(crate) struct AuthData {
    pub access_token: String,
}

#[derive(Deserialize)]
pub(crate) struct ListResponse<T> {
    pub data: Vec<T>,
}

#[derive(Deserialize)]
pub(crate) struct ItemResponse<T> {
    pub data: T,
}

#[derive(Deserialize)]
pub(crate) struct CreatedRecord {
    pub id: RecordId,
}

#[derive(Serialize)]
pub(crate) struct NewPendingUser<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub verification_token: &'a str,
    pub expiration_date: String,
}

#[derive(Serialize)]
pub(crate) struct NewUser<'a> {
    pub email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'a str>,
}

#[derive(Deserialize)]
pub(crate) struct PendingRow {
    pub id: RecordId,
    pub email: String,
    pub password: String,
    pub verification_token: String,
    pub expiration_date: String,
}

/// Parse a directory timestamp.
///
/// `timestamp` fields come back as RFC 3339; `dateTime` fields carry no offset and are
/// stored in UTC.
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
