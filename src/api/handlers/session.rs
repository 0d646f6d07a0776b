//! Session endpoints for cookie and bearer auth.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{clear_session_cookie, extract_session_token};
use crate::session::SessionTokens;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Profile {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Session is valid", body = Profile),
        (status = 401, description = "Missing, invalid or expired session", body = String)
    ),
    tag = "session"
)]
pub async fn profile(
    headers: HeaderMap,
    sessions: Extension<Arc<SessionTokens>>,
) -> impl IntoResponse {
    // Missing and rejected tokens look the same to the client.
    let Some(token) = extract_session_token(&headers) else {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    };

    match sessions.verify(&token) {
        Ok(claims) => (
            StatusCode::OK,
            Json(Profile {
                email: claims.email,
                expires_at: claims.expires_at,
            }),
        )
            .into_response(),
        Err(_) => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 204, description = "Session cookie cleared")
    ),
    tag = "session"
)]
// Sessions are stateless, so logging out only clears the client cookie.
pub async fn logout() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_session_cookie());
    (StatusCode::NO_CONTENT, headers)
}
