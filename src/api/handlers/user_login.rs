use crate::{
    api::handlers::{normalize_email, session_cookie, valid_email},
    directory::{DirectoryClient, DirectoryError},
    session::SessionTokens,
};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
pub struct UserLogin {
    email: String,
    password: String,
}

impl std::fmt::Debug for UserLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserLogin")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[utoipa::path(
    post,
    path= "/login",
    request_body = UserLogin,
    responses (
        (status = 200, description = "Login successful, session cookie set", body = String),
        (status = 400, description = "Missing payload or invalid email", body = String),
        (status = 401, description = "Login failed", body = String),
        (status = 502, description = "Directory unavailable", body = String),
    ),
    tag= "login"
)]
#[instrument(skip(directory, sessions))]
pub async fn login(
    directory: Extension<Arc<DirectoryClient>>,
    sessions: Extension<Arc<SessionTokens>>,
    payload: Option<Json<UserLogin>>,
) -> impl IntoResponse {
    let user: UserLogin = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                HeaderMap::new(),
                "Missing payload".to_string(),
            );
        }
    };

    let email = normalize_email(&user.email);

    if !valid_email(&email) {
        error!("Invalid email");

        return (
            StatusCode::BAD_REQUEST,
            HeaderMap::new(),
            "Invalid email".to_string(),
        );
    }

    let password = SecretString::from(user.password);

    match directory.authenticate(&email, &password).await {
        Ok(_) => (),

        Err(DirectoryError::UpstreamRejected { status, .. }) => {
            debug!("Directory rejected login: {}", status);

            return (
                StatusCode::UNAUTHORIZED,
                HeaderMap::new(),
                "Login failed".to_string(),
            );
        }

        Err(e) => {
            error!("Error authenticating against directory: {}", e);

            return (
                StatusCode::BAD_GATEWAY,
                HeaderMap::new(),
                "Login failed".to_string(),
            );
        }
    }

    let cookie = sessions
        .issue(&email)
        .map_err(|e| e.to_string())
        .and_then(|token| session_cookie(&token).map_err(|e| e.to_string()));

    match cookie {
        Ok(cookie) => {
            debug!("Login successful");

            let mut headers = HeaderMap::new();
            headers.insert(SET_COOKIE, cookie);

            (StatusCode::OK, headers, "Login successful".to_string())
        }

        Err(e) => {
            error!("Error creating session: {}", e);

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                HeaderMap::new(),
                "Internal server error".to_string(),
            )
        }
    }
}
