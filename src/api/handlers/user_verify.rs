use crate::{
    api::handlers::valid_verification_token,
    registration::{Registration, RegistrationError},
};
use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
pub struct UserVerify {
    token: String,
}

#[utoipa::path(
    post,
    path= "/verify",
    request_body = UserVerify,
    responses (
        (status = 200, description = "Email verified, user created", body = String),
        (status = 400, description = "Missing payload or unknown token", body = String),
        (status = 409, description = "Email already belongs to a verified user", body = String),
        (status = 410, description = "Verification token expired", body = String),
        (status = 500, description = "Verification could not be processed", body = String),
    ),
    tag= "register"
)]
#[instrument(skip_all)]
pub async fn verify(
    registration: Extension<Arc<Registration>>,
    payload: Option<Json<UserVerify>>,
) -> impl IntoResponse {
    let request: UserVerify = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()),
    };

    let token = request.token.trim().to_ascii_lowercase();
    if !valid_verification_token(&token) {
        return (StatusCode::BAD_REQUEST, "Invalid token".to_string());
    }

    match registration.confirm(&token).await {
        Ok(id) => {
            debug!("Verified user {id}");
            (StatusCode::OK, "Email verified".to_string())
        }
        Err(RegistrationError::InvalidVerificationToken) => {
            (StatusCode::BAD_REQUEST, "Invalid token".to_string())
        }
        Err(RegistrationError::VerificationExpired) => (
            StatusCode::GONE,
            "Verification token expired".to_string(),
        ),
        Err(RegistrationError::Duplicate(kind)) => (StatusCode::CONFLICT, format!("User {kind}")),
        Err(e) => {
            error!("Failed to verify registration: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to verify registration".to_string(),
            )
        }
    }
}
