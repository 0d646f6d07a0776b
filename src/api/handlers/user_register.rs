use crate::{
    api::handlers::{normalize_email, valid_email},
    registration::{Registration, RegistrationError},
};
use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
pub struct UserRegister {
    email: String,
    password: String,
}

impl std::fmt::Debug for UserRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRegister")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[utoipa::path(
    post,
    path= "/register",
    request_body = UserRegister,
    responses (
        (status = 201, description = "Pending registration created, verification required", body = String),
        (status = 400, description = "Missing payload, invalid email or empty password", body = String),
        (status = 409, description = "Email already registered or awaiting verification", body = String),
        (status = 500, description = "Registration could not be processed", body = String),
    ),
    tag= "register"
)]
#[instrument(skip(registration))]
pub async fn register(
    registration: Extension<Arc<Registration>>,
    payload: Option<Json<UserRegister>>,
) -> impl IntoResponse {
    let user: UserRegister = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()),
    };

    let email = normalize_email(&user.email);

    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string());
    }

    if user.password.is_empty() {
        return (StatusCode::BAD_REQUEST, "Invalid password".to_string());
    }

    match registration
        .register(&email, SecretString::from(user.password))
        .await
    {
        Ok(pending) => {
            // Delivery of the verification message happens outside this service.
            info!(expires = %pending.expiration_date, "Registration pending verification");
            (
                StatusCode::CREATED,
                "Registration successful. Please check your email to verify your account."
                    .to_string(),
            )
        }
        Err(RegistrationError::Duplicate(kind)) => {
            debug!("Duplicate registration: {kind}");
            (StatusCode::CONFLICT, format!("User {kind}"))
        }
        Err(e) => {
            error!("Failed to process registration: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process registration".to_string(),
            )
        }
    }
}
