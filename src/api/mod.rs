#![allow(clippy::needless_for_each)]

use crate::{
    api::handlers::{
        health, health::__path_health, session, session::__path_logout, session::__path_profile,
        user_login, user_login::__path_login, user_register, user_register::__path_register,
        user_verify, user_verify::__path_verify,
    },
    cli::globals::GlobalArgs,
    directory::DirectoryClient,
    registration::Registration,
    session::SessionTokens,
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use utoipa::OpenApi;

pub mod handlers;

#[derive(OpenApi)]
#[openapi(
    paths(health, register, verify, login, logout, profile),
    components(schemas(
        health::Health,
        user_register::UserRegister,
        user_verify::UserVerify,
        user_login::UserLogin,
        session::Profile
    )),
    tags(
        (name = "navi", description = "Registration and login API")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the application router from the process settings.
///
/// # Errors
/// Returns an error if the directory client or session keys cannot be constructed.
pub fn router(globals: &GlobalArgs) -> Result<Router> {
    let directory =
        DirectoryClient::new(globals).context("Failed to build directory client")?;

    let registration = Registration::new(directory.clone())
        .with_verified_user_role(globals.verified_user_role.clone());

    let sessions =
        SessionTokens::new(&globals.session_secret).context("Failed to load session key")?;

    Ok(app(
        Arc::new(directory),
        Arc::new(registration),
        Arc::new(sessions),
    ))
}

/// Wire handlers and middleware around already-built components.
pub fn app(
    directory: Arc<DirectoryClient>,
    registration: Arc<Registration>,
    sessions: Arc<SessionTokens>,
) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    Router::new()
        .route("/", get(|| async { "🌱" }))
        .route("/register", post(handlers::register))
        .route("/verify", post(handlers::verify))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/profile", get(handlers::profile))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(registration))
                .layer(Extension(sessions))
                .layer(Extension(directory.clone())),
        )
        .route("/health", get(handlers::health).options(handlers::health))
        .layer(Extension(directory))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, globals: &GlobalArgs) -> Result<()> {
    let app = router(globals)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
