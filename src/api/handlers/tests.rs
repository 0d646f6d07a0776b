#![allow(clippy::unwrap_used)]

use crate::{
    api::app,
    cli::globals::GlobalArgs,
    directory::DirectoryClient,
    registration::Registration,
    session::SessionTokens,
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::{net::TcpListener, sync::Arc};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "handler-test-secret";

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn test_app(server: &MockServer) -> Router {
    let globals = GlobalArgs::new(
        &server.uri(),
        SecretString::from("admin-token".to_string()),
        SecretString::from(SECRET.to_string()),
    )
    .unwrap();
    let directory = DirectoryClient::new(&globals).unwrap();
    let registration = Registration::new(directory.clone());
    let sessions = SessionTokens::new(&globals.session_secret).unwrap();
    app(
        Arc::new(directory),
        Arc::new(registration),
        Arc::new(sessions),
    )
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn mount_lookup(server: &MockServer, endpoint: &str, found: bool) {
    let data = if found { json!([{"id": 1}]) } else { json!([]) };
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": data})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn register_creates_pending_user() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("filter[email][_eq]", "a@x.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;
    mount_lookup(&server, "/items/temp_users", false).await;
    Mock::given(method("POST"))
        .and(path("/items/temp_users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 1}})))
        .expect(1)
        .mount(&server)
        .await;

    let response = test_app(&server)
        .oneshot(post_json(
            "/register",
            &json!({"email": " A@X.com ", "password": "pw"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(body_string(response).await.contains("check your email"));
}

#[tokio::test]
async fn register_reports_duplicates_as_conflict() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    mount_lookup(&server, "/users", false).await;
    mount_lookup(&server, "/items/temp_users", true).await;

    let response = test_app(&server)
        .oneshot(post_json(
            "/register",
            &json!({"email": "a@x.com", "password": "pw"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_string(response).await, "User awaiting verification.");
}

#[tokio::test]
async fn register_hides_directory_failures() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(500).set_body_string("secret stack trace"))
        .mount(&server)
        .await;

    let response = test_app(&server)
        .oneshot(post_json(
            "/register",
            &json!({"email": "a@x.com", "password": "pw"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_string(response).await;
    assert!(!body.contains("secret stack trace"));
}

#[tokio::test]
async fn register_rejects_invalid_input() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    let app = test_app(&server);

    let response = app
        .clone()
        .oneshot(post_json(
            "/register",
            &json!({"email": "not-an-email", "password": "pw"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post_json(
            "/register",
            &json!({"email": "a@x.com", "password": ""}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let requests = server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn login_sets_session_cookie_usable_for_profile() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"access_token": "directus-token"}
        })))
        .mount(&server)
        .await;

    let app = test_app(&server);
    let response = app
        .clone()
        .oneshot(post_json(
            "/login",
            &json!({"email": "a@x.com", "password": "pw"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session_token="));
    let pair = cookie.split(';').next().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/profile")
                .header(header::COOKIE, pair)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let profile: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(profile["email"], "a@x.com");
}

#[tokio::test]
async fn login_failure_is_generic() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid user credentials."))
        .mount(&server)
        .await;

    let response = test_app(&server)
        .oneshot(post_json(
            "/login",
            &json!({"email": "a@x.com", "password": "wrong"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_string(response).await, "Login failed");
}

#[tokio::test]
async fn profile_requires_valid_session() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    let app = test_app(&server);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/profile").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let foreign = SessionTokens::new(&SecretString::from("other-secret".to_string()))
        .unwrap()
        .issue("a@x.com")
        .unwrap();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/profile")
                .header(header::AUTHORIZATION, format!("Bearer {foreign}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_cookie() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    let response = test_app(&server)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn verify_rejects_malformed_and_expired_tokens() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    let token = "ab".repeat(16);
    Mock::given(method("GET"))
        .and(path("/items/temp_users"))
        .and(query_param("filter[verification_token][_eq]", token.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": 4,
                "email": "a@x.com",
                "password": "pw",
                "verification_token": token,
                "expiration_date": "2000-01-01T00:00:00Z"
            }]
        })))
        .mount(&server)
        .await;

    let app = test_app(&server);

    let response = app
        .clone()
        .oneshot(post_json("/verify", &json!({"token": "short"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post_json("/verify", &json!({"token": token})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
}

#[tokio::test]
async fn health_reports_directory_state() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/server/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let app = test_app(&server);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));
    let health: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(health["directory"], "ok");
    assert_eq!(health["name"], env!("CARGO_PKG_NAME"));

    // The ping mock is exhausted, so the directory now answers 404.
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn register_reports_verified_duplicate() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    mount_lookup(&server, "/users", true).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let response = test_app(&server)
        .oneshot(post_json(
            "/register",
            &json!({"email": "a@x.com", "password": "pw"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_string(response).await,
        "User already exists, please log in."
    );
}

#[tokio::test]
async fn login_reports_bad_gateway_on_unreadable_directory_answer() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .mount(&server)
        .await;

    let response = test_app(&server)
        .oneshot(post_json(
            "/login",
            &json!({"email": "a@x.com", "password": "pw"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_string(response).await, "Login failed");
}

#[tokio::test]
async fn verify_promotes_pending_user() {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return;
    }
    let server = MockServer::start().await;
    let token = "cd".repeat(16);
    Mock::given(method("GET"))
        .and(path("/items/temp_users"))
        .and(query_param("filter[verification_token][_eq]", token.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": 7,
                "email": "a@x.com",
                "password": "pw",
                "verification_token": token,
                "expiration_date": "2999-01-01T00:00:00Z"
            }]
        })))
        .mount(&server)
        .await;
    mount_lookup(&server, "/users", false).await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "u-7"}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/items/temp_users/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let response = test_app(&server)
        .oneshot(post_json(
            "/verify",
            &json!({"token": token.to_ascii_uppercase()}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "Email verified");
}
