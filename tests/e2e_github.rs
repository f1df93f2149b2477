//! E2E tests for the GitHub strategy against a mock GitHub

mod common;

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use common::{Browser, TestServer, location};
use omnilogin::config::GitHubOAuthConfig;
use serde::Deserialize;
use tokio::net::TcpListener;

const GOOD_CODE: &str = "good-code";
const ACCESS_TOKEN: &str = "gho_test_token";

#[derive(Deserialize)]
struct TokenForm {
    client_id: String,
    client_secret: String,
    code: String,
}

async fn mock_token(Form(form): Form<TokenForm>) -> Json<serde_json::Value> {
    if form.client_id == "test-client-id"
        && form.client_secret == "test-client-secret"
        && form.code == GOOD_CODE
    {
        Json(serde_json::json!({
            "access_token": ACCESS_TOKEN,
            "token_type": "bearer",
            "scope": "read:user"
        }))
    } else {
        Json(serde_json::json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        }))
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("authorization").and_then(|v| v.to_str().ok())
        == Some(format!("Bearer {ACCESS_TOKEN}").as_str())
}

/// `private_email` hides the address from /user, as GitHub does
async fn mock_user(State(private_email): State<bool>, headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let email = if private_email {
        None
    } else {
        Some("ada@example.com")
    };
    Json(serde_json::json!({
        "id": 42,
        "login": "ada",
        "name": null,
        "email": email,
        "avatar_url": "https://avatars.example.com/42"
    }))
    .into_response()
}

async fn mock_emails(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    Json(serde_json::json!([
        { "email": "old@example.com", "primary": false, "verified": true },
        { "email": "unverified@example.com", "primary": true, "verified": false },
        { "email": "ada@private.example.com", "primary": true, "verified": true }
    ]))
    .into_response()
}

/// Spawn the mock and return its base URL
async fn spawn_mock_github(private_email: bool) -> String {
    let app = Router::new()
        .route("/login/oauth/access_token", post(mock_token))
        .route("/user", get(mock_user))
        .route("/user/emails", get(mock_emails))
        .with_state(private_email);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

async fn github_server() -> TestServer {
    github_server_with(false, "read:user").await
}

async fn github_server_with(private_email: bool, scope: &str) -> TestServer {
    let mock = spawn_mock_github(private_email).await;
    TestServer::with_github(Some(GitHubOAuthConfig {
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
        authorize_url: "https://github.com/login/oauth/authorize".to_string(),
        token_url: format!("{mock}/login/oauth/access_token"),
        api_url: mock,
        scope: scope.to_string(),
    }))
    .await
}

/// Start the handshake and return the issued state
async fn begin_login(server: &TestServer, browser: &mut Browser) -> String {
    let response = server.get(browser, "/auth/github").await;
    assert!(response.status().is_redirection());

    let location = location(&response);
    assert!(location.starts_with("https://github.com/login/oauth/authorize?"));
    assert!(location.contains("client_id=test-client-id"));
    assert!(location.contains("scope=read%3Auser"));
    assert!(location.contains("redirect_uri=http%3A%2F%2Flocalhost%2Fauth%2Fgithub%2Fcallback"));

    let state = browser.cookie("oauth_state").expect("state cookie").to_string();
    assert!(location.contains(&format!("state={state}")));
    state
}

#[tokio::test]
async fn test_chooser_lists_github_when_configured() {
    let server = github_server().await;
    let mut browser = Browser::default();

    let body = server.get(&mut browser, "/").await.text().await.unwrap();
    assert!(body.contains("Sign in with GitHub"));
}

#[tokio::test]
async fn test_github_login_creates_user_and_session() {
    let server = github_server().await;
    let mut browser = Browser::default();
    let state = begin_login(&server, &mut browser).await;

    let response = server
        .get(
            &mut browser,
            &format!("/auth/github/callback?code={GOOD_CODE}&state={state}"),
        )
        .await;

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/");
    assert!(browser.cookie("session").is_some());
    assert!(browser.cookie("oauth_state").is_none());

    let authentication = server
        .state
        .db
        .get_authentication_by_provider_uid("github", "42")
        .await
        .unwrap()
        .expect("authentication linked");
    let user = server
        .state
        .db
        .get_user(&authentication.user_id)
        .await
        .unwrap()
        .unwrap();
    // No display name on the GitHub profile, so the email is used
    assert_eq!(user.name, "ada@example.com");
}

#[tokio::test]
async fn test_github_callback_rejects_missing_state_cookie() {
    let server = github_server().await;
    let mut browser = Browser::default();

    let response = server
        .get(
            &mut browser,
            &format!("/auth/github/callback?code={GOOD_CODE}&state=forged"),
        )
        .await;

    assert!(response.status().is_redirection());
    assert_eq!(
        location(&response),
        "/auth/failure?message=csrf_detected&strategy=github"
    );
    assert_eq!(server.state.db.count_users().await.unwrap(), 0);
}

#[tokio::test]
async fn test_github_callback_with_bad_code_fails() {
    let server = github_server().await;
    let mut browser = Browser::default();
    let state = begin_login(&server, &mut browser).await;

    let response = server
        .get(
            &mut browser,
            &format!("/auth/github/callback?code=stale&state={state}"),
        )
        .await;

    assert_eq!(
        location(&response),
        "/auth/failure?message=invalid_credentials&strategy=github"
    );
    assert!(browser.cookie("session").is_none());
    assert!(browser.cookie("oauth_state").is_none());
}

#[tokio::test]
async fn test_github_denial_is_forwarded_to_failure() {
    let server = github_server().await;
    let mut browser = Browser::default();
    let state = begin_login(&server, &mut browser).await;

    let response = server
        .get(
            &mut browser,
            &format!("/auth/github/callback?error=access_denied&state={state}"),
        )
        .await;

    assert_eq!(
        location(&response),
        "/auth/failure?message=access_denied&strategy=github"
    );
}

#[tokio::test]
async fn test_github_login_falls_back_to_primary_email() {
    let server = github_server_with(true, "read:user user:email").await;
    let mut browser = Browser::default();
    let state = begin_login(&server, &mut browser).await;

    let response = server
        .get(
            &mut browser,
            &format!("/auth/github/callback?code={GOOD_CODE}&state={state}"),
        )
        .await;

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/");
    assert!(browser.cookie("session").is_some());

    let user = server
        .state
        .db
        .get_user_by_name("ada@private.example.com")
        .await
        .unwrap();
    assert!(user.is_some());
}

#[tokio::test]
async fn test_github_private_email_without_email_scope_is_rejected() {
    let server = github_server_with(true, "read:user").await;
    let mut browser = Browser::default();
    let state = begin_login(&server, &mut browser).await;

    let response = server
        .get(
            &mut browser,
            &format!("/auth/github/callback?code={GOOD_CODE}&state={state}"),
        )
        .await;

    assert_eq!(response.status(), 400);
    assert!(browser.cookie("session").is_none());
    assert_eq!(server.state.db.count_users().await.unwrap(), 0);
}
