//! GitHub strategy
//!
//! Implements the OAuth 2.0 authorization code flow with GitHub.

use std::collections::HashMap;

use axum::response::Redirect;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use super::{AuthCredentials, AuthInfo, AuthPayload, GITHUB, StrategyFailure};
use crate::config::{AppConfig, GitHubOAuthConfig};
use crate::error::AppError;

/// Cookie holding the state issued in the request phase
pub(super) const STATE_COOKIE: &str = "oauth_state";

/// GitHub token response
#[derive(Debug, Deserialize)]
struct GitHubTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

/// GitHub user info
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

/// Entry from `GET /user/emails`
#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

/// Redirect to the GitHub authorization page
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in cookie
/// 3. Redirect to GitHub with client_id, redirect_uri, scope, state
pub(super) fn request_phase(
    config: &AppConfig,
    github: &GitHubOAuthConfig,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let state = generate_csrf_state();

    let mut authorize_url = url::Url::parse(&github.authorize_url)
        .map_err(|e| AppError::Config(format!("invalid auth.github.authorize_url: {e}")))?;
    authorize_url
        .query_pairs_mut()
        .append_pair("client_id", &github.client_id)
        .append_pair("redirect_uri", &config.callback_url(GITHUB))
        .append_pair("scope", &github.scope)
        .append_pair("state", &state);

    let cookie = Cookie::build((STATE_COOKIE, state))
        .path("/auth")
        .http_only(true)
        .secure(config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .build();

    Ok((jar.add(cookie), Redirect::to(authorize_url.as_str())))
}

/// Turn GitHub's callback into a payload
///
/// # Steps
/// 1. Verify CSRF state
/// 2. Exchange code for access token
/// 3. Fetch user info from GitHub
pub(super) async fn callback_phase(
    client: &reqwest::Client,
    config: &AppConfig,
    github: &GitHubOAuthConfig,
    params: &HashMap<String, String>,
    jar: &CookieJar,
) -> Result<AuthPayload, StrategyFailure> {
    verify_csrf_state(params.get("state").map(String::as_str), jar)?;

    let code = params
        .get("code")
        .filter(|code| !code.is_empty())
        .ok_or(StrategyFailure::InvalidCredentials)?;

    let token = exchange_code(client, config, github, code).await?;
    let (user, raw) = fetch_user(client, github, &token).await?;

    // Private addresses are left out of /user
    let email = match user.email.filter(|email| !email.trim().is_empty()) {
        Some(email) => Some(email),
        None if email_scope_granted(&github.scope) => {
            fetch_primary_email(client, github, &token).await?
        }
        None => None,
    };

    Ok(AuthPayload {
        provider: GITHUB.to_string(),
        uid: user.id.to_string(),
        info: AuthInfo {
            name: user.name,
            email,
            nickname: Some(user.login),
            image: user.avatar_url,
        },
        credentials: Some(AuthCredentials {
            token,
            expires: false,
            expires_at: None,
        }),
        extra: Some(raw),
    })
}

/// Drop the state cookie once the callback has been handled
pub(super) fn clear_state(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(STATE_COOKIE).path("/auth").build())
}

async fn exchange_code(
    client: &reqwest::Client,
    config: &AppConfig,
    github: &GitHubOAuthConfig,
    code: &str,
) -> Result<String, StrategyFailure> {
    let redirect_uri = config.callback_url(GITHUB);
    let response = client
        .post(&github.token_url)
        .header(ACCEPT, "application/json")
        .form(&[
            ("client_id", github.client_id.as_str()),
            ("client_secret", github.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ])
        .send()
        .await
        .map_err(connect_failure)?;

    if !response.status().is_success() {
        tracing::warn!(status = %response.status(), "GitHub token exchange rejected");
        return Err(StrategyFailure::InvalidCredentials);
    }

    let body: GitHubTokenResponse = response
        .json()
        .await
        .map_err(|_| StrategyFailure::InvalidCredentials)?;

    match body.access_token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => {
            tracing::warn!(error = ?body.error, "GitHub returned no access token");
            Err(StrategyFailure::InvalidCredentials)
        }
    }
}

async fn fetch_user(
    client: &reqwest::Client,
    github: &GitHubOAuthConfig,
    token: &str,
) -> Result<(GitHubUser, serde_json::Value), StrategyFailure> {
    let response = client
        .get(format!("{}/user", github.api_url.trim_end_matches('/')))
        .header(ACCEPT, "application/vnd.github+json")
        .bearer_auth(token)
        .send()
        .await
        .map_err(connect_failure)?;

    if !response.status().is_success() {
        tracing::warn!(status = %response.status(), "GitHub user lookup rejected");
        return Err(StrategyFailure::InvalidCredentials);
    }

    let raw: serde_json::Value = response
        .json()
        .await
        .map_err(|_| StrategyFailure::InvalidCredentials)?;
    let user = serde_json::from_value(raw.clone()).map_err(|e| {
        tracing::warn!(error = %e, "Unexpected GitHub user payload");
        StrategyFailure::InvalidCredentials
    })?;

    Ok((user, raw))
}

/// Primary verified address, if GitHub reports one
async fn fetch_primary_email(
    client: &reqwest::Client,
    github: &GitHubOAuthConfig,
    token: &str,
) -> Result<Option<String>, StrategyFailure> {
    let response = client
        .get(format!("{}/user/emails", github.api_url.trim_end_matches('/')))
        .header(ACCEPT, "application/vnd.github+json")
        .bearer_auth(token)
        .send()
        .await
        .map_err(connect_failure)?;

    if !response.status().is_success() {
        tracing::warn!(status = %response.status(), "GitHub email lookup rejected");
        return Ok(None);
    }

    let emails: Vec<GitHubEmail> = match response.json().await {
        Ok(emails) => emails,
        Err(error) => {
            tracing::warn!(%error, "Unexpected GitHub emails payload");
            return Ok(None);
        }
    };

    Ok(emails
        .into_iter()
        .find(|entry| entry.primary && entry.verified)
        .map(|entry| entry.email))
}

fn email_scope_granted(scope: &str) -> bool {
    scope
        .split([' ', ','])
        .any(|s| s == "user" || s == "user:email")
}

fn connect_failure(error: reqwest::Error) -> StrategyFailure {
    tracing::warn!(%error, "Could not reach GitHub");
    StrategyFailure::FailedToConnect
}

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Verify CSRF state from cookie matches callback state
fn verify_csrf_state(state: Option<&str>, jar: &CookieJar) -> Result<(), StrategyFailure> {
    let expected = jar.get(STATE_COOKIE).map(|cookie| cookie.value());

    match (expected, state) {
        (Some(expected), Some(state))
            if !expected.is_empty() && constant_time_eq(expected, state) =>
        {
            Ok(())
        }
        _ => Err(StrategyFailure::CsrfDetected),
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csrf_state_is_random_and_url_safe() {
        let a = generate_csrf_state();
        let b = generate_csrf_state();

        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn constant_time_eq_compares_whole_value() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
        assert!(!constant_time_eq("", "a"));
    }

    #[test]
    fn email_scope_detection() {
        assert!(email_scope_granted("read:user user:email"));
        assert!(email_scope_granted("user"));
        assert!(email_scope_granted("read:user,user:email"));
        assert!(!email_scope_granted("read:user"));
        assert!(!email_scope_granted(""));
    }

    #[test]
    fn csrf_state_must_match_cookie() {
        let jar = CookieJar::new().add(Cookie::new(STATE_COOKIE, "expected"));

        assert!(verify_csrf_state(Some("expected"), &jar).is_ok());
        assert_eq!(
            verify_csrf_state(Some("forged"), &jar),
            Err(StrategyFailure::CsrfDetected)
        );
        assert_eq!(
            verify_csrf_state(None, &jar),
            Err(StrategyFailure::CsrfDetected)
        );
        assert_eq!(
            verify_csrf_state(Some("expected"), &CookieJar::new()),
            Err(StrategyFailure::CsrfDetected)
        );
    }
}
