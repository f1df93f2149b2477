//! Developer strategy
//!
//! Trusts whatever the form says. Never enable it in production.

use std::collections::HashMap;

use axum::response::Html;

use super::{AuthInfo, AuthPayload, DEVELOPER};

/// Form asking for the identity to log in as
pub(super) fn request_phase() -> Html<&'static str> {
    Html(
        r#"
        <!DOCTYPE html>
        <html>
        <head><title>Developer Login - Omnilogin</title></head>
        <body>
            <h1>Developer Login</h1>
            <form method="post" action="/auth/developer/callback">
                <label>Name <input type="text" name="name"></label>
                <label>Email <input type="email" name="email"></label>
                <label>UID (defaults to email) <input type="text" name="uid"></label>
                <button type="submit">Sign In</button>
            </form>
        </body>
        </html>
    "#,
    )
}

/// Build the payload from submitted fields
///
/// The uid is the `uid` field, falling back to the email.
pub(super) fn callback_phase(params: &HashMap<String, String>) -> AuthPayload {
    let field = |key: &str| {
        params
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let info = AuthInfo {
        name: field("name"),
        email: field("email"),
        nickname: None,
        image: None,
    };
    let uid = field("uid")
        .or_else(|| info.email.clone())
        .unwrap_or_default();

    AuthPayload {
        provider: DEVELOPER.to_string(),
        uid,
        info,
        credentials: None,
        extra: None,
    }
}
