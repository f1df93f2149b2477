//! Request-scoped session context
//!
//! Each request gets its own `SessionContext`, built from the signed
//! session cookie. It answers "who is logged in" with a once-per-request
//! lookup and records login/logout and flash notices as cookie changes
//! that are applied to the response.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponseParts, ResponseParts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use super::session::{
    Session, create_session_token, sign_payload, verify_payload, verify_session_token,
};
use crate::AppState;
use crate::data::{Database, User};
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "session";
pub const FLASH_COOKIE: &str = "flash";

/// One-shot message carried to the next rendered page
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Flash {
    notice: String,
}

/// Per-request view of the session
///
/// Extract it in a handler, then return it as part of the response so
/// that any login, logout or notice is written back to the browser.
pub struct SessionContext {
    jar: CookieJar,
    user_id: Option<String>,
    /// `None` until the first lookup in this request
    current_user: Option<Option<User>>,
    db: Arc<Database>,
    secret: String,
    max_age: i64,
    secure: bool,
}

impl SessionContext {
    /// Build a context from a request's cookies
    pub fn from_jar(jar: CookieJar, state: &AppState) -> Self {
        let secret = state.config.auth.session_secret.clone();
        let user_id = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| match verify_session_token(cookie.value(), &secret) {
                Ok(session) => Some(session.user_id),
                Err(error) => {
                    tracing::debug!(%error, "Ignoring invalid session cookie");
                    None
                }
            });

        Self {
            jar,
            user_id,
            current_user: None,
            db: state.db.clone(),
            secret,
            max_age: state.config.auth.session_max_age,
            secure: state.config.should_use_secure_cookies(),
        }
    }

    /// Id stored in the session, if any
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// The logged-in user
    ///
    /// Looked up at most once per request. Returns `None` when the
    /// session is empty or names a user that no longer exists.
    pub async fn current_user(&mut self) -> Result<Option<User>, AppError> {
        if let Some(cached) = &self.current_user {
            return Ok(cached.clone());
        }

        let user = match &self.user_id {
            Some(id) => self.db.get_user(id).await?,
            None => None,
        };
        self.current_user = Some(user.clone());

        Ok(user)
    }

    /// Log `user` in, or log out with `None`
    pub fn set_current_user(&mut self, user: Option<User>) -> Result<(), AppError> {
        match &user {
            Some(user) => {
                let session = Session::new(&user.id, self.max_age);
                let token = create_session_token(&session, &self.secret)?;
                self.jar = self.jar.clone().add(self.cookie(SESSION_COOKIE, token));
                self.user_id = Some(user.id.clone());
            }
            None => {
                self.jar = self.jar.clone().remove(removal_cookie(SESSION_COOKIE));
                self.user_id = None;
            }
        }
        self.current_user = Some(user);

        Ok(())
    }

    /// Whether anybody is logged in
    pub async fn is_logged_in(&mut self) -> Result<bool, AppError> {
        Ok(self.current_user().await?.is_some())
    }

    /// Queue a notice for the next rendered page
    pub fn set_notice(&mut self, notice: impl Into<String>) -> Result<(), AppError> {
        let token = sign_payload(
            &Flash {
                notice: notice.into(),
            },
            &self.secret,
        )?;
        self.jar = self.jar.clone().add(self.cookie(FLASH_COOKIE, token));
        Ok(())
    }

    /// Read and clear the pending notice
    pub fn take_notice(&mut self) -> Option<String> {
        let token = self.jar.get(FLASH_COOKIE)?.value().to_owned();
        self.jar = self.jar.clone().remove(removal_cookie(FLASH_COOKIE));

        verify_payload::<Flash>(&token, &self.secret)
            .map(|flash| flash.notice)
            .ok()
    }

    fn cookie(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build()
    }
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionContext
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(Self::from_jar(jar, &app_state))
    }
}

impl IntoResponseParts for SessionContext {
    type Error = std::convert::Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        self.jar.into_response_parts(res)
    }
}
