//! Session Cookie Middleware
//!
//! Sessions live entirely in an encrypted, authenticated cookie. Two keys
//! are active at once: cookies are minted with the current key and
//! accepted under either, so a secret can be rotated without logging
//! everybody out.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use chrono::Utc;
use sha2::{Digest, Sha512};

use crate::config::Settings;
use crate::domain::{Session, SESSION_TTL_DAYS};
use crate::shared::error::AppError;

pub const SESSION_COOKIE: &str = "session";

/// Which key a cookie verified under.
#[derive(Debug, Clone, PartialEq)]
pub enum Verified {
    Current(Session),
    /// Valid, but should be reissued under the current key
    Previous(Session),
}

impl Verified {
    pub fn session(&self) -> &Session {
        match self {
            Verified::Current(s) | Verified::Previous(s) => s,
        }
    }
}

#[derive(Clone)]
pub struct SessionKeys {
    current: Key,
    previous: Key,
    secure: bool,
}

impl SessionKeys {
    /// Keys are stretched to the 64 bytes the cookie cipher needs.
    pub fn new(current: &str, previous: &str, secure: bool) -> Self {
        Self {
            current: derive_key(current),
            previous: derive_key(previous),
            secure,
        }
    }

    /// `SECRET_KEY_ONE` signs, `SECRET_KEY_TWO` is still accepted.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.session.secret_key_one,
            &settings.session.secret_key_two,
            !settings.is_development(),
        )
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Build a jar carrying `session` encrypted under the current key.
    /// Returned from a handler it sets the cookie on the response.
    pub fn issue(&self, session: &Session) -> Result<PrivateCookieJar, AppError> {
        let value = serde_json::to_string(session).map_err(|e| AppError::Unexpected(e.into()))?;

        let cookie = Cookie::build((SESSION_COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(time::Duration::days(SESSION_TTL_DAYS));

        Ok(PrivateCookieJar::new(self.current.clone()).add(cookie))
    }

    /// Read the session cookie from request headers. Cookies that fail
    /// to decrypt, fail to parse, or have outlived their lifetime yield
    /// `None`.
    pub fn verify(&self, headers: &HeaderMap) -> Option<Verified> {
        if let Some(session) = read_session(headers, &self.current) {
            return Some(Verified::Current(session));
        }
        read_session(headers, &self.previous).map(Verified::Previous)
    }
}

fn derive_key(secret: &str) -> Key {
    Key::from(Sha512::digest(secret.as_bytes()).as_slice())
}

fn read_session(headers: &HeaderMap, key: &Key) -> Option<Session> {
    let jar = PrivateCookieJar::from_headers(headers, key.clone());
    let cookie = jar.get(SESSION_COOKIE)?;
    let session: Session = serde_json::from_str(cookie.value()).ok()?;

    if session.is_expired_at(Utc::now()) {
        tracing::debug!(session_id = %session.id, "Rejecting expired session");
        return None;
    }
    Some(session)
}

/// Attach the verified session to the request, minting an anonymous one
/// when none verifies. New sessions and sessions verified under the
/// previous key are (re)issued on the response, unless the handler set
/// its own session cookie.
pub async fn session_middleware(
    State(keys): State<SessionKeys>,
    mut request: Request,
    next: Next,
) -> Response {
    let (session, reissue) = match keys.verify(request.headers()) {
        Some(Verified::Current(session)) => (session, false),
        Some(Verified::Previous(session)) => {
            tracing::debug!(session_id = %session.id, "Migrating session to current key");
            (session, true)
        }
        None => (Session::anonymous(), true),
    };

    request.extensions_mut().insert(session.clone());
    let response = next.run(request).await;

    if !reissue || sets_session_cookie(&response) {
        return response;
    }

    match keys.issue(&session) {
        Ok(jar) => (jar, response).into_response(),
        Err(e) => {
            e.report();
            response
        }
    }
}

fn sets_session_cookie(response: &Response) -> bool {
    let prefix = format!("{SESSION_COOKIE}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// The session attached by [`session_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(CurrentSession)
            .ok_or_else(|| AppError::server_error("Session middleware is not installed"))
    }
}
