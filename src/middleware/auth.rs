use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SiteError;

pub const SESSION_COOKIE: &str = "admin_session";
pub const SESSION_TTL_HOURS: i64 = 24;

/// Payload of the encrypted admin session cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub authenticated: bool,
    pub issued_at: DateTime<Utc>,
}

impl AdminSession {
    pub fn issue() -> Self {
        Self {
            authenticated: true,
            issued_at: Utc::now(),
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.authenticated
            && now.signed_duration_since(self.issued_at) < chrono::Duration::hours(SESSION_TTL_HOURS)
    }
}

/// The live admin session carried by `jar`, if any.
pub fn session_from_jar(jar: &PrivateCookieJar) -> Option<AdminSession> {
    let cookie = jar.get(SESSION_COOKIE)?;
    let session: AdminSession = match serde_json::from_str(cookie.value()) {
        Ok(s) => s,
        Err(e) => {
            debug!(error = %e, "discarding malformed session cookie");
            return None;
        }
    };
    session.is_valid_at(Utc::now()).then_some(session)
}

pub fn session_cookie(
    session: &AdminSession,
    secure: bool,
) -> Result<Cookie<'static>, serde_json::Error> {
    let value = serde_json::to_string(session)?;
    Ok(build_cookie(value, time::Duration::hours(SESSION_TTL_HOURS), secure))
}

pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    build_cookie(String::new(), time::Duration::ZERO, secure)
}

fn build_cookie(value: String, max_age: time::Duration, secure: bool) -> Cookie<'static> {
    let same_site = if secure { SameSite::None } else { SameSite::Lax };
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(same_site)
        .max_age(max_age)
        .build()
}

/// Extractor guarding admin routes: rejects with 401 unless the request
/// carries a valid session cookie.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AdminSession);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = SiteError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(jar) = PrivateCookieJar::<Key>::from_request_parts(parts, state).await;
        session_from_jar(&jar)
            .map(RequireAdmin)
            .ok_or(SiteError::Unauthorized)
    }
}
