use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use chrono::{Days, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    schema::{self},
    state::{DbPool, ThreadSafeConn},
    tracks::participants::Judge,
};

pub mod judge;
pub mod login;
pub mod register;

pub const LOGIN_COOKIE: &str = "expotab_session";
pub const JUDGE_COOKIE: &str = "expotab_judge";

/// An organizer account.
#[derive(Debug, Queryable, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn validate_password(password: &str) -> bool {
        password.len() >= 6
    }
}

#[derive(Debug)]
pub enum AuthError {
    CookieMissingOrMalformed,
    NoDatabase,
    Unauthorized,
    /// A judge page was requested without a judge session.
    NoJudgeSession,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AuthError::CookieMissingOrMalformed => {
                (StatusCode::UNAUTHORIZED, "Cookie missing or malformed")
            }
            AuthError::NoDatabase => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            }
            AuthError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Unauthorized")
            }
            AuthError::NoJudgeSession => {
                return Redirect::to("/judge/login").into_response();
            }
        };
        (status, body).into_response()
    }
}

/// The contents of a session cookie. The same shape is used for organizer
/// sessions (where `id` is a user id) and judge sessions (a judge id).
#[derive(serde::Serialize, serde::Deserialize)]
pub struct LoginSession {
    id: String,
    expiry: NaiveDateTime,
}

async fn session_id<S>(
    parts: &mut Parts,
    state: &S,
    cookie_name: &str,
) -> Result<String, AuthError>
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    let jar: PrivateCookieJar<Key> =
        PrivateCookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthError::CookieMissingOrMalformed)?;

    let cookie = jar.get(cookie_name).ok_or(AuthError::Unauthorized)?;

    match serde_json::from_str::<LoginSession>(cookie.value()) {
        Ok(t) if Utc::now().naive_utc() < t.expiry => Ok(t.id),
        _ => Err(AuthError::Unauthorized),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for User
where
    S: Send + Sync,
    DbPool: FromRef<S>,
    Key: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let id = session_id(parts, state, LOGIN_COOKIE).await?;

        let conn_wrapper = ThreadSafeConn::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthError::NoDatabase)?;
        // extractors run in argument order, so this only fails if a handler
        // asks for its connection before the user
        let mut conn = conn_wrapper
            .inner
            .try_lock()
            .map_err(|_| AuthError::NoDatabase)?;

        let user = schema::users::table
            .filter(schema::users::id.eq(id))
            .first::<User>(&mut *conn)
            .optional()
            .map_err(|_| AuthError::NoDatabase)?;

        user.ok_or(AuthError::Unauthorized)
    }
}

/// A judge signed in with their PIN.
#[derive(Debug, Clone)]
pub struct JudgeSession {
    pub judge: Judge,
}

#[async_trait]
impl<S> FromRequestParts<S> for JudgeSession
where
    S: Send + Sync,
    DbPool: FromRef<S>,
    Key: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let id = session_id(parts, state, JUDGE_COOKIE)
            .await
            .map_err(|_| AuthError::NoJudgeSession)?;

        let conn_wrapper = ThreadSafeConn::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthError::NoDatabase)?;
        let mut conn = conn_wrapper
            .inner
            .try_lock()
            .map_err(|_| AuthError::NoDatabase)?;

        // a judge who has been deleted loses their session
        let judge = schema::track_judges::table
            .filter(schema::track_judges::id.eq(id))
            .first::<Judge>(&mut *conn)
            .optional()
            .map_err(|_| AuthError::NoDatabase)?
            .ok_or(AuthError::NoJudgeSession)?;

        Ok(JudgeSession { judge })
    }
}

fn session_cookie(name: &'static str, id: String) -> Cookie<'static> {
    let expiry = Utc::now()
        .naive_utc()
        .checked_add_days(Days::new(7))
        .unwrap_or(NaiveDateTime::MAX);
    let value = serde_json::to_string(&LoginSession { id, expiry })
        .unwrap_or_default();

    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie
}

pub fn set_login_cookie(id: String, jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(session_cookie(LOGIN_COOKIE, id))
}

pub fn set_judge_cookie(id: String, jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(session_cookie(JUDGE_COOKIE, id))
}

pub fn clear_cookie(name: &'static str, jar: PrivateCookieJar) -> PrivateCookieJar {
    let mut cookie = Cookie::from(name);
    cookie.set_path("/");
    jar.remove(cookie)
}
