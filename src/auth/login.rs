use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    extract::{Form, Query},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;
use diesel::prelude::*;
use hypertext::prelude::*;
use serde::Deserialize;

use crate::{
    auth::{LOGIN_COOKIE, User, clear_cookie, set_login_cookie},
    schema::users,
    state::Conn,
    template::Page,
    util_resp::{FailureResponse, StandardResponse, bad_request, success},
    widgets::alert::ErrorAlert,
};

pub async fn login_page(user: Option<User>) -> StandardResponse {
    if user.is_some() {
        return bad_request(
            Page::new()
                .user_opt(user)
                .body(maud! {
                    div class="container py-4" {
                        ErrorAlert
                            msg = "You are already logged in, so cannot log in!";
                    }
                })
                .render(),
        );
    }

    success(Page::new().body(maud! {
        div class="container py-4" {
            h1 { "Organizer login" }
            form method="post" {
                div class="mb-3" {
                    label for="id" class="form-label" { "Email or username" }
                    input type="text" class="form-control" id="id" name="id";
                }
                div class="mb-3" {
                    label for="password" class="form-label" { "Password" }
                    input type="password" class="form-control" id="password" name="password";
                }
                button type="submit" class="btn btn-primary" { "Log in" }
            }
        }
    }).render())
}

#[derive(Deserialize)]
pub struct LoginForm {
    id: String,
    password: String,
}

#[derive(Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

fn try_again(msg: &str) -> Response {
    FailureResponse::BadRequest(
        Page::new()
            .body(maud! {
                div class="container py-4" {
                    ErrorAlert msg=(msg);
                    a href="/login" { "Try again" }
                }
            })
            .render(),
    )
    .into_response()
}

pub async fn do_login(
    mut conn: Conn,
    jar: PrivateCookieJar,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, FailureResponse> {
    let user = match users::table
        .filter(users::email.eq(&form.id).or(users::username.eq(&form.id)))
        .first::<User>(&mut *conn)
        .optional()?
    {
        Some(user) => user,
        None => return Ok(try_again("No such user exists.")),
    };

    let verified = PasswordHash::new(&user.password_hash)
        .map(|hash| {
            Argon2::default()
                .verify_password(form.password.as_bytes(), &hash)
                .is_ok()
        })
        .unwrap_or_else(|e| {
            tracing::error!(user_id = %user.id, "stored password hash is invalid: {e}");
            false
        });
    if !verified {
        return Ok(try_again("Incorrect password."));
    }

    tracing::info!(user_id = %user.id, "organizer logged in");
    let jar = set_login_cookie(user.id, jar);

    // only ever redirect to a local path
    let redirect_to = query
        .next
        .filter(|next| next.starts_with('/') && !next.starts_with("//"))
        .unwrap_or_else(|| "/".to_string());

    Ok((jar, Redirect::to(&redirect_to)).into_response())
}

pub async fn logout(jar: PrivateCookieJar) -> (PrivateCookieJar, Redirect) {
    (clear_cookie(LOGIN_COOKIE, jar), Redirect::to("/"))
}
