use argon2::Argon2;
use argon2::PasswordHasher;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use axum::{extract::Form, response::Redirect};
use axum_extra::extract::PrivateCookieJar;
use chrono::Utc;
use diesel::{insert_into, prelude::*};
use hypertext::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::validation::*;
use crate::{
    auth::{User, set_login_cookie},
    schema::users,
    state::Conn,
    template::Page,
    util_resp::{FailureResponse, StandardResponse, see_other_ok, success},
    widgets::alert::ErrorAlert,
};

pub async fn register_page(user: Option<User>) -> StandardResponse {
    if user.is_some() {
        return see_other_ok(Redirect::to("/"));
    }

    success(
        Page::new()
            .body(maud! {
                div class="container py-4" {
                    h1 {"Register"}
                    p class="text-muted" {
                        "Organizer accounts can create tracks and manage their judges, participants and scores."
                    }
                    form method="post" class="mt-4" {
                        div class="mb-3" {
                            label for="username" class="form-label" { "Username" }
                            input type="text" class="form-control" id="username" name="username";
                        }
                        div class="mb-3" {
                            label for="email" class="form-label" { "Email" }
                            input type="email" class="form-control" id="email" name="email";
                        }
                        div class="mb-3" {
                            label for="password" class="form-label" { "Password" }
                            input type="password" class="form-control" id="password" name="password";
                        }
                        div class="mb-3" {
                            label for="password2" class="form-label" { "Confirm Password" }
                            input type="password" class="form-control" id="password2" name="password2";
                        }
                        button type="submit" class="btn btn-primary" { "Register" }
                    }
                }
            })
            .render(),
    )
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub(crate) email: String,
    pub(crate) password: String,
    pub(crate) password2: String,
}

impl RegisterForm {
    fn validate(&self) -> Result<(), String> {
        is_ascii_no_spaces(&self.username)?;
        is_valid_name(&self.username)?;
        is_valid_email(&self.email)?;
        if !User::validate_password(&self.password) {
            return Err("passwords should be at least 6 characters".to_string());
        }
        if self.password != self.password2 {
            return Err("the passwords do not match".to_string());
        }
        Ok(())
    }
}

fn try_again(msg: &str) -> FailureResponse {
    FailureResponse::BadRequest(
        Page::new()
            .body(maud! {
                div class="container py-4" {
                    ErrorAlert msg=(msg);
                    "Please return to the previous page and try again."
                }
            })
            .render(),
    )
}

pub async fn do_register(
    mut conn: Conn,
    jar: PrivateCookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<(PrivateCookieJar, Redirect), FailureResponse> {
    if let Err(e) = form.validate() {
        return Err(try_again(&e));
    }

    let existing = users::table
        .filter(
            users::username
                .eq(&form.username)
                .or(users::email.eq(&form.email)),
        )
        .first::<User>(&mut *conn)
        .optional()?;

    if let Some(user) = existing {
        return Err(try_again(if user.email == form.email {
            "That email is already taken."
        } else {
            "That username is already taken."
        }));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(form.password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!("could not hash password: {e}");
            FailureResponse::ServerError(())
        })?
        .to_string();

    let id = Uuid::now_v7().to_string();
    insert_into(users::table)
        .values((
            users::id.eq(&id),
            users::email.eq(&form.email),
            users::username.eq(&form.username),
            users::password_hash.eq(password_hash),
            users::created_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut *conn)?;

    tracing::info!(user_id = %id, "organizer registered");
    Ok((set_login_cookie(id, jar), Redirect::to("/")))
}
