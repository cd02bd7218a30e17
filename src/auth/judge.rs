//! Judge sign in. Judges do not have accounts; an organizer gives each
//! judge a six digit PIN, which identifies both the judge and their track.

use axum::{
    extract::Form,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;
use hypertext::prelude::*;
use serde::Deserialize;

use crate::{
    auth::{JUDGE_COOKIE, clear_cookie, set_judge_cookie},
    state::Conn,
    template::Page,
    tracks::{participants::Judge, scoring::ScoringError},
    util_resp::{FailureResponse, StandardResponse, success},
    widgets::alert::ErrorAlert,
};

fn pin_form() -> impl Renderable {
    maud! {
        form method="post" action="/judge/login" {
            div class="mb-3" {
                label for="pin" class="form-label" { "Judge PIN" }
                input type="text" inputmode="numeric" autocomplete="off"
                    class="form-control form-control-lg" id="pin" name="pin"
                    maxlength="6" placeholder="000000";
            }
            button type="submit" class="btn btn-primary" { "Start judging" }
        }
    }
}

pub async fn judge_login_page() -> StandardResponse {
    success(
        Page::new()
            .body(maud! {
                div class="container py-4" style="max-width: 28rem;" {
                    h1 { "Judge sign in" }
                    (pin_form())
                }
            })
            .render(),
    )
}

#[derive(Deserialize)]
pub struct PinForm {
    pin: String,
}

pub async fn do_judge_login(
    mut conn: Conn,
    jar: PrivateCookieJar,
    Form(form): Form<PinForm>,
) -> Result<Response, FailureResponse> {
    let judge = match Judge::of_pin(form.pin.trim(), &mut *conn) {
        Ok(judge) => judge,
        Err(ScoringError::NotFound(_)) => return Ok(login_failed()),
        Err(e) => return Err(e.into()),
    };

    tracing::info!(judge_id = %judge.id, "judge signed in");
    Ok((set_judge_cookie(judge.id, jar), Redirect::to("/judge"))
        .into_response())
}

/// A 401 which shows the PIN form again, so the judge can retry straight
/// away.
fn login_failed() -> Response {
    (
        axum::http::StatusCode::UNAUTHORIZED,
        axum::response::Html(
            Page::new()
                .body(maud! {
                    div class="container py-4" style="max-width: 28rem;" {
                        ErrorAlert msg="That PIN was not recognised.";
                        (pin_form())
                    }
                })
                .render()
                .into_inner(),
        ),
    )
        .into_response()
}

pub async fn judge_logout(jar: PrivateCookieJar) -> (PrivateCookieJar, Redirect) {
    (clear_cookie(JUDGE_COOKIE, jar), Redirect::to("/judge/login"))
}
