use axum::{extract::Form, response::Redirect};
use hypertext::prelude::*;
use serde::Deserialize;

use crate::{
    auth::User,
    state::Conn,
    template::Page,
    tracks::Track,
    util_resp::{StandardResponse, bad_request, error_page, see_other_ok, success},
    validation::is_valid_name,
};

pub async fn create_track_page(user: User) -> StandardResponse {
    success(
        Page::new()
            .user(user)
            .body(maud! {
                div class="container py-4" {
                    h1 { "Create a new track" }
                    p class="text-muted" {
                        "A track is one judged category of the exhibition, with its own judges, participants and criteria. New tracks start in setup; make them live once everything is in place."
                    }
                    form method="post" {
                        div class="mb-3" {
                            label for="title" class="form-label" { "Title" }
                            input type="text" class="form-control" id="title"
                                name="title" placeholder="Best Hardware Hack" required;
                        }
                        button type="submit" class="btn btn-primary" { "Create track" }
                    }
                }
            })
            .render(),
    )
}

#[derive(Deserialize)]
pub struct CreateTrackForm {
    pub title: String,
}

pub async fn do_create_track(
    user: User,
    mut conn: Conn,
    Form(form): Form<CreateTrackForm>,
) -> StandardResponse {
    if let Err(e) = is_valid_name(&form.title) {
        return bad_request(error_page(&format!("Invalid title: {e}")));
    }

    let track = Track::create(&form.title, Some(&user.id), &mut *conn)?;

    see_other_ok(Redirect::to(&format!("/tracks/{}", track.id)))
}
