use axum::{
    extract::{Form, Path, State},
    response::Redirect,
};
use serde::Deserialize;
use tokio::sync::broadcast::Sender;

use crate::{
    auth::User,
    msg::{Msg, MsgContents, notify},
    state::Conn,
    tracks::{
        Track,
        criteria::{RatingScale, create_criterion, delete_criterion},
    },
    util_resp::{StandardResponse, bad_request, error_page, see_other_ok},
};

#[derive(Deserialize)]
pub struct CriterionForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Kept as text so that a malformed number gets a readable error.
    pub weight: String,
    pub scale: String,
}

pub async fn add_criterion(
    Path(track_id): Path<String>,
    State(tx): State<Sender<Msg>>,
    user: User,
    mut conn: Conn,
    Form(form): Form<CriterionForm>,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;

    let Ok(weight) = form.weight.trim().parse::<f64>() else {
        return bad_request(error_page("The weight should be a number."));
    };
    let scale = match form.scale.parse::<RatingScale>() {
        Ok(scale) => scale,
        Err(e) => return bad_request(error_page(&e)),
    };

    create_criterion(
        &track.id,
        &form.name,
        &form.description,
        weight,
        scale,
        &mut *conn,
    )?;
    notify(&tx, &track.id, MsgContents::RosterUpdated);

    see_other_ok(Redirect::to(&format!("/tracks/{}", track.id)))
}

pub async fn remove_criterion(
    Path((track_id, criterion_id)): Path<(String, String)>,
    State(tx): State<Sender<Msg>>,
    user: User,
    mut conn: Conn,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;

    let cells = delete_criterion(&criterion_id, &track.id, &mut *conn)?;
    // removing a criterion changes every score it was part of
    notify(
        &tx,
        &track.id,
        if cells > 0 {
            MsgContents::ScoresUpdated
        } else {
            MsgContents::RosterUpdated
        },
    );

    see_other_ok(Redirect::to(&format!("/tracks/{}", track.id)))
}
