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
        participants::{
            create_judge, create_participant, delete_judge, delete_participant,
            regenerate_aliases,
        },
    },
    util_resp::{StandardResponse, see_other_ok},
};

fn back_to_overview(track: &Track) -> StandardResponse {
    see_other_ok(Redirect::to(&format!("/tracks/{}", track.id)))
}

#[derive(Deserialize)]
pub struct ParticipantForm {
    pub real_name: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub booth_code: String,
}

pub async fn add_participant(
    Path(track_id): Path<String>,
    State(tx): State<Sender<Msg>>,
    user: User,
    mut conn: Conn,
    Form(form): Form<ParticipantForm>,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;

    create_participant(
        &track.id,
        &form.real_name,
        form.alias.as_deref(),
        &form.booth_code,
        &mut *conn,
    )?;
    notify(&tx, &track.id, MsgContents::RosterUpdated);

    back_to_overview(&track)
}

pub async fn remove_participant(
    Path((track_id, participant_id)): Path<(String, String)>,
    State(tx): State<Sender<Msg>>,
    user: User,
    mut conn: Conn,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;

    delete_participant(&participant_id, &track.id, &mut *conn)?;
    notify(&tx, &track.id, MsgContents::RosterUpdated);

    back_to_overview(&track)
}

pub async fn regenerate_track_aliases(
    Path(track_id): Path<String>,
    State(tx): State<Sender<Msg>>,
    user: User,
    mut conn: Conn,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;

    regenerate_aliases(&track.id, &mut rand::rng(), &mut *conn)?;
    notify(&tx, &track.id, MsgContents::RosterUpdated);

    back_to_overview(&track)
}

#[derive(Deserialize)]
pub struct JudgeForm {
    pub name: String,
}

pub async fn add_judge(
    Path(track_id): Path<String>,
    State(tx): State<Sender<Msg>>,
    user: User,
    mut conn: Conn,
    Form(form): Form<JudgeForm>,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;

    create_judge(&track.id, &form.name, &mut *conn)?;
    notify(&tx, &track.id, MsgContents::RosterUpdated);

    back_to_overview(&track)
}

pub async fn remove_judge(
    Path((track_id, judge_id)): Path<(String, String)>,
    State(tx): State<Sender<Msg>>,
    user: User,
    mut conn: Conn,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;

    delete_judge(&judge_id, &track.id, &mut *conn)?;
    notify(&tx, &track.id, MsgContents::RosterUpdated);

    back_to_overview(&track)
}
