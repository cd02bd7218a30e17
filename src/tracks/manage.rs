//! The organizer's overview of a track, and the track-wide controls
//! (lifecycle status, name visibility and deletion).

use axum::{
    extract::{Form, Path, State},
    response::Redirect,
};
use hypertext::prelude::*;
use serde::Deserialize;
use tokio::sync::broadcast::Sender;

use crate::{
    auth::User,
    msg::{Msg, MsgContents, notify},
    state::Conn,
    template::Page,
    tracks::{
        Track, TrackStatus,
        criteria::{Criterion, is_balanced, weights_total},
        participants::TrackRoster,
    },
    util_resp::{StandardResponse, bad_request, error_page, see_other_ok, success},
    widgets::{
        actions::{Actions, PostButton},
        alert::WarningAlert,
        non_public::NonPublic,
    },
};

pub async fn track_overview(
    Path(track_id): Path<String>,
    user: User,
    mut conn: Conn,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;

    let roster = TrackRoster::load(&track.id, &mut *conn)?;
    let criteria = Criterion::load_all(&track.id, &mut *conn)?;
    let total = weights_total(&criteria);
    let balanced = is_balanced(&criteria);

    let base = format!("/tracks/{}", track.id);
    let links = [
        (format!("{base}/tabulation"), "Tabulation"),
        (format!("{base}/leaderboard"), "Public leaderboard"),
        (format!("{base}/export/rankings.csv"), "Rankings (CSV)"),
        (format!("{base}/export/matrix.csv"), "Matrix (CSV)"),
        (format!("{base}/export/audit.csv"), "Audit log (CSV)"),
    ];
    let status = track.status();
    let other_statuses: Vec<TrackStatus> =
        [TrackStatus::Setup, TrackStatus::Live, TrackStatus::Ended]
            .into_iter()
            .filter(|s| *s != status)
            .collect();
    let base = base.as_str();
    let title = track.title.clone();
    let revealed = track.names_revealed;

    let controls = maud! {
        div class="d-flex flex-wrap gap-2 align-items-center" {
            span { "Status: " strong { (status.as_str()) } }
            @for next in &other_statuses {
                form method="post" action=(format!("{base}/status")) class="d-inline" {
                    input type="hidden" name="status" value=(next.as_str());
                    button type="submit" class="btn btn-sm btn-outline-primary" {
                        "Set " (next.as_str())
                    }
                }
            }
            form method="post" action=(format!("{base}/reveal")) class="d-inline" {
                input type="hidden" name="revealed"
                    value=(if revealed { "false" } else { "true" });
                button type="submit" class="btn btn-sm btn-outline-secondary" {
                    @if revealed { "Hide real names" } @else { "Reveal real names" }
                }
            }
            PostButton
                action=(&format!("{base}/delete"))
                label="Delete track"
                class="btn-outline-danger";
        }
    };

    let body = maud! {
        div {
            h1 { (title) }
            (controls)
            Actions options=(&links);

            @if !balanced {
                WarningAlert msg=(format!(
                    "The criteria weights add up to {total}, not 100. Scores are still computed, but they are not out of 100."
                ));
            }

            h2 class="h4 mt-4" { "Criteria" }
            table class="table table-sm" {
                thead { tr { th { "Name" } th { "Weight" } th { "Scale" } th {} } }
                tbody {
                    @for criterion in &criteria {
                        tr {
                            td {
                                (criterion.name)
                                @if !criterion.description.is_empty() {
                                    div class="text-muted small" { (criterion.description) }
                                }
                            }
                            td { (criterion.weight_decimal().to_string()) "%" }
                            td { (criterion.scale().as_str()) }
                            td {
                                PostButton
                                    action=(&format!("{base}/criteria/{}/delete", criterion.id))
                                    label="Delete"
                                    class="btn-outline-danger";
                            }
                        }
                    }
                    tr class="table-light" {
                        td { "Total" }
                        td { (total.to_string()) "%" }
                        td {}
                        td {}
                    }
                }
            }
            form method="post" action=(format!("{base}/criteria")) class="row g-2 mb-4" {
                div class="col-md-3" {
                    input type="text" class="form-control" name="name" placeholder="Name" required;
                }
                div class="col-md-4" {
                    input type="text" class="form-control" name="description" placeholder="Description";
                }
                div class="col-md-2" {
                    input type="number" class="form-control" name="weight" placeholder="Weight"
                        min="0" max="100" step="any" required;
                }
                div class="col-md-2" {
                    select class="form-select" name="scale" {
                        option value="continuous" { "0 to 100" }
                        option value="categorical" { "1 to 5" }
                    }
                }
                div class="col-md-1" {
                    button type="submit" class="btn btn-primary" { "Add" }
                }
            }

            h2 class="h4 mt-4" { "Participants" }
            table class="table table-sm" {
                thead { tr { th { "#" } th { "Name" } th { "Alias" } th { "Booth" } th {} } }
                tbody {
                    @for participant in roster.participants.values() {
                        tr {
                            td { (participant.number.to_string()) }
                            td { (participant.real_name) }
                            td { (participant.anonymous_label()) }
                            td { code { (participant.booth_code) } }
                            td {
                                PostButton
                                    action=(&format!("{base}/participants/{}/delete", participant.id))
                                    label="Delete"
                                    class="btn-outline-danger";
                            }
                        }
                    }
                }
            }
            form method="post" action=(format!("{base}/participants")) class="row g-2 mb-2" {
                div class="col-md-4" {
                    input type="text" class="form-control" name="real_name" placeholder="Team name" required;
                }
                div class="col-md-4" {
                    input type="text" class="form-control" name="alias" placeholder="Alias (optional)";
                }
                div class="col-md-3" {
                    input type="text" class="form-control" name="booth_code" placeholder="Booth code" required;
                }
                div class="col-md-1" {
                    button type="submit" class="btn btn-primary" { "Add" }
                }
            }
            PostButton
                action=(&format!("{base}/participants/aliases"))
                label="Generate new aliases for everyone"
                class="btn-outline-secondary";

            h2 class="h4 mt-4" { "Judges" }
            table class="table table-sm" {
                thead { tr { th { "Name" } th { "PIN" } th {} } }
                tbody {
                    @for judge in roster.judges.values() {
                        tr {
                            td { (judge.name) }
                            td { code { (judge.pin) } }
                            td {
                                PostButton
                                    action=(&format!("{base}/judges/{}/delete", judge.id))
                                    label="Delete"
                                    class="btn-outline-danger";
                            }
                        }
                    }
                }
            }
            form method="post" action=(format!("{base}/judges")) class="row g-2 mb-4" {
                div class="col-md-6" {
                    input type="text" class="form-control" name="name" placeholder="Judge name" required;
                }
                div class="col-md-2" {
                    button type="submit" class="btn btn-primary" { "Add judge" }
                }
            }
        }
    };

    let in_setup = status == TrackStatus::Setup;
    let page = maud! {
        div class="container py-4" {
            @if in_setup {
                NonPublic title="Track setup" {
                    (body)
                }
            } @else {
                (body)
            }
        }
    };

    success(Page::new().user(user).track(track).body(page).render())
}

#[derive(Deserialize)]
pub struct StatusForm {
    pub status: String,
}

pub async fn set_track_status(
    Path(track_id): Path<String>,
    State(tx): State<Sender<Msg>>,
    user: User,
    mut conn: Conn,
    Form(form): Form<StatusForm>,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;

    let status = match form.status.parse::<TrackStatus>() {
        Ok(status) => status,
        Err(e) => return bad_request(error_page(&e)),
    };
    track.set_status(status, &mut *conn)?;
    notify(&tx, &track.id, MsgContents::TrackUpdated);

    see_other_ok(Redirect::to(&format!("/tracks/{}", track.id)))
}

#[derive(Deserialize)]
pub struct RevealForm {
    pub revealed: bool,
}

pub async fn set_names_revealed(
    Path(track_id): Path<String>,
    State(tx): State<Sender<Msg>>,
    user: User,
    mut conn: Conn,
    Form(form): Form<RevealForm>,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;

    track.set_names_revealed(form.revealed, &mut *conn)?;
    notify(&tx, &track.id, MsgContents::TrackUpdated);

    see_other_ok(Redirect::to(&format!("/tracks/{}", track.id)))
}

pub async fn remove_track(
    Path(track_id): Path<String>,
    State(tx): State<Sender<Msg>>,
    user: User,
    mut conn: Conn,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;

    let id = track.id.clone();
    track.delete(&mut *conn)?;
    notify(&tx, &id, MsgContents::TrackUpdated);

    see_other_ok(Redirect::to("/"))
}
