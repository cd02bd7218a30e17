//! Organizer views of a track's scores: the tabulation matrix, the detail
//! behind each cell of it, lock management and the exports.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Form, Path, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use diesel::{connection::LoadConnection, sqlite::Sqlite};
use hypertext::prelude::*;
use serde::Deserialize;
use tokio::sync::broadcast::Sender;

use crate::{
    auth::User,
    config::Settings,
    msg::{Msg, MsgContents, notify},
    state::{Conn, DbPool},
    template::Page,
    tracks::{
        Track,
        participants::{Judge, Participant},
        scoring::{
            Actor, ScoringError, display_round, export,
            lock::{self, BallotState},
            matrix::{CellBreakdown, TabulationMatrix},
            snapshot::TrackSnapshot,
            store,
        },
    },
    util_resp::{
        FailureResponse, StandardResponse, bad_request, error_page,
        see_other_ok, success,
    },
    widgets::{actions::PostButton, alert::WarningAlert},
};

/// Loads a fresh snapshot of the track, after checking that `user` organizes
/// it.
///
/// The request's connection is given back to the pool before the snapshot is
/// loaded, as the concurrent load takes several connections of its own.
async fn organizer_snapshot(
    track_id: &str,
    user: &User,
    mut conn: Conn,
    pool: &DbPool,
) -> Result<Arc<TrackSnapshot>, FailureResponse> {
    let track = Track::fetch(track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;
    drop(conn);
    TrackSnapshot::load_concurrently(pool, &track.id).await
}

/// Checks that the judge and participant of a ballot both belong to the
/// track.
fn ballot_of_track(
    track: &Track,
    judge_id: &str,
    participant_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<(Judge, Participant), ScoringError> {
    let judge = Judge::fetch(judge_id, conn)?;
    if judge.track_id != track.id {
        return Err(ScoringError::NotFound("judge"));
    }
    let participant = Participant::fetch(participant_id, &track.id, conn)?;
    Ok((judge, participant))
}

fn state_badge(state: BallotState) -> &'static str {
    match state {
        BallotState::Empty => "text-bg-light",
        BallotState::Draft => "text-bg-warning",
        BallotState::Completed {
            unlock_requested: false,
        } => "text-bg-success",
        BallotState::Completed {
            unlock_requested: true,
        } => "text-bg-danger",
    }
}

struct MatrixTable<'r> {
    matrix: &'r TabulationMatrix,
}

impl Renderable for MatrixTable<'_> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        let matrix = self.matrix;
        let pending = matrix.pending_requests();
        maud! {
            div {
                @if !matrix.balanced {
                    WarningAlert msg=(format!(
                        "The criteria weights add up to {}, not 100.",
                        matrix.weights_total
                    ));
                }
                @if pending > 0 {
                    WarningAlert msg=(format!(
                        "{pending} ballot(s) have an outstanding unlock request."
                    ));
                }
                div class="table-responsive" {
                    table class="table table-sm table-hover align-middle" {
                        thead {
                            tr {
                                th { "Rank" }
                                th { "Team" }
                                th { "Booth" }
                                @for judge in &matrix.judges {
                                    th { (judge.name) }
                                }
                                th { "Variance" }
                                th { "Final score" }
                            }
                        }
                        tbody {
                            @for row in &matrix.rows {
                                tr class=(if row.unlock_requested { "table-danger" } else { "" }) {
                                    td { (row.position_label) }
                                    td {
                                        (row.real_name)
                                        @if let Some(alias) = &row.alias {
                                            div class="text-muted small" { (alias) }
                                        }
                                    }
                                    td { code { (row.booth_code) } }
                                    @for cell in &row.cells {
                                        td {
                                            a href=(format!(
                                                "/tracks/{}/tabulation/{}/{}",
                                                matrix.track_id, cell.judge_id, row.participant_id
                                            )) class="text-decoration-none" {
                                                @if let Some(subtotal) = cell.subtotal {
                                                    (display_round(subtotal).to_string()) " "
                                                } @else {
                                                    "- "
                                                }
                                                span class=(format!("badge {}", state_badge(cell.state))) {
                                                    (cell.state.label())
                                                }
                                            }
                                        }
                                    }
                                    td { (display_round(row.variance).to_string()) }
                                    td {
                                        strong { (display_round(row.final_score).to_string()) }
                                        " (" (row.judge_count.to_string()) " judges)"
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        .render_to(buffer);
    }
}

pub async fn tabulation_page(
    Path(track_id): Path<String>,
    State(pool): State<DbPool>,
    State(settings): State<Arc<Settings>>,
    user: User,
    conn: Conn,
) -> StandardResponse {
    let snapshot =
        organizer_snapshot(&track_id, &user, conn, &pool).await?;
    let matrix = snapshot.matrix();
    let base = format!("/tracks/{}", snapshot.track.id);

    success(
        Page::new()
            .user(user)
            .track(snapshot.track.clone())
            .body(maud! {
                div class="container-fluid py-4" {
                    h1 { "Tabulation" }
                    p class="text-muted" {
                        "Click a cell to see the ratings behind it. This table refreshes itself."
                    }
                    div hx-get=(format!("{base}/tabulation/fragment"))
                        hx-trigger=(format!("every {}s", settings.poll_interval_secs))
                        hx-swap="innerHTML" {
                        MatrixTable matrix=(&matrix);
                    }
                }
            })
            .render(),
    )
}

/// Just the matrix table, for the tabulation page to poll.
pub async fn tabulation_fragment(
    Path(track_id): Path<String>,
    State(pool): State<DbPool>,
    user: User,
    conn: Conn,
) -> StandardResponse {
    let snapshot =
        organizer_snapshot(&track_id, &user, conn, &pool).await?;
    let matrix = snapshot.matrix();

    success(maud! { MatrixTable matrix=(&matrix); }.render())
}

pub async fn tabulation_json(
    Path(track_id): Path<String>,
    State(pool): State<DbPool>,
    user: User,
    conn: Conn,
) -> Result<Json<TabulationMatrix>, FailureResponse> {
    let snapshot =
        organizer_snapshot(&track_id, &user, conn, &pool).await?;
    Ok(Json(snapshot.matrix()))
}

pub async fn cell_breakdown(
    Path((track_id, judge_id, participant_id)): Path<(String, String, String)>,
    State(pool): State<DbPool>,
    user: User,
    conn: Conn,
) -> StandardResponse {
    let snapshot =
        organizer_snapshot(&track_id, &user, conn, &pool).await?;
    let breakdown = CellBreakdown::build(&snapshot, &judge_id, &participant_id)
        .ok_or(FailureResponse::NotFound(()))?;

    let base = format!(
        "/tracks/{}/tabulation/{}/{}",
        snapshot.track.id, breakdown.judge_id, breakdown.participant_id
    );
    let state = breakdown.state;

    success(
        Page::new()
            .user(user)
            .track(snapshot.track.clone())
            .body(maud! {
                div class="container py-4" {
                    a href=(format!("/tracks/{}/tabulation", snapshot.track.id)) {
                        "Back to the tabulation"
                    }
                    h1 class="h3 mt-2" {
                        (breakdown.judge_name) " on " (breakdown.participant_name)
                    }
                    p {
                        span class=(format!("badge {}", state_badge(state))) { (state.label()) }
                    }
                    table class="table table-sm" {
                        thead {
                            tr {
                                th { "Criterion" }
                                th { "Weight" }
                                th { "Value" }
                                th { "Contribution" }
                            }
                        }
                        tbody {
                            @for line in &breakdown.lines {
                                tr {
                                    td { (line.criterion) }
                                    td { (line.weight.to_string()) "%" }
                                    td {
                                        @if let Some(value) = line.value {
                                            (value.to_string())
                                            @if line.locked { " (locked)" }
                                        } @else {
                                            "-"
                                        }
                                    }
                                    td {
                                        @if let Some(contribution) = line.contribution {
                                            (display_round(contribution).to_string())
                                        } @else {
                                            "-"
                                        }
                                    }
                                }
                            }
                            tr class="table-light" {
                                td { "Subtotal" }
                                td {}
                                td {}
                                td { strong { (display_round(breakdown.subtotal).to_string()) } }
                            }
                        }
                    }

                    div class="d-flex gap-2 mb-4" {
                        @if state.unlock_requested() {
                            PostButton action=(&format!("{base}/unlock"))
                                label="Grant unlock request"
                                class="btn-success";
                        }
                        @if !state.is_open() {
                            PostButton action=(&format!("{base}/force_unlock"))
                                label="Force unlock"
                                class="btn-outline-warning";
                        }
                        @if state != BallotState::Empty {
                            PostButton action=(&format!("{base}/delete"))
                                label="Delete these scores"
                                class="btn-outline-danger";
                        }
                    }

                    h2 class="h5" { "Override a rating" }
                    p class="text-muted small" {
                        "Overrides are stored on the 0 to 100 scale and do not change the lock state."
                    }
                    form method="post" action=(format!("{base}/override")) class="row g-2" {
                        div class="col-md-6" {
                            select class="form-select" name="criterion_id" {
                                @for line in &breakdown.lines {
                                    option value=(line.criterion_id) { (line.criterion) }
                                }
                            }
                        }
                        div class="col-md-3" {
                            input type="number" class="form-control" name="value"
                                min="0" max="100" required;
                        }
                        div class="col-md-3" {
                            button type="submit" class="btn btn-primary" { "Save" }
                        }
                    }
                }
            })
            .render(),
    )
}

type BallotPath = Path<(String, String, String)>;

fn back_to_cell(track: &Track, judge: &Judge, participant: &Participant) -> Redirect {
    Redirect::to(&format!(
        "/tracks/{}/tabulation/{}/{}",
        track.id, judge.id, participant.id
    ))
}

pub async fn grant_unlock_ballot(
    Path((track_id, judge_id, participant_id)): BallotPath,
    State(tx): State<Sender<Msg>>,
    user: User,
    mut conn: Conn,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;
    let (judge, participant) =
        ballot_of_track(&track, &judge_id, &participant_id, &mut *conn)?;

    lock::grant_unlock(&judge.id, &participant.id, &mut *conn)?;
    notify(&tx, &track.id, MsgContents::ScoresUpdated);

    see_other_ok(back_to_cell(&track, &judge, &participant))
}

pub async fn force_unlock_ballot(
    Path((track_id, judge_id, participant_id)): BallotPath,
    State(tx): State<Sender<Msg>>,
    user: User,
    mut conn: Conn,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;
    let (judge, participant) =
        ballot_of_track(&track, &judge_id, &participant_id, &mut *conn)?;

    lock::force_unlock(&judge.id, &participant.id, &mut *conn)?;
    notify(&tx, &track.id, MsgContents::ScoresUpdated);

    see_other_ok(back_to_cell(&track, &judge, &participant))
}

pub async fn delete_cells(
    Path((track_id, judge_id, participant_id)): BallotPath,
    State(tx): State<Sender<Msg>>,
    user: User,
    mut conn: Conn,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;
    let (judge, participant) =
        ballot_of_track(&track, &judge_id, &participant_id, &mut *conn)?;

    lock::delete_ballot(&judge.id, &participant.id, &mut *conn)?;
    notify(&tx, &track.id, MsgContents::ScoresUpdated);

    see_other_ok(Redirect::to(&format!("/tracks/{}/tabulation", track.id)))
}

#[derive(Deserialize)]
pub struct OverrideForm {
    pub criterion_id: String,
    pub value: String,
}

pub async fn override_cell(
    Path((track_id, judge_id, participant_id)): BallotPath,
    State(tx): State<Sender<Msg>>,
    user: User,
    mut conn: Conn,
    Form(form): Form<OverrideForm>,
) -> StandardResponse {
    let track = Track::fetch(&track_id, &mut *conn)?;
    track.check_user_is_organizer(&user.id, &mut *conn)?;
    let (judge, participant) =
        ballot_of_track(&track, &judge_id, &participant_id, &mut *conn)?;

    let Ok(value) = form.value.trim().parse::<i64>() else {
        return bad_request(error_page("The rating should be a whole number."));
    };
    store::upsert(
        &judge.id,
        &participant.id,
        &form.criterion_id,
        value,
        Actor::Organizer,
        &mut *conn,
    )?;
    tracing::info!(
        track_id = %track.id,
        user_id = %user.id,
        "organizer overrode a rating"
    );
    notify(&tx, &track.id, MsgContents::ScoresUpdated);

    see_other_ok(back_to_cell(&track, &judge, &participant))
}

fn csv_response(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

pub async fn rankings_export(
    Path(track_id): Path<String>,
    State(pool): State<DbPool>,
    user: User,
    conn: Conn,
) -> Result<Response, FailureResponse> {
    let snapshot =
        organizer_snapshot(&track_id, &user, conn, &pool).await?;
    let csv = export::rankings_csv(&snapshot, &snapshot.recompute())?;
    Ok(csv_response("rankings.csv", csv))
}

pub async fn matrix_export(
    Path(track_id): Path<String>,
    State(pool): State<DbPool>,
    user: User,
    conn: Conn,
) -> Result<Response, FailureResponse> {
    let snapshot =
        organizer_snapshot(&track_id, &user, conn, &pool).await?;
    let csv = export::matrix_csv(&snapshot)?;
    Ok(csv_response("matrix.csv", csv))
}

pub async fn audit_export(
    Path(track_id): Path<String>,
    State(pool): State<DbPool>,
    user: User,
    conn: Conn,
) -> Result<Response, FailureResponse> {
    let snapshot =
        organizer_snapshot(&track_id, &user, conn, &pool).await?;
    let csv = export::audit_csv(&snapshot)?;
    Ok(csv_response("audit.csv", csv))
}
