//! Pages for judges: the list of participants to visit, and the ballot for
//! each of them.

use axum::{
    extract::{Form, Path, State},
    response::Redirect,
};
use hypertext::prelude::*;
use serde::Deserialize;
use tokio::sync::broadcast::Sender;

use crate::{
    auth::JudgeSession,
    msg::{Msg, MsgContents, notify},
    state::Conn,
    template::Page,
    tracks::{
        Track,
        criteria::{Criterion, RatingScale},
        participants::Participant,
        scoring::{
            CATEGORICAL_LEVELS, Rating, ScoringError,
            ballot::{BallotEntry, submit_ballot},
            lock::{self, BallotState},
            store,
        },
    },
    util_resp::{
        StandardResponse, bad_request, error_page, see_other_ok, success,
    },
    widgets::{actions::PostButton, alert::WarningAlert},
};

/// Form fields carrying a rating are named `rating.<criterion id>`.
const RATING_PREFIX: &str = "rating.";

fn closed_notice(track: &Track) -> Option<String> {
    (!track.is_live()).then(|| {
        format!(
            "Scoring is closed for this track (status: {}). You can look at your ballots, but not change them.",
            track.status()
        )
    })
}

pub async fn judge_dashboard(
    session: JudgeSession,
    mut conn: Conn,
) -> StandardResponse {
    let judge = session.judge;
    let track = Track::fetch(&judge.track_id, &mut *conn)?;
    let participants = Participant::load_all(&track.id, &mut *conn)?;
    let cells = store::get_by_judge(&judge.id, &mut *conn)?;

    let rows = participants
        .iter()
        .map(|p| {
            let state = BallotState::of_cells(
                cells.iter().filter(|c| c.participant_id == p.id),
            );
            (p, state)
        })
        .collect::<Vec<_>>();
    let done = rows
        .iter()
        .filter(|(_, state)| !state.is_open())
        .count();
    let notice = closed_notice(&track);

    success(
        Page::new()
            .judge_name(&judge.name)
            .body(maud! {
                div class="container py-4" style="max-width: 40rem;" {
                    h1 class="h3" { (track.title) }
                    p class="text-muted" {
                        (done.to_string()) " of " (rows.len().to_string()) " ballots completed"
                    }
                    @if let Some(notice) = &notice {
                        WarningAlert msg=(notice);
                    }
                    form method="post" action="/judge/lookup" class="d-flex gap-2 mb-4" {
                        input type="text" class="form-control" name="booth_code"
                            placeholder="Booth code" autocomplete="off" required;
                        button type="submit" class="btn btn-primary" { "Go" }
                    }
                    div class="list-group" {
                        @for (participant, state) in &rows {
                            a class="list-group-item list-group-item-action d-flex justify-content-between align-items-center"
                                href=(format!("/judge/ballots/{}", participant.id)) {
                                div {
                                    (participant.real_name)
                                    div class="text-muted small" { "Booth " (participant.booth_code) }
                                }
                                span class="badge text-bg-secondary" { (state.label()) }
                            }
                        }
                    }
                }
            })
            .render(),
    )
}

#[derive(Deserialize)]
pub struct LookupForm {
    pub booth_code: String,
}

pub async fn lookup_booth(
    session: JudgeSession,
    mut conn: Conn,
    Form(form): Form<LookupForm>,
) -> StandardResponse {
    match Participant::of_booth_code(
        &form.booth_code,
        &session.judge.track_id,
        &mut *conn,
    ) {
        Ok(participant) => see_other_ok(Redirect::to(&format!(
            "/judge/ballots/{}",
            participant.id
        ))),
        Err(ScoringError::NotFound(_)) => bad_request(error_page(&format!(
            "No participant in your track has the booth code {}.",
            form.booth_code.trim()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// A single criterion's input on the ballot form.
struct RatingInput<'r> {
    criterion: &'r Criterion,
    /// As entered, i.e. a level for categorical criteria.
    current: Option<i64>,
    disabled: bool,
}

impl Renderable for RatingInput<'_> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        let name = format!("{RATING_PREFIX}{}", self.criterion.id);
        let current = self.current;
        let disabled = self.disabled;
        let value = current.map(|v| v.to_string()).unwrap_or_default();
        let levels = maud! {
            option value="" { "-" }
            @for level in 1..=CATEGORICAL_LEVELS {
                @if current == Some(level) {
                    option value=(level.to_string()) selected { (level.to_string()) }
                } @else {
                    option value=(level.to_string()) { (level.to_string()) }
                }
            }
        };
        maud! {
            div class="mb-3" {
                label for=(name) class="form-label fw-semibold" {
                    (self.criterion.name)
                    span class="text-muted fw-normal" {
                        " (" (self.criterion.weight_decimal().to_string()) "%)"
                    }
                }
                @if !self.criterion.description.is_empty() {
                    div class="form-text mt-0 mb-1" { (self.criterion.description) }
                }
                @match self.criterion.scale() {
                    RatingScale::Continuous => {
                        @if disabled {
                            input type="number" class="form-control" id=(name) name=(name)
                                min="0" max="100" value=(value) disabled;
                        } @else {
                            input type="number" class="form-control" id=(name) name=(name)
                                min="0" max="100" placeholder="0 to 100" value=(value);
                        }
                    }
                    RatingScale::Categorical => {
                        @if disabled {
                            select class="form-select" id=(name) name=(name) disabled {
                                (levels)
                            }
                        } @else {
                            select class="form-select" id=(name) name=(name) {
                                (levels)
                            }
                        }
                    }
                }
            }
        }
        .render_to(buffer);
    }
}

pub async fn ballot_page(
    Path(participant_id): Path<String>,
    session: JudgeSession,
    mut conn: Conn,
) -> StandardResponse {
    let judge = session.judge;
    let track = Track::fetch(&judge.track_id, &mut *conn)?;
    let participant =
        Participant::fetch(&participant_id, &track.id, &mut *conn)?;
    let criteria = Criterion::load_all(&track.id, &mut *conn)?;
    let cells = store::get_ballot(&judge.id, &participant.id, &mut *conn)?;

    let state = BallotState::of_cells(&cells);
    let inputs = criteria
        .iter()
        .map(|criterion| RatingInput {
            criterion,
            current: cells
                .iter()
                .find(|c| c.criterion_id == criterion.id)
                .map(|c| Rating::from_stored(criterion.scale(), c.value).raw()),
            disabled: !state.is_open() || !track.is_live(),
        })
        .collect::<Vec<_>>();
    let notice = closed_notice(&track);
    let editable = state.is_open() && track.is_live();
    let action = format!("/judge/ballots/{}", participant.id);
    let no_criteria = criteria.is_empty();

    success(
        Page::new()
            .judge_name(&judge.name)
            .body(maud! {
                div class="container py-4" style="max-width: 40rem;" {
                    a href="/judge" { "All participants" }
                    h1 class="h3 mt-2" { (participant.real_name) }
                    p class="text-muted" {
                        "Booth " (participant.booth_code) " · " (state.label())
                    }
                    @if let Some(notice) = &notice {
                        WarningAlert msg=(notice);
                    }
                    @if no_criteria {
                        p { "No criteria have been set up for this track yet." }
                    } @else {
                        form method="post" action=(action) {
                            @for input in &inputs {
                                (input)
                            }
                            @if editable {
                                div class="d-flex gap-2" {
                                    button type="submit" name="action" value="draft"
                                        class="btn btn-outline-primary" { "Save draft" }
                                    button type="submit" name="action" value="final"
                                        class="btn btn-primary" { "Submit final" }
                                }
                            }
                        }
                    }
                    @if !state.is_open() {
                        div class="mt-4" {
                            @if state.unlock_requested() {
                                p class="text-muted" {
                                    "You have asked the organizers to unlock this ballot."
                                }
                            } @else if track.is_live() {
                                p class="text-muted" {
                                    "This ballot has been submitted. If you need to change it, ask the organizers to unlock it."
                                }
                                PostButton
                                    action=(&format!("{action}/request_unlock"))
                                    label="Request unlock"
                                    class="btn-outline-secondary";
                            }
                        }
                    }
                }
            })
            .render(),
    )
}

/// Reads the ballot form: every non-empty `rating.*` field becomes an entry,
/// and the `action` field says whether this is a draft or the final ballot.
fn parse_ballot_form(
    fields: &[(String, String)],
) -> Result<(Vec<BallotEntry>, bool), String> {
    let mut entries = Vec::new();
    let mut finalize = false;

    for (name, value) in fields {
        if name == "action" {
            finalize = value == "final";
            continue;
        }
        let Some(criterion_id) = name.strip_prefix(RATING_PREFIX) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let raw = value
            .parse::<i64>()
            .map_err(|_| format!("`{value}` is not a whole number"))?;
        entries.push(BallotEntry {
            criterion_id: criterion_id.to_string(),
            raw,
        });
    }

    Ok((entries, finalize))
}

pub async fn do_submit_ballot(
    Path(participant_id): Path<String>,
    State(tx): State<Sender<Msg>>,
    session: JudgeSession,
    mut conn: Conn,
    Form(fields): Form<Vec<(String, String)>>,
) -> StandardResponse {
    let judge = session.judge;
    let (entries, finalize) = match parse_ballot_form(&fields) {
        Ok(parsed) => parsed,
        Err(e) => return bad_request(error_page(&e)),
    };

    submit_ballot(&judge, &participant_id, &entries, finalize, &mut *conn)?;
    notify(&tx, &judge.track_id, MsgContents::ScoresUpdated);

    if finalize {
        see_other_ok(Redirect::to("/judge"))
    } else {
        see_other_ok(Redirect::to(&format!("/judge/ballots/{participant_id}")))
    }
}

pub async fn request_ballot_unlock(
    Path(participant_id): Path<String>,
    State(tx): State<Sender<Msg>>,
    session: JudgeSession,
    mut conn: Conn,
) -> StandardResponse {
    let judge = session.judge;
    let participant =
        Participant::fetch(&participant_id, &judge.track_id, &mut *conn)?;

    lock::request_unlock(&judge.id, &participant.id, &mut *conn)?;
    notify(&tx, &judge.track_id, MsgContents::ScoresUpdated);

    see_other_ok(Redirect::to(&format!("/judge/ballots/{}", participant.id)))
}

#[cfg(test)]
mod tests {
    use super::parse_ballot_form;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn blank_ratings_are_left_out_of_drafts() {
        let (entries, finalize) = parse_ballot_form(&fields(&[
            ("rating.design", "70"),
            ("rating.function", " "),
            ("action", "draft"),
        ]))
        .unwrap();

        assert!(!finalize);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].criterion_id, "design");
        assert_eq!(entries[0].raw, 70);
    }

    #[test]
    fn final_action_finalizes() {
        let (_, finalize) = parse_ballot_form(&fields(&[
            ("rating.design", "4"),
            ("action", "final"),
        ]))
        .unwrap();
        assert!(finalize);
    }

    #[test]
    fn non_numeric_ratings_are_rejected() {
        assert!(
            parse_ballot_form(&fields(&[("rating.design", "seven")])).is_err()
        );
    }

    #[test]
    fn unrelated_fields_are_ignored() {
        let (entries, finalize) =
            parse_ballot_form(&fields(&[("csrf", "abc")])).unwrap();
        assert!(entries.is_empty());
        assert!(!finalize);
    }
}
