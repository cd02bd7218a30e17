//! Persistent storage of score cells. A cell is keyed by
//! `(judge, participant, criterion)`; writing the same key twice replaces
//! the stored value.

use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use uuid::Uuid;

use crate::{
    schema::{score_cells, tracks},
    tracks::{
        Track,
        criteria::Criterion,
        participants::{Judge, Participant},
        scoring::{Actor, ScoreCell, ScoringError},
    },
};

pub(crate) fn fetch_track(
    track_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Track, ScoringError> {
    tracks::table
        .filter(tracks::id.eq(track_id))
        .first::<Track>(conn)
        .optional()?
        .ok_or(ScoringError::NotFound("track"))
}

/// Writes (or replaces) the value of a single cell.
///
/// The lock flags of an existing cell are left untouched. Judges cannot
/// write to a locked cell; organizers can. Nobody can write while the track
/// is not live.
#[tracing::instrument(skip(conn))]
pub fn upsert(
    judge_id: &str,
    participant_id: &str,
    criterion_id: &str,
    value: i64,
    actor: Actor,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<ScoreCell, ScoringError> {
    conn.transaction(|conn| {
        let judge = Judge::fetch(judge_id, conn)?;
        let track = fetch_track(&judge.track_id, conn)?;
        Participant::fetch(participant_id, &track.id, conn)?;
        Criterion::fetch(criterion_id, &track.id, conn)?;

        if !(0..=100).contains(&value) {
            return Err(ScoringError::validation(format!(
                "{value} is not between 0 and 100"
            )));
        }

        if !track.is_live() {
            return Err(ScoringError::NotLive(track.status()));
        }

        let now = chrono::Utc::now().naive_utc();
        let existing = score_cells::table
            .filter(
                score_cells::judge_id
                    .eq(judge_id)
                    .and(score_cells::participant_id.eq(participant_id))
                    .and(score_cells::criterion_id.eq(criterion_id)),
            )
            .first::<ScoreCell>(conn)
            .optional()?;

        let cell = match existing {
            Some(cell) if cell.locked && actor == Actor::Judge => {
                return Err(ScoringError::Locked);
            }
            Some(cell) => {
                diesel::update(
                    score_cells::table.filter(score_cells::id.eq(&cell.id)),
                )
                .set((
                    score_cells::value.eq(value),
                    score_cells::updated_at.eq(now),
                ))
                .execute(conn)?;
                ScoreCell {
                    value,
                    updated_at: now,
                    ..cell
                }
            }
            None => {
                let cell = ScoreCell {
                    id: Uuid::now_v7().to_string(),
                    track_id: track.id.clone(),
                    judge_id: judge_id.to_string(),
                    participant_id: participant_id.to_string(),
                    criterion_id: criterion_id.to_string(),
                    value,
                    locked: false,
                    unlock_requested: false,
                    updated_at: now,
                };
                diesel::insert_into(score_cells::table)
                    .values((
                        score_cells::id.eq(&cell.id),
                        score_cells::track_id.eq(&cell.track_id),
                        score_cells::judge_id.eq(&cell.judge_id),
                        score_cells::participant_id.eq(&cell.participant_id),
                        score_cells::criterion_id.eq(&cell.criterion_id),
                        score_cells::value.eq(cell.value),
                        score_cells::locked.eq(cell.locked),
                        score_cells::unlock_requested.eq(cell.unlock_requested),
                        score_cells::updated_at.eq(cell.updated_at),
                    ))
                    .execute(conn)?;
                cell
            }
        };

        tracing::info!(cell_id = %cell.id, value, ?actor, "score cell written");
        Ok(cell)
    })
}

pub fn get_by_participant(
    participant_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Vec<ScoreCell>, ScoringError> {
    Ok(score_cells::table
        .filter(score_cells::participant_id.eq(participant_id))
        .load::<ScoreCell>(conn)?)
}

pub fn get_by_judge(
    judge_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Vec<ScoreCell>, ScoringError> {
    Ok(score_cells::table
        .filter(score_cells::judge_id.eq(judge_id))
        .load::<ScoreCell>(conn)?)
}

pub fn get_by_track(
    track_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Vec<ScoreCell>, diesel::result::Error> {
    score_cells::table
        .filter(score_cells::track_id.eq(track_id))
        .load::<ScoreCell>(conn)
}

/// All the cells one judge has written for one participant.
pub fn get_ballot(
    judge_id: &str,
    participant_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Vec<ScoreCell>, ScoringError> {
    Ok(score_cells::table
        .filter(
            score_cells::judge_id
                .eq(judge_id)
                .and(score_cells::participant_id.eq(participant_id)),
        )
        .load::<ScoreCell>(conn)?)
}

/// Removes every cell of a (judge, participant) pair and returns how many
/// were removed. Removing an empty ballot is not an error.
#[tracing::instrument(skip(conn))]
pub fn delete_by_key(
    judge_id: &str,
    participant_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<usize, ScoringError> {
    let n = diesel::delete(
        score_cells::table.filter(
            score_cells::judge_id
                .eq(judge_id)
                .and(score_cells::participant_id.eq(participant_id)),
        ),
    )
    .execute(conn)?;
    tracing::info!(removed = n, "score cells deleted");
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::{ScoringFixture, memory_conn},
        tracks::TrackStatus,
    };

    #[test]
    fn writing_the_same_cell_twice_is_idempotent() {
        let mut conn = memory_conn();
        let f = ScoringFixture::design_and_function(&mut conn);

        let first =
            upsert(&f.j1, &f.p1, &f.design, 80, Actor::Judge, &mut conn)
                .unwrap();
        let second =
            upsert(&f.j1, &f.p1, &f.design, 80, Actor::Judge, &mut conn)
                .unwrap();

        assert_eq!(first.id, second.id);
        let cells = get_by_participant(&f.p1, &mut conn).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].value, 80);
    }

    #[test]
    fn rewriting_a_cell_replaces_its_value() {
        let mut conn = memory_conn();
        let f = ScoringFixture::design_and_function(&mut conn);

        upsert(&f.j1, &f.p1, &f.design, 10, Actor::Judge, &mut conn).unwrap();
        upsert(&f.j1, &f.p1, &f.design, 90, Actor::Judge, &mut conn).unwrap();

        let cells = get_by_judge(&f.j1, &mut conn).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].value, 90);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut conn = memory_conn();
        let f = ScoringFixture::design_and_function(&mut conn);

        for value in [-1, 101] {
            assert!(matches!(
                upsert(&f.j1, &f.p1, &f.design, value, Actor::Judge, &mut conn),
                Err(ScoringError::Validation(_))
            ));
        }
        assert!(get_by_participant(&f.p1, &mut conn).unwrap().is_empty());
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut conn = memory_conn();
        let f = ScoringFixture::design_and_function(&mut conn);

        assert!(matches!(
            upsert("nobody", &f.p1, &f.design, 50, Actor::Judge, &mut conn),
            Err(ScoringError::NotFound("judge"))
        ));
        assert!(matches!(
            upsert(&f.j1, "nobody", &f.design, 50, Actor::Judge, &mut conn),
            Err(ScoringError::NotFound("participant"))
        ));
        assert!(matches!(
            upsert(&f.j1, &f.p1, "nothing", 50, Actor::Judge, &mut conn),
            Err(ScoringError::NotFound("criterion"))
        ));
    }

    #[test]
    fn writes_are_refused_unless_the_track_is_live() {
        let mut conn = memory_conn();
        let f = ScoringFixture::design_and_function(&mut conn);
        upsert(&f.j1, &f.p1, &f.design, 80, Actor::Judge, &mut conn).unwrap();

        f.track(&mut conn)
            .set_status(TrackStatus::Ended, &mut conn)
            .unwrap();

        for actor in [Actor::Judge, Actor::Organizer] {
            assert!(matches!(
                upsert(&f.j1, &f.p1, &f.design, 20, actor, &mut conn),
                Err(ScoringError::NotLive(TrackStatus::Ended))
            ));
        }
        let cells = get_by_participant(&f.p1, &mut conn).unwrap();
        assert_eq!(cells[0].value, 80);
    }

    #[test]
    fn deleting_an_empty_ballot_is_a_no_op() {
        let mut conn = memory_conn();
        let f = ScoringFixture::design_and_function(&mut conn);

        assert_eq!(delete_by_key(&f.j1, &f.p1, &mut conn).unwrap(), 0);

        upsert(&f.j1, &f.p1, &f.design, 80, Actor::Judge, &mut conn).unwrap();
        upsert(&f.j1, &f.p1, &f.function, 50, Actor::Judge, &mut conn).unwrap();
        upsert(&f.j2, &f.p1, &f.design, 50, Actor::Judge, &mut conn).unwrap();

        assert_eq!(delete_by_key(&f.j1, &f.p1, &mut conn).unwrap(), 2);
        assert_eq!(get_by_participant(&f.p1, &mut conn).unwrap().len(), 1);
    }
}
