//! The lock state of a judge's ballot for a participant.
//!
//! A ballot is the set of cells one judge has written for one participant.
//! Its state is derived from the flags of those cells; there is no separate
//! row recording it.
//!
//! ```text
//!   Empty --draft--> Draft --final--> Completed --request--> Completed(requested)
//!     ^                ^                  |                        |
//!     |                +-- grant/force ---+------------------------+
//!     +------------------------------ delete -------------------------+
//! ```

use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use serde::Serialize;

use crate::{
    schema::score_cells,
    tracks::{
        participants::Judge,
        scoring::{ScoreCell, ScoringError, store},
    },
};

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BallotState {
    /// No cells have been written.
    Empty,
    /// Cells exist and none of them are locked.
    Draft,
    /// The judge has submitted the ballot as final.
    Completed { unlock_requested: bool },
}

impl BallotState {
    pub fn of_cells<'a>(
        cells: impl IntoIterator<Item = &'a ScoreCell>,
    ) -> BallotState {
        let mut state = BallotState::Empty;
        for cell in cells {
            state = match (state, cell.locked) {
                (BallotState::Completed { unlock_requested }, _) => {
                    BallotState::Completed {
                        unlock_requested: unlock_requested
                            || cell.unlock_requested,
                    }
                }
                (_, true) => BallotState::Completed {
                    unlock_requested: cell.unlock_requested,
                },
                (_, false) => BallotState::Draft,
            };
        }
        state
    }

    /// Whether the judge may still edit the ballot.
    pub fn is_open(&self) -> bool {
        !matches!(self, BallotState::Completed { .. })
    }

    pub fn unlock_requested(&self) -> bool {
        matches!(
            self,
            BallotState::Completed {
                unlock_requested: true
            }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            BallotState::Empty => "pending",
            BallotState::Draft => "in progress",
            BallotState::Completed {
                unlock_requested: false,
            } => "completed",
            BallotState::Completed {
                unlock_requested: true,
            } => "unlock requested",
        }
    }
}

fn pair_filter<'a>(
    judge_id: &'a str,
    participant_id: &'a str,
) -> diesel::dsl::Filter<
    score_cells::table,
    diesel::dsl::And<
        diesel::dsl::Eq<score_cells::judge_id, &'a str>,
        diesel::dsl::Eq<score_cells::participant_id, &'a str>,
    >,
> {
    score_cells::table.filter(
        score_cells::judge_id
            .eq(judge_id)
            .and(score_cells::participant_id.eq(participant_id)),
    )
}

fn current_state(
    judge_id: &str,
    participant_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<BallotState, ScoringError> {
    Ok(BallotState::of_cells(&store::get_ballot(
        judge_id,
        participant_id,
        conn,
    )?))
}

/// Lock flags only change while the judge's track is live.
fn ensure_live(
    judge_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<(), ScoringError> {
    let judge = Judge::fetch(judge_id, conn)?;
    let track = store::fetch_track(&judge.track_id, conn)?;
    if track.is_live() {
        Ok(())
    } else {
        Err(ScoringError::NotLive(track.status()))
    }
}

/// Locks every cell of the ballot. Called when a judge submits it as final.
#[tracing::instrument(skip(conn))]
pub fn lock_ballot(
    judge_id: &str,
    participant_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<BallotState, ScoringError> {
    let n = diesel::update(pair_filter(judge_id, participant_id))
        .set(score_cells::locked.eq(true))
        .execute(conn)?;
    tracing::info!(cells = n, "ballot locked");
    current_state(judge_id, participant_id, conn)
}

/// Raises the unlock request flag on a completed ballot. Ballots which are
/// still open have nothing to unlock, so this does nothing for them.
#[tracing::instrument(skip(conn))]
pub fn request_unlock(
    judge_id: &str,
    participant_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<BallotState, ScoringError> {
    conn.transaction(|conn| {
        ensure_live(judge_id, conn)?;
        let state = current_state(judge_id, participant_id, conn)?;
        if state.is_open() {
            return Ok(state);
        }

        diesel::update(pair_filter(judge_id, participant_id))
            .set(score_cells::unlock_requested.eq(true))
            .execute(conn)?;
        tracing::info!("unlock requested");
        Ok(BallotState::Completed {
            unlock_requested: true,
        })
    })
}

fn clear_flags(
    judge_id: &str,
    participant_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<BallotState, ScoringError> {
    diesel::update(pair_filter(judge_id, participant_id))
        .set((
            score_cells::locked.eq(false),
            score_cells::unlock_requested.eq(false),
        ))
        .execute(conn)?;
    Ok(BallotState::Draft)
}

/// Reopens a ballot whose judge has asked for it to be unlocked.
#[tracing::instrument(skip(conn))]
pub fn grant_unlock(
    judge_id: &str,
    participant_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<BallotState, ScoringError> {
    conn.transaction(|conn| {
        ensure_live(judge_id, conn)?;
        match current_state(judge_id, participant_id, conn)? {
            state @ (BallotState::Empty | BallotState::Draft) => Ok(state),
            BallotState::Completed {
                unlock_requested: false,
            } => Err(ScoringError::validation(
                "the judge has not requested an unlock (use force unlock instead)",
            )),
            BallotState::Completed {
                unlock_requested: true,
            } => {
                let state = clear_flags(judge_id, participant_id, conn)?;
                tracing::info!("unlock granted");
                Ok(state)
            }
        }
    })
}

/// Reopens a completed ballot whether or not the judge asked for it.
#[tracing::instrument(skip(conn))]
pub fn force_unlock(
    judge_id: &str,
    participant_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<BallotState, ScoringError> {
    conn.transaction(|conn| {
        ensure_live(judge_id, conn)?;
        let state = current_state(judge_id, participant_id, conn)?;
        if state.is_open() {
            return Ok(state);
        }
        let state = clear_flags(judge_id, participant_id, conn)?;
        tracing::info!("ballot force unlocked");
        Ok(state)
    })
}

/// Removes the ballot altogether, returning it to [`BallotState::Empty`].
#[tracing::instrument(skip(conn))]
pub fn delete_ballot(
    judge_id: &str,
    participant_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<usize, ScoringError> {
    conn.transaction(|conn| {
        ensure_live(judge_id, conn)?;
        let removed = store::delete_by_key(judge_id, participant_id, conn)?;
        if removed > 0 {
            tracing::info!(removed, "ballot deleted by organizer");
        }
        Ok(removed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::{ScoringFixture, memory_conn},
        tracks::{
            TrackStatus,
            scoring::{Actor, store::upsert},
        },
    };

    fn cell(locked: bool, unlock_requested: bool) -> ScoreCell {
        ScoreCell {
            locked,
            unlock_requested,
            ..ScoreCell::for_test("j", "p", "c", 50)
        }
    }

    #[test]
    fn state_is_derived_from_the_cells() {
        assert_eq!(BallotState::of_cells(&[]), BallotState::Empty);
        assert_eq!(
            BallotState::of_cells(&[cell(false, false), cell(false, false)]),
            BallotState::Draft
        );
        assert_eq!(
            BallotState::of_cells(&[cell(false, false), cell(true, false)]),
            BallotState::Completed {
                unlock_requested: false
            }
        );
        assert_eq!(
            BallotState::of_cells(&[cell(true, true), cell(true, false)]),
            BallotState::Completed {
                unlock_requested: true
            }
        );
        assert_eq!(
            BallotState::of_cells(&[cell(true, true)]).label(),
            "unlock requested"
        );
    }

    #[test]
    fn locked_cells_reject_judges_until_unlock_is_granted() {
        let mut conn = memory_conn();
        let f = ScoringFixture::design_and_function(&mut conn);

        upsert(&f.j1, &f.p1, &f.design, 80, Actor::Judge, &mut conn).unwrap();
        lock_ballot(&f.j1, &f.p1, &mut conn).unwrap();

        assert!(matches!(
            upsert(&f.j1, &f.p1, &f.design, 90, Actor::Judge, &mut conn),
            Err(ScoringError::Locked)
        ));

        assert_eq!(
            request_unlock(&f.j1, &f.p1, &mut conn).unwrap(),
            BallotState::Completed {
                unlock_requested: true
            }
        );
        // requesting does not lift the lock
        assert!(matches!(
            upsert(&f.j1, &f.p1, &f.design, 90, Actor::Judge, &mut conn),
            Err(ScoringError::Locked)
        ));

        assert_eq!(
            grant_unlock(&f.j1, &f.p1, &mut conn).unwrap(),
            BallotState::Draft
        );
        let cell =
            upsert(&f.j1, &f.p1, &f.design, 90, Actor::Judge, &mut conn)
                .unwrap();
        assert_eq!(cell.value, 90);
        assert!(!cell.locked);
        assert!(!cell.unlock_requested);
    }

    #[test]
    fn organizers_may_overwrite_locked_cells() {
        let mut conn = memory_conn();
        let f = ScoringFixture::design_and_function(&mut conn);

        upsert(&f.j1, &f.p1, &f.design, 80, Actor::Judge, &mut conn).unwrap();
        lock_ballot(&f.j1, &f.p1, &mut conn).unwrap();

        let cell =
            upsert(&f.j1, &f.p1, &f.design, 70, Actor::Organizer, &mut conn)
                .unwrap();
        assert_eq!(cell.value, 70);
        assert!(cell.locked);
    }

    #[test]
    fn grant_requires_a_request_but_force_does_not() {
        let mut conn = memory_conn();
        let f = ScoringFixture::design_and_function(&mut conn);

        upsert(&f.j1, &f.p1, &f.design, 80, Actor::Judge, &mut conn).unwrap();
        lock_ballot(&f.j1, &f.p1, &mut conn).unwrap();

        assert!(matches!(
            grant_unlock(&f.j1, &f.p1, &mut conn),
            Err(ScoringError::Validation(_))
        ));
        assert_eq!(
            force_unlock(&f.j1, &f.p1, &mut conn).unwrap(),
            BallotState::Draft
        );
    }

    #[test]
    fn unlock_requests_on_open_ballots_do_nothing() {
        let mut conn = memory_conn();
        let f = ScoringFixture::design_and_function(&mut conn);

        assert_eq!(
            request_unlock(&f.j1, &f.p1, &mut conn).unwrap(),
            BallotState::Empty
        );

        upsert(&f.j1, &f.p1, &f.design, 80, Actor::Judge, &mut conn).unwrap();
        assert_eq!(
            request_unlock(&f.j1, &f.p1, &mut conn).unwrap(),
            BallotState::Draft
        );
        assert!(
            store::get_ballot(&f.j1, &f.p1, &mut conn)
                .unwrap()
                .iter()
                .all(|c| !c.unlock_requested)
        );
    }

    #[test]
    fn deleting_a_ballot_empties_it() {
        let mut conn = memory_conn();
        let f = ScoringFixture::design_and_function(&mut conn);

        upsert(&f.j1, &f.p1, &f.design, 80, Actor::Judge, &mut conn).unwrap();
        upsert(&f.j1, &f.p1, &f.function, 80, Actor::Judge, &mut conn)
            .unwrap();
        lock_ballot(&f.j1, &f.p1, &mut conn).unwrap();

        assert_eq!(delete_ballot(&f.j1, &f.p1, &mut conn).unwrap(), 2);
        assert_eq!(
            current_state(&f.j1, &f.p1, &mut conn).unwrap(),
            BallotState::Empty
        );
    }

    #[test]
    fn lock_flags_are_frozen_once_the_track_ends() {
        let mut conn = memory_conn();
        let f = ScoringFixture::design_and_function(&mut conn);

        upsert(&f.j1, &f.p1, &f.design, 80, Actor::Judge, &mut conn).unwrap();
        lock_ballot(&f.j1, &f.p1, &mut conn).unwrap();
        upsert(&f.j2, &f.p1, &f.design, 60, Actor::Judge, &mut conn).unwrap();
        lock_ballot(&f.j2, &f.p1, &mut conn).unwrap();
        request_unlock(&f.j2, &f.p1, &mut conn).unwrap();

        f.track(&mut conn)
            .set_status(TrackStatus::Ended, &mut conn)
            .unwrap();

        assert!(matches!(
            request_unlock(&f.j1, &f.p1, &mut conn),
            Err(ScoringError::NotLive(TrackStatus::Ended))
        ));
        assert!(matches!(
            grant_unlock(&f.j2, &f.p1, &mut conn),
            Err(ScoringError::NotLive(TrackStatus::Ended))
        ));
        assert!(matches!(
            force_unlock(&f.j1, &f.p1, &mut conn),
            Err(ScoringError::NotLive(TrackStatus::Ended))
        ));
        assert!(matches!(
            delete_ballot(&f.j1, &f.p1, &mut conn),
            Err(ScoringError::NotLive(TrackStatus::Ended))
        ));

        assert_eq!(
            current_state(&f.j1, &f.p1, &mut conn).unwrap(),
            BallotState::Completed {
                unlock_requested: false
            }
        );
        assert_eq!(
            current_state(&f.j2, &f.p1, &mut conn).unwrap(),
            BallotState::Completed {
                unlock_requested: true
            }
        );

        // and thaw again when it goes back live
        f.track(&mut conn)
            .set_status(TrackStatus::Live, &mut conn)
            .unwrap();
        assert_eq!(
            grant_unlock(&f.j2, &f.p1, &mut conn).unwrap(),
            BallotState::Draft
        );
    }
}
