use std::collections::HashSet;

use diesel::{Connection, connection::LoadConnection, sqlite::Sqlite};
use serde::Deserialize;

use crate::tracks::{
    criteria::Criterion,
    participants::{Judge, Participant},
    scoring::{
        Actor, Rating, ScoringError,
        lock::{self, BallotState},
        store,
    },
};

/// One criterion's rating as entered on the ballot form. `raw` is a value
/// from 0 to 100 for continuous criteria and a level from 1 to 5 for
/// categorical ones.
#[derive(Deserialize, Clone, Debug)]
pub struct BallotEntry {
    pub criterion_id: String,
    pub raw: i64,
}

/// Saves a judge's ballot for a participant.
///
/// A draft may rate any subset of the criteria. A final submission must
/// rate all of them, and locks the ballot. Every entry is checked before
/// anything is written, so a rejected ballot leaves the stored cells as
/// they were.
#[tracing::instrument(skip(judge, entries, conn), fields(judge_id = %judge.id))]
pub fn submit_ballot(
    judge: &Judge,
    participant_id: &str,
    entries: &[BallotEntry],
    finalize: bool,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<BallotState, ScoringError> {
    conn.transaction(|conn| {
        let track = store::fetch_track(&judge.track_id, conn)?;
        let participant = Participant::fetch(participant_id, &track.id, conn)?;
        let criteria = Criterion::load_all(&track.id, conn)?;

        let mut seen = HashSet::new();
        let mut values = Vec::with_capacity(entries.len());
        for entry in entries {
            let criterion = criteria
                .iter()
                .find(|c| c.id == entry.criterion_id)
                .ok_or(ScoringError::NotFound("criterion"))?;
            if !seen.insert(criterion.id.as_str()) {
                return Err(ScoringError::validation(format!(
                    "{} was rated more than once",
                    criterion.name
                )));
            }
            let value = Rating::for_scale(criterion.scale(), entry.raw)
                .value()
                .map_err(|e| match e {
                    ScoringError::Validation(msg) => ScoringError::Validation(
                        format!("{}: {msg}", criterion.name),
                    ),
                    e => e,
                })?;
            values.push((criterion, value));
        }

        if values.is_empty() {
            return Err(ScoringError::validation(
                "a ballot must rate at least one criterion",
            ));
        }
        if finalize {
            if let Some(missing) =
                criteria.iter().find(|c| !seen.contains(c.id.as_str()))
            {
                return Err(ScoringError::validation(format!(
                    "{} must be rated before the ballot is submitted",
                    missing.name
                )));
            }
        }

        if !track.is_live() {
            return Err(ScoringError::NotLive(track.status()));
        }

        let existing = store::get_ballot(&judge.id, &participant.id, conn)?;
        if !BallotState::of_cells(&existing).is_open() {
            return Err(ScoringError::Locked);
        }

        for (criterion, value) in values {
            store::upsert(
                &judge.id,
                &participant.id,
                &criterion.id,
                value,
                Actor::Judge,
                conn,
            )?;
        }

        if finalize {
            lock::lock_ballot(&judge.id, &participant.id, conn)
        } else {
            Ok(BallotState::Draft)
        }
    })
}
