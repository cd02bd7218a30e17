use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    schema::{score_cells, track_judges, track_participants},
    tracks::scoring::ScoringError,
    validation::{
        is_valid_booth_code, is_valid_name, is_valid_pin, normalize_booth_code,
    },
};

pub mod aliases;
pub mod manage;

/// A team being judged. The real name is private to organizers (and to
/// judges, who meet the team in person); the public only ever sees it when
/// the track's names have been revealed.
#[derive(Queryable, Serialize, Deserialize, Clone, Debug)]
pub struct Participant {
    pub id: String,
    pub track_id: String,
    pub real_name: String,
    pub alias: Option<String>,
    pub booth_code: String,
    pub number: i64,
}

#[derive(Queryable, Serialize, Deserialize, Clone, Debug)]
pub struct Judge {
    pub id: String,
    pub track_id: String,
    pub name: String,
    pub pin: String,
    pub number: i64,
}

impl Participant {
    pub fn fetch(
        participant_id: &str,
        track_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Participant, ScoringError> {
        track_participants::table
            .filter(
                track_participants::id
                    .eq(participant_id)
                    .and(track_participants::track_id.eq(track_id)),
            )
            .first::<Participant>(conn)
            .optional()?
            .ok_or(ScoringError::NotFound("participant"))
    }

    /// Looks a participant up by the code displayed at their booth. The code
    /// is matched case-insensitively.
    pub fn of_booth_code(
        booth_code: &str,
        track_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Participant, ScoringError> {
        track_participants::table
            .filter(
                track_participants::booth_code
                    .eq(normalize_booth_code(booth_code))
                    .and(track_participants::track_id.eq(track_id)),
            )
            .first::<Participant>(conn)
            .optional()?
            .ok_or(ScoringError::NotFound("participant"))
    }

    pub fn load_all(
        track_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Participant>, diesel::result::Error> {
        track_participants::table
            .filter(track_participants::track_id.eq(track_id))
            .order_by(track_participants::number.asc())
            .load::<Participant>(conn)
    }

    /// The label used for this participant wherever the real name must not
    /// be shown.
    pub fn anonymous_label(&self) -> String {
        match &self.alias {
            Some(alias) if !alias.trim().is_empty() => alias.clone(),
            _ => format!("Entry #{}", self.number),
        }
    }
}

impl Judge {
    pub fn fetch(
        judge_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Judge, ScoringError> {
        track_judges::table
            .filter(track_judges::id.eq(judge_id))
            .first::<Judge>(conn)
            .optional()?
            .ok_or(ScoringError::NotFound("judge"))
    }

    pub fn of_pin(
        pin: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Judge, ScoringError> {
        if is_valid_pin(pin).is_err() {
            return Err(ScoringError::NotFound("judge"));
        }
        track_judges::table
            .filter(track_judges::pin.eq(pin))
            .first::<Judge>(conn)
            .optional()?
            .ok_or(ScoringError::NotFound("judge"))
    }

    pub fn load_all(
        track_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Judge>, diesel::result::Error> {
        track_judges::table
            .filter(track_judges::track_id.eq(track_id))
            .order_by(track_judges::name.asc())
            .load::<Judge>(conn)
    }
}

/// Participants and judges of a track, keyed by id.
pub struct TrackRoster {
    pub participants: IndexMap<String, Participant>,
    pub judges: IndexMap<String, Judge>,
}

impl TrackRoster {
    pub fn load(
        track_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<TrackRoster, diesel::result::Error> {
        let participants = Participant::load_all(track_id, conn)?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        let judges = Judge::load_all(track_id, conn)?
            .into_iter()
            .map(|j| (j.id.clone(), j))
            .collect();

        Ok(TrackRoster {
            participants,
            judges,
        })
    }
}

fn next_number(max: Option<i64>) -> i64 {
    max.unwrap_or(0) + 1
}

#[tracing::instrument(skip(conn))]
pub fn create_participant(
    track_id: &str,
    real_name: &str,
    alias: Option<&str>,
    booth_code: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Participant, ScoringError> {
    is_valid_name(real_name).map_err(ScoringError::Validation)?;
    let booth_code = normalize_booth_code(booth_code);
    is_valid_booth_code(&booth_code).map_err(ScoringError::Validation)?;
    let alias = alias
        .map(str::trim)
        .filter(|alias| !alias.is_empty())
        .map(str::to_string);

    conn.transaction(|conn| {
        let taken = diesel::select(diesel::dsl::exists(
            track_participants::table.filter(
                track_participants::track_id
                    .eq(track_id)
                    .and(track_participants::booth_code.eq(&booth_code)),
            ),
        ))
        .get_result::<bool>(conn)?;
        if taken {
            return Err(ScoringError::validation(format!(
                "booth code {booth_code} is already in use in this track"
            )));
        }

        let number = next_number(
            track_participants::table
                .filter(track_participants::track_id.eq(track_id))
                .select(diesel::dsl::max(track_participants::number))
                .get_result::<Option<i64>>(conn)?,
        );

        let participant = Participant {
            id: Uuid::now_v7().to_string(),
            track_id: track_id.to_string(),
            real_name: real_name.trim().to_string(),
            alias,
            booth_code,
            number,
        };

        diesel::insert_into(track_participants::table)
            .values((
                track_participants::id.eq(&participant.id),
                track_participants::track_id.eq(&participant.track_id),
                track_participants::real_name.eq(&participant.real_name),
                track_participants::alias.eq(&participant.alias),
                track_participants::booth_code.eq(&participant.booth_code),
                track_participants::number.eq(participant.number),
            ))
            .execute(conn)?;

        tracing::info!(participant_id = %participant.id, "participant created");
        Ok(participant)
    })
}

/// Deletes a participant together with every score cell which refers to it.
/// Returns the number of score cells removed.
#[tracing::instrument(skip(conn))]
pub fn delete_participant(
    participant_id: &str,
    track_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<usize, ScoringError> {
    conn.transaction(|conn| {
        let participant = Participant::fetch(participant_id, track_id, conn)?;

        let cells = diesel::delete(
            score_cells::table
                .filter(score_cells::participant_id.eq(&participant.id)),
        )
        .execute(conn)?;
        diesel::delete(
            track_participants::table
                .filter(track_participants::id.eq(&participant.id)),
        )
        .execute(conn)?;

        tracing::info!(cells, "participant deleted");
        Ok(cells)
    })
}

/// Assigns a fresh random alias to every participant of the track.
#[tracing::instrument(skip(rng, conn))]
pub fn regenerate_aliases(
    track_id: &str,
    rng: &mut impl Rng,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<usize, ScoringError> {
    conn.transaction(|conn| {
        let participants = Participant::load_all(track_id, conn)?;
        for participant in &participants {
            diesel::update(
                track_participants::table
                    .filter(track_participants::id.eq(&participant.id)),
            )
            .set(track_participants::alias.eq(aliases::random_alias(rng)))
            .execute(conn)?;
        }
        tracing::info!(count = participants.len(), "aliases regenerated");
        Ok(participants.len())
    })
}

/// Generates a PIN which no other judge (in any track) is using.
fn unique_pin(
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<String, diesel::result::Error> {
    loop {
        let pin = format!("{:06}", rand::rng().random_range(0..1_000_000u32));

        let is_duplicate = diesel::select(diesel::dsl::exists(
            track_judges::table.filter(track_judges::pin.eq(&pin)),
        ))
        .get_result::<bool>(conn)?;

        if !is_duplicate {
            return Ok(pin);
        }
    }
}

#[tracing::instrument(skip(conn))]
pub fn create_judge(
    track_id: &str,
    name: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Judge, ScoringError> {
    is_valid_name(name).map_err(ScoringError::Validation)?;

    conn.transaction(|conn| {
        let number = next_number(
            track_judges::table
                .filter(track_judges::track_id.eq(track_id))
                .select(diesel::dsl::max(track_judges::number))
                .get_result::<Option<i64>>(conn)?,
        );

        let judge = Judge {
            id: Uuid::now_v7().to_string(),
            track_id: track_id.to_string(),
            name: name.trim().to_string(),
            pin: unique_pin(conn)?,
            number,
        };

        diesel::insert_into(track_judges::table)
            .values((
                track_judges::id.eq(&judge.id),
                track_judges::track_id.eq(&judge.track_id),
                track_judges::name.eq(&judge.name),
                track_judges::pin.eq(&judge.pin),
                track_judges::number.eq(judge.number),
            ))
            .execute(conn)?;

        tracing::info!(judge_id = %judge.id, "judge created");
        Ok(judge)
    })
}

/// Deletes a judge together with every score cell they entered. Returns the
/// number of score cells removed.
#[tracing::instrument(skip(conn))]
pub fn delete_judge(
    judge_id: &str,
    track_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<usize, ScoringError> {
    conn.transaction(|conn| {
        let judge = Judge::fetch(judge_id, conn)?;
        if judge.track_id != track_id {
            return Err(ScoringError::NotFound("judge"));
        }

        let cells = diesel::delete(
            score_cells::table.filter(score_cells::judge_id.eq(&judge.id)),
        )
        .execute(conn)?;
        diesel::delete(track_judges::table.filter(track_judges::id.eq(&judge.id)))
            .execute(conn)?;

        tracing::info!(cells, "judge deleted");
        Ok(cells)
    })
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::test::{memory_conn, seed_track};

    #[test]
    fn participants_are_numbered_in_creation_order() {
        let mut conn = memory_conn();
        let track = seed_track(&mut conn, "Robotics");

        let a = create_participant(&track.id, "Alpha", None, "rb-01", &mut conn)
            .unwrap();
        let b = create_participant(&track.id, "Beta", Some(" "), "RB-02", &mut conn)
            .unwrap();

        assert_eq!((a.number, b.number), (1, 2));
        assert_eq!(a.booth_code, "RB-01");
        assert_eq!(b.alias, None);
        assert_eq!(b.anonymous_label(), "Entry #2");
    }

    #[test]
    fn duplicate_booth_codes_are_rejected_within_a_track() {
        let mut conn = memory_conn();
        let track = seed_track(&mut conn, "Robotics");
        let other = seed_track(&mut conn, "Games");

        create_participant(&track.id, "Alpha", None, "B-1", &mut conn).unwrap();
        assert!(matches!(
            create_participant(&track.id, "Beta", None, "b-1", &mut conn),
            Err(ScoringError::Validation(_))
        ));
        assert!(
            create_participant(&other.id, "Gamma", None, "B-1", &mut conn).is_ok()
        );
    }

    #[test]
    fn booth_code_lookup_ignores_case() {
        let mut conn = memory_conn();
        let track = seed_track(&mut conn, "Robotics");
        let a = create_participant(&track.id, "Alpha", None, "GAME-01", &mut conn)
            .unwrap();

        let found = Participant::of_booth_code("game-01", &track.id, &mut conn)
            .unwrap();
        assert_eq!(found.id, a.id);
        assert!(matches!(
            Participant::of_booth_code("GAME-02", &track.id, &mut conn),
            Err(ScoringError::NotFound(_))
        ));
    }

    #[test]
    fn judges_get_distinct_pins() {
        let mut conn = memory_conn();
        let track = seed_track(&mut conn, "Robotics");

        let pins = (0..20)
            .map(|i| {
                create_judge(&track.id, &format!("Judge {i}"), &mut conn)
                    .unwrap()
                    .pin
            })
            .collect::<std::collections::HashSet<_>>();
        assert_eq!(pins.len(), 20);

        let pin = pins.iter().next().unwrap();
        assert_eq!(&Judge::of_pin(pin, &mut conn).unwrap().pin, pin);
        assert!(Judge::of_pin("nope", &mut conn).is_err());
    }

    #[test]
    fn regenerating_aliases_covers_every_participant() {
        let mut conn = memory_conn();
        let track = seed_track(&mut conn, "Robotics");
        create_participant(&track.id, "Alpha", None, "A-1", &mut conn).unwrap();
        create_participant(&track.id, "Beta", None, "A-2", &mut conn).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(regenerate_aliases(&track.id, &mut rng, &mut conn).unwrap(), 2);

        for participant in Participant::load_all(&track.id, &mut conn).unwrap() {
            assert!(participant.alias.unwrap().starts_with("Team "));
        }
    }
}
