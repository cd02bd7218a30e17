use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};

use crate::{
    schema::{
        score_cells, track_criteria, track_judges, track_organizers,
        track_participants, tracks,
    },
    util_resp::FailureResponse,
};

pub mod create;
pub mod criteria;
pub mod judge;
pub mod manage;
pub mod participants;
pub mod public;
pub mod scoring;

#[derive(Queryable, Serialize, Deserialize, Clone, Debug)]
pub struct Track {
    pub id: String,
    pub title: String,
    status: String,
    pub names_revealed: bool,
    pub created_at: NaiveDateTime,
}

/// Lifecycle of a track. Judges may only write scores while a track is
/// [`TrackStatus::Live`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Setup,
    Live,
    Ended,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Setup => "setup",
            TrackStatus::Live => "live",
            TrackStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "setup" => Ok(TrackStatus::Setup),
            "live" => Ok(TrackStatus::Live),
            "ended" => Ok(TrackStatus::Ended),
            other => Err(format!("unknown track status `{other}`")),
        }
    }
}

impl Track {
    /// Creates a track in the `setup` state with names hidden, and makes
    /// `organizer` (if any) its organizer.
    #[tracing::instrument(skip(conn))]
    pub fn create(
        title: &str,
        organizer: Option<&str>,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Track, diesel::result::Error> {
        let track = Track {
            id: uuid::Uuid::now_v7().to_string(),
            title: title.trim().to_string(),
            status: TrackStatus::Setup.as_str().to_string(),
            names_revealed: false,
            created_at: chrono::Utc::now().naive_utc(),
        };

        conn.transaction(|conn| {
            diesel::insert_into(tracks::table)
                .values((
                    tracks::id.eq(&track.id),
                    tracks::title.eq(&track.title),
                    tracks::status.eq(&track.status),
                    tracks::names_revealed.eq(track.names_revealed),
                    tracks::created_at.eq(track.created_at),
                ))
                .execute(conn)?;

            if let Some(user_id) = organizer {
                diesel::insert_into(track_organizers::table)
                    .values((
                        track_organizers::id
                            .eq(uuid::Uuid::now_v7().to_string()),
                        track_organizers::user_id.eq(user_id),
                        track_organizers::track_id.eq(&track.id),
                    ))
                    .execute(conn)?;
            }

            Ok::<_, diesel::result::Error>(())
        })?;

        tracing::info!(track_id = %track.id, "track created");
        Ok(track)
    }

    /// Deletes the track along with its roster, criteria and scores.
    #[tracing::instrument(skip(self, conn), fields(track_id = %self.id))]
    pub fn delete(
        self,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<(), diesel::result::Error> {
        conn.transaction(|conn| {
            let cells = diesel::delete(
                score_cells::table.filter(score_cells::track_id.eq(&self.id)),
            )
            .execute(conn)?;
            diesel::delete(
                track_criteria::table
                    .filter(track_criteria::track_id.eq(&self.id)),
            )
            .execute(conn)?;
            diesel::delete(
                track_judges::table.filter(track_judges::track_id.eq(&self.id)),
            )
            .execute(conn)?;
            diesel::delete(
                track_participants::table
                    .filter(track_participants::track_id.eq(&self.id)),
            )
            .execute(conn)?;
            diesel::delete(
                track_organizers::table
                    .filter(track_organizers::track_id.eq(&self.id)),
            )
            .execute(conn)?;
            diesel::delete(tracks::table.filter(tracks::id.eq(&self.id)))
                .execute(conn)?;

            tracing::info!(cells, "track deleted");
            Ok(())
        })
    }

    /// The stored status. Rows are constrained by the schema, so an
    /// unparseable value can only come from manual tampering; it is treated
    /// as `setup` (which accepts no scores).
    pub fn status(&self) -> TrackStatus {
        self.status.parse().unwrap_or_else(|e| {
            tracing::error!(track_id = %self.id, "{e}");
            TrackStatus::Setup
        })
    }

    pub fn is_live(&self) -> bool {
        self.status() == TrackStatus::Live
    }

    #[tracing::instrument(skip(conn))]
    pub fn fetch(
        track_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Track, FailureResponse> {
        tracks::table
            .filter(tracks::id.eq(track_id))
            .first::<Track>(conn)
            .optional()?
            .ok_or(FailureResponse::NotFound(()))
    }

    /// Tracks shown on the public scoreboard index: those which are live or
    /// have ended, newest first.
    pub fn public_tracks(
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Track>, diesel::result::Error> {
        tracks::table
            .filter(tracks::status.eq_any(["live", "ended"]))
            .order_by(tracks::created_at.desc())
            .load::<Track>(conn)
    }

    pub fn of_organizer(
        user_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Track>, diesel::result::Error> {
        tracks::table
            .inner_join(track_organizers::table)
            .filter(track_organizers::user_id.eq(user_id))
            .select(tracks::all_columns)
            .order_by(tracks::created_at.desc())
            .load::<Track>(conn)
    }

    pub fn check_user_is_organizer(
        &self,
        user_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<(), FailureResponse> {
        let is_organizer = diesel::select(diesel::dsl::exists(
            track_organizers::table.filter(
                track_organizers::user_id
                    .eq(user_id)
                    .and(track_organizers::track_id.eq(&self.id)),
            ),
        ))
        .get_result::<bool>(conn)?;

        if is_organizer {
            Ok(())
        } else {
            Err(FailureResponse::Forbidden(()))
        }
    }

    pub fn set_status(
        &self,
        status: TrackStatus,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<(), diesel::result::Error> {
        diesel::update(tracks::table.filter(tracks::id.eq(&self.id)))
            .set(tracks::status.eq(status.as_str()))
            .execute(conn)?;
        tracing::info!(
            track_id = %self.id,
            from = %self.status(),
            to = %status,
            "track status changed"
        );
        Ok(())
    }

    pub fn set_names_revealed(
        &self,
        revealed: bool,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<(), diesel::result::Error> {
        diesel::update(tracks::table.filter(tracks::id.eq(&self.id)))
            .set(tracks::names_revealed.eq(revealed))
            .execute(conn)?;
        tracing::info!(track_id = %self.id, revealed, "name visibility changed");
        Ok(())
    }
}
