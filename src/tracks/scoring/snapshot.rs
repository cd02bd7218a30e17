use std::sync::Arc;

use diesel::{connection::LoadConnection, sqlite::Sqlite};

use crate::{
    state::{DbPool, with_pooled_conn},
    tracks::{
        Track,
        criteria::Criterion,
        participants::{Judge, Participant},
        scoring::{
            ScoreCell,
            aggregate::{Aggregates, aggregate},
            matrix::TabulationMatrix,
            projection::{PublicIdentities, PublicStanding, project},
            ranking::{RankedEntry, rank},
            store,
        },
    },
    util_resp::FailureResponse,
};

/// Everything the scores of a track are computed from, read at one point in
/// time. A snapshot is never modified once loaded, so the same snapshot can
/// back any number of views.
#[derive(Clone, Debug)]
pub struct TrackSnapshot {
    pub track: Track,
    /// In the order they were added to the track.
    pub participants: Vec<Participant>,
    pub judges: Vec<Judge>,
    pub criteria: Vec<Criterion>,
    pub cells: Vec<ScoreCell>,
}

/// The result of aggregating and ranking a snapshot.
#[derive(Clone, Debug)]
pub struct Tabulation {
    pub aggregates: Aggregates,
    pub ranking: Vec<RankedEntry>,
}

impl TrackSnapshot {
    /// Reads the snapshot over a single connection.
    pub fn load(
        track: Track,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<TrackSnapshot, diesel::result::Error> {
        let participants = Participant::load_all(&track.id, conn)?;
        let judges = Judge::load_all(&track.id, conn)?;
        let criteria = Criterion::load_all(&track.id, conn)?;
        let cells = store::get_by_track(&track.id, conn)?;

        Ok(TrackSnapshot {
            track,
            participants,
            judges,
            criteria,
            cells,
        })
    }

    /// Reads the snapshot with the roster, criteria and cells fetched in
    /// parallel over separate pooled connections.
    #[tracing::instrument(skip(pool))]
    pub async fn load_concurrently(
        pool: &DbPool,
        track_id: &str,
    ) -> Result<Arc<TrackSnapshot>, FailureResponse> {
        let tid = track_id.to_string();
        let track =
            with_pooled_conn(pool, move |conn| Track::fetch(&tid, conn)).await?;

        let tid = track.id.clone();
        let participants = with_pooled_conn(pool, move |conn| {
            Ok(Participant::load_all(&tid, conn)?)
        });
        let tid = track.id.clone();
        let judges =
            with_pooled_conn(pool, move |conn| Ok(Judge::load_all(&tid, conn)?));
        let tid = track.id.clone();
        let criteria = with_pooled_conn(pool, move |conn| {
            Ok(Criterion::load_all(&tid, conn)?)
        });
        let tid = track.id.clone();
        let cells = with_pooled_conn(pool, move |conn| {
            Ok(store::get_by_track(&tid, conn)?)
        });

        let (participants, judges, criteria, cells) =
            tokio::try_join!(participants, judges, criteria, cells)?;

        Ok(Arc::new(TrackSnapshot {
            track,
            participants,
            judges,
            criteria,
            cells,
        }))
    }

    pub fn recompute(&self) -> Tabulation {
        let aggregates = aggregate(
            self.participants.iter().map(|p| p.id.as_str()),
            &self.cells,
            &self.criteria,
        );
        let ranking = rank(&aggregates);
        tracing::debug!(track_id = %self.track.id, "recomputed tabulation");
        Tabulation {
            aggregates,
            ranking,
        }
    }

    /// The public leaderboard, with real names removed unless the track has
    /// revealed them.
    pub fn leaderboard(&self) -> Vec<PublicStanding> {
        let identities =
            PublicIdentities::new(&self.participants, self.track.names_revealed);
        project(&self.recompute().ranking, &identities)
    }

    pub fn matrix(&self) -> TabulationMatrix {
        TabulationMatrix::build(self, &self.recompute())
    }

    pub fn participant(&self, participant_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == participant_id)
    }

    pub fn judge(&self, judge_id: &str) -> Option<&Judge> {
        self.judges.iter().find(|j| j.id == judge_id)
    }

    pub fn criterion(&self, criterion_id: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.id == criterion_id)
    }

    pub fn ballot_cells<'a>(
        &'a self,
        judge_id: &'a str,
        participant_id: &'a str,
    ) -> impl Iterator<Item = &'a ScoreCell> + 'a {
        self.cells.iter().filter(move |c| {
            c.judge_id == judge_id && c.participant_id == participant_id
        })
    }
}
