//! The organizer's view of a track's scores: one row per participant, one
//! column per judge.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::tracks::{
    criteria::{is_balanced, weights_total},
    scoring::{
        aggregate::contribution,
        lock::BallotState,
        snapshot::{Tabulation, TrackSnapshot},
    },
};

#[derive(Serialize, Clone, Debug)]
pub struct MatrixJudge {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, Clone, Debug)]
pub struct MatrixCell {
    pub judge_id: String,
    /// `None` if the judge has not rated this participant.
    pub subtotal: Option<Decimal>,
    pub state: BallotState,
}

#[derive(Serialize, Clone, Debug)]
pub struct MatrixRow {
    pub participant_id: String,
    pub number: i64,
    pub real_name: String,
    pub alias: Option<String>,
    pub booth_code: String,
    pub position: usize,
    pub position_label: String,
    /// One per judge, in the same order as [`TabulationMatrix::judges`].
    pub cells: Vec<MatrixCell>,
    pub final_score: Decimal,
    pub variance: Decimal,
    pub judge_count: usize,
    /// Whether any judge has asked for one of this participant's ballots to
    /// be unlocked.
    pub unlock_requested: bool,
}

#[derive(Serialize, Clone, Debug)]
pub struct TabulationMatrix {
    pub track_id: String,
    pub judges: Vec<MatrixJudge>,
    /// Sorted by final score, highest first.
    pub rows: Vec<MatrixRow>,
    pub weights_total: Decimal,
    pub balanced: bool,
}

impl TabulationMatrix {
    pub fn build(
        snapshot: &TrackSnapshot,
        tabulation: &Tabulation,
    ) -> TabulationMatrix {
        let judges = snapshot
            .judges
            .iter()
            .map(|j| MatrixJudge {
                id: j.id.clone(),
                name: j.name.clone(),
            })
            .collect::<Vec<_>>();

        let rows = tabulation
            .ranking
            .iter()
            .filter_map(|entry| {
                let participant = snapshot.participant(&entry.participant_id)?;
                let aggregate = tabulation.aggregates.get(&participant.id)?;

                let cells = judges
                    .iter()
                    .map(|judge| MatrixCell {
                        judge_id: judge.id.clone(),
                        subtotal: aggregate.subtotals.get(&judge.id).copied(),
                        state: BallotState::of_cells(
                            snapshot.ballot_cells(&judge.id, &participant.id),
                        ),
                    })
                    .collect::<Vec<_>>();

                Some(MatrixRow {
                    participant_id: participant.id.clone(),
                    number: participant.number,
                    real_name: participant.real_name.clone(),
                    alias: participant.alias.clone(),
                    booth_code: participant.booth_code.clone(),
                    position: entry.position,
                    position_label: entry.position_label(),
                    unlock_requested: cells
                        .iter()
                        .any(|c| c.state.unlock_requested()),
                    cells,
                    final_score: aggregate.final_score,
                    variance: aggregate.variance(),
                    judge_count: aggregate.judge_count(),
                })
            })
            .collect();

        TabulationMatrix {
            track_id: snapshot.track.id.clone(),
            judges,
            rows,
            weights_total: weights_total(&snapshot.criteria),
            balanced: is_balanced(&snapshot.criteria),
        }
    }

    pub fn row(&self, participant_id: &str) -> Option<&MatrixRow> {
        self.rows.iter().find(|r| r.participant_id == participant_id)
    }

    /// Number of ballots with an outstanding unlock request.
    pub fn pending_requests(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| &r.cells)
            .filter(|c| c.state.unlock_requested())
            .count()
    }
}

/// One criterion of a judge's ballot for a participant.
#[derive(Serialize, Clone, Debug)]
pub struct BreakdownLine {
    pub criterion_id: String,
    pub criterion: String,
    pub weight: Decimal,
    pub value: Option<i64>,
    pub contribution: Option<Decimal>,
    pub locked: bool,
}

/// The detail behind a single cell of the matrix.
#[derive(Serialize, Clone, Debug)]
pub struct CellBreakdown {
    pub judge_id: String,
    pub judge_name: String,
    pub participant_id: String,
    pub participant_name: String,
    pub state: BallotState,
    pub lines: Vec<BreakdownLine>,
    pub subtotal: Decimal,
}

impl CellBreakdown {
    pub fn build(
        snapshot: &TrackSnapshot,
        judge_id: &str,
        participant_id: &str,
    ) -> Option<CellBreakdown> {
        let judge = snapshot.judge(judge_id)?;
        let participant = snapshot.participant(participant_id)?;

        let lines = snapshot
            .criteria
            .iter()
            .map(|criterion| {
                let cell = snapshot
                    .ballot_cells(&judge.id, &participant.id)
                    .find(|c| c.criterion_id == criterion.id);
                BreakdownLine {
                    criterion_id: criterion.id.clone(),
                    criterion: criterion.name.clone(),
                    weight: criterion.weight_decimal(),
                    value: cell.map(|c| c.value),
                    contribution: cell.map(|c| {
                        contribution(c.value, criterion.weight_decimal())
                    }),
                    locked: cell.is_some_and(|c| c.locked),
                }
            })
            .collect::<Vec<_>>();

        Some(CellBreakdown {
            judge_id: judge.id.clone(),
            judge_name: judge.name.clone(),
            participant_id: participant.id.clone(),
            participant_name: participant.real_name.clone(),
            state: BallotState::of_cells(
                snapshot.ballot_cells(&judge.id, &participant.id),
            ),
            subtotal: lines.iter().filter_map(|l| l.contribution).sum(),
            lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::{ScoringFixture, memory_conn},
        tracks::{
            participants::Judge,
            scoring::{
                ballot::{BallotEntry, submit_ballot},
                lock::request_unlock,
            },
        },
    };

    #[test]
    fn rows_follow_the_ranking_and_flag_requests() {
        let mut conn = memory_conn();
        let f = ScoringFixture::design_and_function(&mut conn);
        let j1 = Judge::fetch(&f.j1, &mut conn).unwrap();
        let j2 = Judge::fetch(&f.j2, &mut conn).unwrap();

        let ballot = |design, function| {
            vec![
                BallotEntry {
                    criterion_id: f.design.clone(),
                    raw: design,
                },
                BallotEntry {
                    criterion_id: f.function.clone(),
                    raw: function,
                },
            ]
        };
        submit_ballot(&j1, &f.p2, &ballot(80, 50), true, &mut conn).unwrap();
        submit_ballot(&j2, &f.p2, &ballot(100, 100), true, &mut conn).unwrap();
        submit_ballot(&j1, &f.p3, &ballot(20, 20), false, &mut conn).unwrap();
        request_unlock(&f.j2, &f.p2, &mut conn).unwrap();

        let snapshot =
            TrackSnapshot::load(f.track(&mut conn), &mut conn).unwrap();
        let matrix = snapshot.matrix();

        assert!(matrix.balanced);
        assert_eq!(
            matrix
                .rows
                .iter()
                .map(|r| r.participant_id.as_str())
                .collect::<Vec<_>>(),
            vec![f.p2.as_str(), f.p3.as_str(), f.p1.as_str()]
        );

        let top = &matrix.rows[0];
        assert_eq!(top.final_score, Decimal::from(84));
        assert_eq!(top.variance, Decimal::from(256));
        assert!(top.unlock_requested);
        assert_eq!(matrix.pending_requests(), 1);

        let draft = matrix.row(&f.p3).unwrap();
        let j1_cell = draft.cells.iter().find(|c| c.judge_id == f.j1).unwrap();
        assert_eq!(j1_cell.state, BallotState::Draft);
        let j2_cell = draft.cells.iter().find(|c| c.judge_id == f.j2).unwrap();
        assert_eq!(j2_cell.subtotal, None);
        assert_eq!(j2_cell.state, BallotState::Empty);
    }

    #[test]
    fn breakdown_lists_every_criterion() {
        let mut conn = memory_conn();
        let f = ScoringFixture::design_and_function(&mut conn);
        let j1 = Judge::fetch(&f.j1, &mut conn).unwrap();
        submit_ballot(
            &j1,
            &f.p1,
            &[BallotEntry {
                criterion_id: f.design.clone(),
                raw: 80,
            }],
            false,
            &mut conn,
        )
        .unwrap();

        let snapshot =
            TrackSnapshot::load(f.track(&mut conn), &mut conn).unwrap();
        let breakdown = CellBreakdown::build(&snapshot, &f.j1, &f.p1).unwrap();

        assert_eq!(breakdown.lines.len(), 2);
        assert_eq!(breakdown.lines[0].contribution, Some(Decimal::from(48)));
        assert_eq!(breakdown.lines[1].value, None);
        assert_eq!(breakdown.subtotal, Decimal::from(48));
        assert!(CellBreakdown::build(&snapshot, "nobody", &f.p1).is_none());
    }
}
