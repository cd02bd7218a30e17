//! Turns score cells into weighted scores.
//!
//! For each participant and each judge who rated at least one criterion of
//! that participant, the judge's subtotal is the sum over the criteria they
//! rated of `value * weight / 100`. Criteria the judge did not rate add
//! nothing (they do not count as zero). A participant's final score is the
//! mean of their judges' subtotals, or zero if nobody has rated them.
//!
//! Everything here is a pure function of its inputs and keeps full decimal
//! precision; rounding happens only when results are displayed.

use std::collections::HashMap;

use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::tracks::{criteria::Criterion, scoring::ScoreCell};

#[derive(Clone, Debug, PartialEq)]
pub struct ParticipantAggregate {
    /// Judge id to that judge's weighted subtotal, in the order the judges'
    /// cells were first seen.
    pub subtotals: IndexMap<String, Decimal>,
    pub final_score: Decimal,
}

impl ParticipantAggregate {
    pub fn judge_count(&self) -> usize {
        self.subtotals.len()
    }

    /// Population variance of the subtotals.
    pub fn variance(&self) -> Decimal {
        if self.subtotals.len() < 2 {
            return Decimal::ZERO;
        }
        let squares: Decimal = self
            .subtotals
            .values()
            .map(|s| (*s - self.final_score) * (*s - self.final_score))
            .sum();
        squares / Decimal::from(self.subtotals.len())
    }
}

/// Participant id to that participant's aggregate, in the order the
/// participants were passed to [`aggregate`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aggregates {
    pub participants: IndexMap<String, ParticipantAggregate>,
}

impl Aggregates {
    pub fn get(&self, participant_id: &str) -> Option<&ParticipantAggregate> {
        self.participants.get(participant_id)
    }

    pub fn subtotal(
        &self,
        participant_id: &str,
        judge_id: &str,
    ) -> Option<Decimal> {
        self.get(participant_id)?.subtotals.get(judge_id).copied()
    }
}

/// The weighted contribution of a single cell to its judge's subtotal.
pub fn contribution(value: i64, weight: Decimal) -> Decimal {
    Decimal::from(value) * weight / Decimal::ONE_HUNDRED
}

/// Aggregates the cells of the given participants.
///
/// Every listed participant appears in the result. Cells which belong to an
/// unlisted participant, or which refer to a criterion that is not in
/// `criteria`, are ignored.
pub fn aggregate<'a>(
    participant_ids: impl IntoIterator<Item = &'a str>,
    cells: &[ScoreCell],
    criteria: &[Criterion],
) -> Aggregates {
    let weights: HashMap<&str, Decimal> = criteria
        .iter()
        .map(|c| (c.id.as_str(), c.weight_decimal()))
        .collect();

    let mut sums: IndexMap<&str, IndexMap<String, Decimal>> = participant_ids
        .into_iter()
        .map(|id| (id, IndexMap::new()))
        .collect();

    for cell in cells {
        let Some(subtotals) = sums.get_mut(cell.participant_id.as_str()) else {
            continue;
        };
        let Some(weight) = weights.get(cell.criterion_id.as_str()) else {
            continue;
        };
        *subtotals
            .entry(cell.judge_id.clone())
            .or_insert(Decimal::ZERO) += contribution(cell.value, *weight);
    }

    let participants = sums
        .into_iter()
        .map(|(participant_id, subtotals)| {
            let final_score = if subtotals.is_empty() {
                Decimal::ZERO
            } else {
                subtotals.values().copied().sum::<Decimal>()
                    / Decimal::from(subtotals.len())
            };
            (
                participant_id.to_string(),
                ParticipantAggregate {
                    subtotals,
                    final_score,
                },
            )
        })
        .collect();

    tracing::debug!("aggregated {} cells", cells.len());
    Aggregates { participants }
}

#[cfg(test)]
mod tests {
    use rust_decimal::prelude::FromPrimitive;

    use super::*;

    fn design_and_function() -> Vec<Criterion> {
        vec![
            Criterion::for_test("design", 60.0),
            Criterion::for_test("function", 40.0),
        ]
    }

    fn dec(v: f64) -> Decimal {
        Decimal::from_f64(v).unwrap()
    }

    #[test]
    fn the_two_judge_scenario() {
        let cells = vec![
            ScoreCell::for_test("j1", "p", "design", 80),
            ScoreCell::for_test("j1", "p", "function", 50),
            ScoreCell::for_test("j2", "p", "design", 100),
            ScoreCell::for_test("j2", "p", "function", 100),
        ];

        let aggregates = aggregate(["p"], &cells, &design_and_function());

        assert_eq!(aggregates.subtotal("p", "j1"), Some(dec(68.0)));
        assert_eq!(aggregates.subtotal("p", "j2"), Some(dec(100.0)));
        assert_eq!(aggregates.get("p").unwrap().final_score, dec(84.0));
    }

    #[test]
    fn full_marks_give_exactly_one_hundred() {
        let weight_sets: [&[f64]; 4] = [
            &[100.0],
            &[60.0, 40.0],
            &[33.3, 33.3, 33.4],
            &[12.5, 12.5, 25.0, 10.1, 39.9],
        ];

        for weights in weight_sets {
            let criteria = weights
                .iter()
                .enumerate()
                .map(|(i, w)| Criterion::for_test(&format!("c{i}"), *w))
                .collect::<Vec<_>>();
            let cells = criteria
                .iter()
                .map(|c| ScoreCell::for_test("j", "p", &c.id, 100))
                .collect::<Vec<_>>();

            let aggregates = aggregate(["p"], &cells, &criteria);
            assert_eq!(
                aggregates.subtotal("p", "j"),
                Some(Decimal::ONE_HUNDRED),
                "weights {weights:?}"
            );
        }
    }

    #[test]
    fn unrated_participants_score_zero() {
        let cells = vec![ScoreCell::for_test("j1", "p1", "design", 50)];

        let aggregates = aggregate(["p1", "p2"], &cells, &design_and_function());

        let p2 = aggregates.get("p2").unwrap();
        assert_eq!(p2.final_score, Decimal::ZERO);
        assert_eq!(p2.judge_count(), 0);
        assert_eq!(p2.variance(), Decimal::ZERO);
    }

    #[test]
    fn unrated_criteria_do_not_change_a_subtotal() {
        let cells = vec![ScoreCell::for_test("j1", "p", "design", 80)];
        let before = aggregate(["p"], &cells, &design_and_function());

        let mut criteria = design_and_function();
        criteria.push(Criterion::for_test("pitch", 25.0));
        let after = aggregate(["p"], &cells, &criteria);

        assert_eq!(before.subtotal("p", "j1"), Some(dec(48.0)));
        assert_eq!(before.subtotal("p", "j1"), after.subtotal("p", "j1"));
    }

    #[test]
    fn partial_judges_still_count_towards_the_mean() {
        let cells = vec![
            ScoreCell::for_test("j1", "p", "design", 100),
            ScoreCell::for_test("j1", "p", "function", 100),
            ScoreCell::for_test("j2", "p", "function", 50),
        ];

        let aggregates = aggregate(["p"], &cells, &design_and_function());

        // (100 + 20) / 2
        assert_eq!(aggregates.get("p").unwrap().final_score, dec(60.0));
    }

    #[test]
    fn unbalanced_weights_still_aggregate() {
        let criteria = vec![Criterion::for_test("only", 150.0)];
        let cells = vec![ScoreCell::for_test("j", "p", "only", 100)];

        let aggregates = aggregate(["p"], &cells, &criteria);

        assert_eq!(aggregates.subtotal("p", "j"), Some(dec(150.0)));
    }

    #[test]
    fn cells_for_unknown_rows_are_ignored() {
        let cells = vec![
            ScoreCell::for_test("j", "ghost", "design", 100),
            ScoreCell::for_test("j", "p", "deleted", 100),
        ];

        let aggregates = aggregate(["p"], &cells, &design_and_function());

        assert_eq!(aggregates.participants.len(), 1);
        assert_eq!(aggregates.get("p").unwrap().judge_count(), 0);
    }

    #[test]
    fn aggregation_does_not_depend_on_cell_order() {
        let mut cells = vec![
            ScoreCell::for_test("j1", "p", "design", 33),
            ScoreCell::for_test("j2", "p", "function", 71),
            ScoreCell::for_test("j1", "p", "function", 12),
            ScoreCell::for_test("j2", "p", "design", 99),
        ];
        let forwards = aggregate(["p"], &cells, &design_and_function());
        cells.reverse();
        let backwards = aggregate(["p"], &cells, &design_and_function());

        assert_eq!(
            forwards.get("p").unwrap().final_score,
            backwards.get("p").unwrap().final_score
        );
    }

    #[test]
    fn variance_describes_the_spread_of_subtotals() {
        let cells = vec![
            ScoreCell::for_test("j1", "p", "design", 80),
            ScoreCell::for_test("j1", "p", "function", 50),
            ScoreCell::for_test("j2", "p", "design", 100),
            ScoreCell::for_test("j2", "p", "function", 100),
        ];

        let aggregates = aggregate(["p"], &cells, &design_and_function());

        // subtotals 68 and 100 around a mean of 84
        assert_eq!(aggregates.get("p").unwrap().variance(), dec(256.0));
    }
}
