use itertools::Itertools;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::tracks::scoring::{aggregate::Aggregates, display_round};

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RankedEntry {
    pub participant_id: String,
    pub final_score: Decimal,
    /// 1-based. Participants with equal final scores share a position, and
    /// the next position is skipped (1, 2, 2, 4).
    pub position: usize,
    pub tied: bool,
}

/// Orders participants by final score, highest first.
///
/// Equal scores are ordered by the participants' order in `aggregates`,
/// which is the order they were added to the track.
pub fn rank(aggregates: &Aggregates) -> Vec<RankedEntry> {
    let mut order = aggregates
        .participants
        .iter()
        .enumerate()
        .map(|(roster_index, (id, agg))| (roster_index, id, agg.final_score))
        .collect::<Vec<_>>();
    order.sort_by(|(ia, _, a), (ib, _, b)| b.cmp(a).then(ia.cmp(ib)));

    let mut ranked: Vec<RankedEntry> = Vec::with_capacity(order.len());
    for (i, (_, id, final_score)) in order.iter().enumerate() {
        let position = match ranked.last() {
            Some(prev) if prev.final_score == *final_score => prev.position,
            _ => i + 1,
        };
        ranked.push(RankedEntry {
            participant_id: (*id).clone(),
            final_score: *final_score,
            position,
            tied: false,
        });
    }

    let shared = ranked.iter().map(|r| r.position).counts();
    for entry in &mut ranked {
        entry.tied = shared.get(&entry.position).is_some_and(|n| *n > 1);
    }

    ranked
}

impl RankedEntry {
    /// The position as shown in tables, e.g. `3` or `=3`.
    pub fn position_label(&self) -> String {
        if self.tied {
            format!("={}", self.position)
        } else {
            self.position.to_string()
        }
    }

    pub fn rounded_score(&self) -> Decimal {
        display_round(self.final_score)
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::tracks::scoring::aggregate::ParticipantAggregate;

    fn aggregates(scores: &[(&str, i64)]) -> Aggregates {
        Aggregates {
            participants: scores
                .iter()
                .map(|(id, score)| {
                    let mut subtotals = IndexMap::new();
                    if *score > 0 {
                        subtotals.insert("j".to_string(), Decimal::from(*score));
                    }
                    (
                        id.to_string(),
                        ParticipantAggregate {
                            subtotals,
                            final_score: Decimal::from(*score),
                        },
                    )
                })
                .collect(),
        }
    }

    fn ids(ranked: &[RankedEntry]) -> Vec<&str> {
        ranked.iter().map(|r| r.participant_id.as_str()).collect()
    }

    #[test]
    fn sorts_by_final_score_descending() {
        let ranked = rank(&aggregates(&[("a", 50), ("b", 84), ("c", 70)]));

        assert_eq!(ids(&ranked), vec!["b", "c", "a"]);
        assert_eq!(
            ranked.iter().map(|r| r.position).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(ranked.iter().all(|r| !r.tied));
    }

    #[test]
    fn unscored_participants_rank_last() {
        let ranked = rank(&aggregates(&[("none", 0), ("some", 1)]));

        assert_eq!(ids(&ranked), vec!["some", "none"]);
        assert_eq!(ranked[1].final_score, Decimal::ZERO);
    }

    #[test]
    fn ties_share_a_position_and_keep_roster_order() {
        let ranked = rank(&aggregates(&[
            ("first", 70),
            ("top", 90),
            ("second", 70),
            ("last", 10),
        ]));

        assert_eq!(ids(&ranked), vec!["top", "first", "second", "last"]);
        assert_eq!(
            ranked.iter().map(|r| r.position_label()).collect::<Vec<_>>(),
            vec!["1", "=2", "=2", "4"]
        );
    }

    #[test]
    fn ranking_nothing_is_empty() {
        assert!(rank(&Aggregates::default()).is_empty());
    }
}
