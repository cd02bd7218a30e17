use std::{fmt, str::FromStr};

use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use rust_decimal::{Decimal, prelude::FromPrimitive};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    schema::{score_cells, track_criteria},
    tracks::scoring::ScoringError,
    validation::is_valid_name,
};

pub mod manage;

/// How a judge enters a rating for a criterion.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RatingScale {
    /// Any integer from 0 to 100.
    Continuous,
    /// One of five levels, stored as `level * 20`.
    Categorical,
}

impl RatingScale {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingScale::Continuous => "continuous",
            RatingScale::Categorical => "categorical",
        }
    }
}

impl fmt::Display for RatingScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RatingScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continuous" => Ok(RatingScale::Continuous),
            "categorical" => Ok(RatingScale::Categorical),
            other => Err(format!("unknown rating scale `{other}`")),
        }
    }
}

#[derive(Queryable, Serialize, Deserialize, Clone, Debug)]
pub struct Criterion {
    pub id: String,
    pub track_id: String,
    pub name: String,
    pub description: String,
    /// Percentage; the weights of a track are expected (but not required)
    /// to sum to 100.
    pub weight: f64,
    scale: String,
    pub seq: i64,
}

impl Criterion {
    pub fn scale(&self) -> RatingScale {
        self.scale.parse().unwrap_or_else(|e| {
            tracing::error!(criterion_id = %self.id, "{e}");
            RatingScale::Continuous
        })
    }

    /// The weight as a decimal. Weights which cannot be represented (NaN or
    /// infinite values) count as zero.
    pub fn weight_decimal(&self) -> Decimal {
        Decimal::from_f64(self.weight)
            .map(|w| w.normalize())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn fetch(
        criterion_id: &str,
        track_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Criterion, ScoringError> {
        track_criteria::table
            .filter(
                track_criteria::id
                    .eq(criterion_id)
                    .and(track_criteria::track_id.eq(track_id)),
            )
            .first::<Criterion>(conn)
            .optional()?
            .ok_or(ScoringError::NotFound("criterion"))
    }

    pub fn load_all(
        track_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Criterion>, diesel::result::Error> {
        track_criteria::table
            .filter(track_criteria::track_id.eq(track_id))
            .order_by(track_criteria::seq.asc())
            .load::<Criterion>(conn)
    }

    #[cfg(test)]
    pub fn for_test(id: &str, weight: f64) -> Criterion {
        Criterion {
            id: id.to_string(),
            track_id: "track".to_string(),
            name: id.to_string(),
            description: String::new(),
            weight,
            scale: RatingScale::Continuous.as_str().to_string(),
            seq: 0,
        }
    }
}

/// Sum of the weights of the given criteria.
pub fn weights_total(criteria: &[Criterion]) -> Decimal {
    criteria.iter().map(Criterion::weight_decimal).sum()
}

/// Whether the weights add up to exactly 100. Scores are still computed for
/// unbalanced tracks, but they are no longer on a 0-100 scale.
pub fn is_balanced(criteria: &[Criterion]) -> bool {
    weights_total(criteria) == Decimal::ONE_HUNDRED
}

#[tracing::instrument(skip(conn, description))]
pub fn create_criterion(
    track_id: &str,
    name: &str,
    description: &str,
    weight: f64,
    scale: RatingScale,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Criterion, ScoringError> {
    is_valid_name(name).map_err(ScoringError::Validation)?;
    if !weight.is_finite() || !(0.0..=100.0).contains(&weight) {
        return Err(ScoringError::validation(
            "a criterion's weight must be between 0 and 100",
        ));
    }

    conn.transaction(|conn| {
        let seq = track_criteria::table
            .filter(track_criteria::track_id.eq(track_id))
            .select(diesel::dsl::max(track_criteria::seq))
            .get_result::<Option<i64>>(conn)?
            .unwrap_or(0)
            + 1;

        let criterion = Criterion {
            id: Uuid::now_v7().to_string(),
            track_id: track_id.to_string(),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            weight,
            scale: scale.as_str().to_string(),
            seq,
        };

        diesel::insert_into(track_criteria::table)
            .values((
                track_criteria::id.eq(&criterion.id),
                track_criteria::track_id.eq(&criterion.track_id),
                track_criteria::name.eq(&criterion.name),
                track_criteria::description.eq(&criterion.description),
                track_criteria::weight.eq(criterion.weight),
                track_criteria::scale.eq(&criterion.scale),
                track_criteria::seq.eq(criterion.seq),
            ))
            .execute(conn)?;

        tracing::info!(criterion_id = %criterion.id, "criterion created");
        Ok(criterion)
    })
}

/// Deletes a criterion and every score cell recorded against it.
#[tracing::instrument(skip(conn))]
pub fn delete_criterion(
    criterion_id: &str,
    track_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<usize, ScoringError> {
    conn.transaction(|conn| {
        let criterion = Criterion::fetch(criterion_id, track_id, conn)?;
        let cells = diesel::delete(
            score_cells::table.filter(score_cells::criterion_id.eq(&criterion.id)),
        )
        .execute(conn)?;
        diesel::delete(
            track_criteria::table.filter(track_criteria::id.eq(&criterion.id)),
        )
        .execute(conn)?;
        tracing::info!(cells, "criterion deleted");
        Ok(cells)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{memory_conn, seed_track};

    #[test]
    fn weights_are_summed_exactly() {
        let criteria = vec![
            Criterion::for_test("a", 33.3),
            Criterion::for_test("b", 33.3),
            Criterion::for_test("c", 33.4),
        ];
        assert!(is_balanced(&criteria));

        let criteria = vec![Criterion::for_test("a", 60.0)];
        assert_eq!(weights_total(&criteria), Decimal::from(60));
        assert!(!is_balanced(&criteria));
    }

    #[test]
    fn criteria_are_listed_in_creation_order() {
        let mut conn = memory_conn();
        let track = seed_track(&mut conn, "Design");

        create_criterion(
            &track.id,
            "Design",
            "",
            60.0,
            RatingScale::Continuous,
            &mut conn,
        )
        .unwrap();
        create_criterion(
            &track.id,
            "Function",
            "Does it work?",
            40.0,
            RatingScale::Categorical,
            &mut conn,
        )
        .unwrap();

        let criteria = Criterion::load_all(&track.id, &mut conn).unwrap();
        assert_eq!(
            criteria.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["Design", "Function"]
        );
        assert_eq!(criteria[1].scale(), RatingScale::Categorical);
        assert!(is_balanced(&criteria));
    }

    #[test]
    fn out_of_range_weights_are_rejected() {
        let mut conn = memory_conn();
        let track = seed_track(&mut conn, "Design");

        for weight in [-1.0, 100.5, f64::NAN] {
            assert!(matches!(
                create_criterion(
                    &track.id,
                    "Design",
                    "",
                    weight,
                    RatingScale::Continuous,
                    &mut conn,
                ),
                Err(ScoringError::Validation(_))
            ));
        }
    }
}
