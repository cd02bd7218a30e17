//! The scoring core: storage of individual ratings, the ballot lock state
//! machine, aggregation into weighted scores, ranking and the public
//! projection of the ranking.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::tracks::criteria::RatingScale;

pub mod aggregate;
pub mod ballot;
pub mod error;
pub mod export;
pub mod lock;
pub mod manage;
pub mod matrix;
pub mod projection;
pub mod ranking;
pub mod snapshot;
pub mod store;

pub use error::ScoringError;

/// One judge's rating of one participant on one criterion.
#[derive(Queryable, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ScoreCell {
    pub id: String,
    pub track_id: String,
    pub judge_id: String,
    pub participant_id: String,
    pub criterion_id: String,
    pub value: i64,
    pub locked: bool,
    pub unlock_requested: bool,
    pub updated_at: NaiveDateTime,
}

/// Who is writing a score. Organizers may overwrite locked cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actor {
    Judge,
    Organizer,
}

/// A rating as it was entered, before it is mapped onto the stored 0-100
/// scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rating {
    Continuous(i64),
    /// A level from 1 to 5.
    Categorical(i64),
}

pub const CATEGORICAL_LEVELS: i64 = 5;
const CATEGORICAL_STEP: i64 = 20;

impl Rating {
    /// Interprets raw form input according to the criterion's scale.
    pub fn for_scale(scale: RatingScale, raw: i64) -> Rating {
        match scale {
            RatingScale::Continuous => Rating::Continuous(raw),
            RatingScale::Categorical => Rating::Categorical(raw),
        }
    }

    /// The value which is stored in the score cell.
    pub fn value(self) -> Result<i64, ScoringError> {
        match self {
            Rating::Continuous(v) if (0..=100).contains(&v) => Ok(v),
            Rating::Continuous(v) => Err(ScoringError::validation(format!(
                "{v} is not between 0 and 100"
            ))),
            Rating::Categorical(level)
                if (1..=CATEGORICAL_LEVELS).contains(&level) =>
            {
                Ok(level * CATEGORICAL_STEP)
            }
            Rating::Categorical(level) => Err(ScoringError::validation(
                format!("{level} is not a level between 1 and 5"),
            )),
        }
    }

    /// The inverse of [`Rating::value`], used to pre-fill ballot forms.
    pub fn from_stored(scale: RatingScale, value: i64) -> Rating {
        match scale {
            RatingScale::Continuous => Rating::Continuous(value),
            RatingScale::Categorical => {
                Rating::Categorical(value / CATEGORICAL_STEP)
            }
        }
    }

    pub fn raw(self) -> i64 {
        match self {
            Rating::Continuous(v) | Rating::Categorical(v) => v,
        }
    }
}

/// Rounds a score to the two decimal places it is shown with. Halves round
/// away from zero, so a contribution of 0.125 is shown as 0.13.
pub fn display_round(score: Decimal) -> Decimal {
    score.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
impl ScoreCell {
    pub fn for_test(
        judge_id: &str,
        participant_id: &str,
        criterion_id: &str,
        value: i64,
    ) -> ScoreCell {
        ScoreCell {
            id: format!("{judge_id}/{participant_id}/{criterion_id}"),
            track_id: "track".to_string(),
            judge_id: judge_id.to_string(),
            participant_id: participant_id.to_string(),
            criterion_id: criterion_id.to_string(),
            value,
            locked: false,
            unlock_requested: false,
            updated_at: NaiveDateTime::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorical_levels_map_onto_the_percentage_scale() {
        assert_eq!(Rating::Categorical(1).value().unwrap(), 20);
        assert_eq!(Rating::Categorical(5).value().unwrap(), 100);
        assert!(Rating::Categorical(0).value().is_err());
        assert!(Rating::Categorical(6).value().is_err());
        assert_eq!(
            Rating::from_stored(RatingScale::Categorical, 60),
            Rating::Categorical(3)
        );
    }

    #[test]
    fn continuous_ratings_are_range_checked() {
        assert_eq!(Rating::Continuous(0).value().unwrap(), 0);
        assert_eq!(Rating::Continuous(100).value().unwrap(), 100);
        assert!(matches!(
            Rating::Continuous(101).value(),
            Err(ScoringError::Validation(_))
        ));
        assert!(Rating::Continuous(-1).value().is_err());
    }

    #[test]
    fn halves_round_up_for_display() {
        assert_eq!(display_round(Decimal::new(125, 3)), Decimal::new(13, 2));
        assert_eq!(display_round(Decimal::new(1_005, 3)), Decimal::new(101, 2));
        assert_eq!(display_round(Decimal::new(124, 3)), Decimal::new(12, 2));
        assert_eq!(format!("{:.2}", display_round(Decimal::new(68, 0))), "68.00");
    }
}
