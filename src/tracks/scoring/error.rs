use thiserror::Error;

use crate::{
    tracks::TrackStatus,
    util_resp::{FailureResponse, error_page},
};

/// Errors produced by the scoring core.
///
/// The first four variants are policy violations and are never retried.
/// `Database` and `Pool` are faults of the storage layer which pass through
/// the store unchanged.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("these scores are locked and can no longer be edited")]
    Locked,
    #[error("scoring is closed for this track (status: {0})")]
    NotLive(TrackStatus),
    #[error("no such {0}")]
    NotFound(&'static str),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

impl ScoringError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ScoringError::Validation(msg.into())
    }
}

impl From<ScoringError> for FailureResponse {
    fn from(e: ScoringError) -> Self {
        match e {
            ScoringError::Validation(_) => {
                FailureResponse::BadRequest(error_page(&e.to_string()))
            }
            ScoringError::Locked | ScoringError::NotLive(_) => {
                FailureResponse::Conflict(error_page(&e.to_string()))
            }
            ScoringError::NotFound(_) => FailureResponse::NotFound(()),
            ScoringError::Database(_) | ScoringError::Pool(_) => {
                tracing::error!("storage failure in scoring core: {e}");
                FailureResponse::ServerError(())
            }
        }
    }
}
