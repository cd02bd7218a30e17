//! CSV exports of a track's results.

use thiserror::Error;

use crate::{
    tracks::scoring::{
        aggregate::contribution,
        display_round,
        snapshot::{Tabulation, TrackSnapshot},
    },
    util_resp::FailureResponse,
};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not write csv record: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not flush csv output: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv output was not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl From<ExportError> for FailureResponse {
    fn from(e: ExportError) -> Self {
        tracing::error!("export failed: {e}");
        FailureResponse::ServerError(())
    }
}

/// The first this many rows of the rankings are labelled as winners.
const WINNING_ROWS: usize = 3;

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// One row per participant with their final rank.
pub fn rankings_csv(
    snapshot: &TrackSnapshot,
    tabulation: &Tabulation,
) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "Rank", "Status", "Team", "Alias", "Booth", "Final Score", "Judges",
    ])?;

    for (row, entry) in tabulation.ranking.iter().enumerate() {
        let Some(participant) = snapshot.participant(&entry.participant_id)
        else {
            continue;
        };
        let judges = tabulation
            .aggregates
            .get(&participant.id)
            .map(|a| a.judge_count())
            .unwrap_or(0);
        // nobody wins without a score
        let status = if row < WINNING_ROWS && !entry.final_score.is_zero() {
            "WINNER"
        } else {
            "Finalist"
        };

        writer.write_record([
            entry.position_label(),
            status.to_string(),
            participant.real_name.clone(),
            participant.alias.clone().unwrap_or_default(),
            participant.booth_code.clone(),
            format!("{:.2}", entry.rounded_score()),
            judges.to_string(),
        ])?;
    }

    finish(writer)
}

/// The judge-by-participant matrix of subtotals.
pub fn matrix_csv(snapshot: &TrackSnapshot) -> Result<String, ExportError> {
    let matrix = snapshot.matrix();
    let mut writer = csv::Writer::from_writer(vec![]);

    let mut header = vec!["Rank".to_string(), "Team".into(), "Booth".into()];
    header.extend(matrix.judges.iter().map(|j| j.name.clone()));
    header.extend(["Variance".to_string(), "Average".to_string()]);
    writer.write_record(&header)?;

    for row in &matrix.rows {
        let mut record =
            vec![row.position_label.clone(), row.real_name.clone(), row.booth_code.clone()];
        record.extend(row.cells.iter().map(|cell| match cell.subtotal {
            Some(subtotal) => format!("{:.2}", display_round(subtotal)),
            None => String::new(),
        }));
        record.push(format!("{:.2}", display_round(row.variance)));
        record.push(format!("{:.2}", display_round(row.final_score)));
        writer.write_record(&record)?;
    }

    finish(writer)
}

/// Every stored cell with its weighted contribution.
pub fn audit_csv(snapshot: &TrackSnapshot) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "Judge",
        "Team",
        "Booth",
        "Criterion",
        "Weight",
        "Value",
        "Weighted Contribution",
        "Locked",
        "Unlock Requested",
        "Updated At",
    ])?;

    // roster order, then criterion order
    for participant in &snapshot.participants {
        for judge in &snapshot.judges {
            for criterion in &snapshot.criteria {
                let Some(cell) = snapshot
                    .ballot_cells(&judge.id, &participant.id)
                    .find(|c| c.criterion_id == criterion.id)
                else {
                    continue;
                };

                writer.write_record([
                    judge.name.clone(),
                    participant.real_name.clone(),
                    participant.booth_code.clone(),
                    criterion.name.clone(),
                    criterion.weight_decimal().to_string(),
                    cell.value.to_string(),
                    format!(
                        "{:.2}",
                        display_round(contribution(
                            cell.value,
                            criterion.weight_decimal()
                        ))
                    ),
                    cell.locked.to_string(),
                    cell.unlock_requested.to_string(),
                    cell.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ])?;
            }
        }
    }

    finish(writer)
}
