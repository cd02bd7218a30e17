//! The public view of a ranking.
//!
//! [`PublicIdentities`] is built straight from the roster and the track's
//! visibility flag. When names are hidden it never holds a participant's
//! real name, so nothing derived from it can leak one.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::tracks::{participants::Participant, scoring::ranking::RankedEntry};

#[derive(Clone, Debug, PartialEq)]
struct PublicIdentity {
    display_name: String,
    sub_label: Option<String>,
}

pub struct PublicIdentities {
    by_participant: HashMap<String, PublicIdentity>,
}

impl PublicIdentities {
    pub fn new(participants: &[Participant], names_revealed: bool) -> Self {
        let by_participant = participants
            .iter()
            .map(|p| {
                let identity = if names_revealed {
                    PublicIdentity {
                        display_name: p.real_name.clone(),
                        sub_label: p
                            .alias
                            .as_ref()
                            .filter(|alias| !alias.trim().is_empty())
                            .cloned(),
                    }
                } else {
                    PublicIdentity {
                        display_name: p.anonymous_label(),
                        sub_label: None,
                    }
                };
                (p.id.clone(), identity)
            })
            .collect();

        PublicIdentities { by_participant }
    }
}

/// One row of the public leaderboard.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PublicStanding {
    pub rank: usize,
    pub tied: bool,
    pub display_name: String,
    pub sub_label: Option<String>,
    /// Rounded to two decimal places.
    pub score: f64,
}

/// Maps a ranking onto public leaderboard rows. Entries whose participant is
/// not known to `identities` are dropped.
pub fn project(
    ranked: &[RankedEntry],
    identities: &PublicIdentities,
) -> Vec<PublicStanding> {
    ranked
        .iter()
        .filter_map(|entry| {
            let identity = identities.by_participant.get(&entry.participant_id)?;
            Some(PublicStanding {
                rank: entry.position,
                tied: entry.tied,
                display_name: identity.display_name.clone(),
                sub_label: identity.sub_label.clone(),
                score: entry.rounded_score().to_f64().unwrap_or(0.0),
            })
        })
        .collect()
}
