use std::{net::SocketAddr, path::Path};

use axum::{
    Router,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use hypertext::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::{
    auth::{
        User,
        judge::{do_judge_login, judge_login_page, judge_logout},
        login::{do_login, login_page, logout},
        register::{do_register, register_page},
    },
    state::{AppState, Conn},
    template::Page,
    tracks::{
        Track,
        create::{create_track_page, do_create_track},
        criteria::manage::{add_criterion, remove_criterion},
        judge::{
            ballot_page, do_submit_ballot, judge_dashboard, lookup_booth,
            request_ballot_unlock,
        },
        manage::{remove_track, set_names_revealed, set_track_status, track_overview},
        participants::manage::{
            add_judge, add_participant, regenerate_track_aliases,
            remove_judge, remove_participant,
        },
        public::{
            leaderboard_fragment, leaderboard_index, leaderboard_json,
            leaderboard_page, leaderboard_updates,
        },
        scoring::manage::{
            audit_export, cell_breakdown, delete_cells, force_unlock_ballot,
            grant_unlock_ballot, matrix_export, override_cell,
            rankings_export, tabulation_fragment, tabulation_json,
            tabulation_page,
        },
    },
    util_resp::{StandardResponse, success},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid bind address `{0}`")]
    InvalidBind(String),
    #[error("the secret key must be at least 64 bytes long")]
    SecretTooShort,
}

/// Server settings. Every field has a default, so the config file only
/// needs to name the fields it changes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub bind: SocketAddr,
    /// A path to an SQLite database, or `:memory:`.
    pub database_url: String,
    /// Used to encrypt session cookies. When absent a random key is used,
    /// which signs everyone out whenever the server restarts.
    pub secret_key: Option<String>,
    /// How often the public leaderboard page refreshes itself.
    pub poll_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            database_url: ":memory:".to_string(),
            secret_key: None,
            poll_interval_secs: 3,
        }
    }
}

impl Settings {
    /// Reads the settings file (if any) and then applies the `DATABASE_URL`,
    /// `SECRET_KEY` and `BIND_ADDR` environment variables on top.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let settings = match path {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => Settings::default(),
        };
        settings.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Settings, ConfigError> {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(secret) = lookup("SECRET_KEY") {
            self.secret_key = Some(secret);
        }
        if let Some(bind) = lookup("BIND_ADDR") {
            self.bind = bind
                .parse()
                .map_err(|_| ConfigError::InvalidBind(bind.clone()))?;
        }
        Ok(self)
    }

    pub fn key(&self) -> Result<Key, ConfigError> {
        match &self.secret_key {
            Some(secret) if secret.len() >= 64 => Ok(Key::from(secret.as_bytes())),
            Some(_) => Err(ConfigError::SecretTooShort),
            None => {
                tracing::warn!(
                    "no secret key configured; sessions will not survive a restart"
                );
                Ok(Key::generate())
            }
        }
    }
}

pub async fn home(user: Option<User>, mut conn: Conn) -> StandardResponse {
    let tracks = match &user {
        Some(user) => Track::of_organizer(&user.id, &mut *conn)?,
        None => vec![],
    };
    let signed_in = user.is_some();

    success(
        Page::new()
            .user_opt(user)
            .body(maud! {
                div class="container py-4" {
                    h1 { "Expotab" }
                    p class="lead" {
                        "Live judging for exhibitions: judges score from their phones, organizers tabulate, and the leaderboard updates as scores come in."
                    }
                    @if signed_in {
                        h2 class="h4 mt-4" { "Your tracks" }
                        ul class="list-group mb-3" {
                            @for track in &tracks {
                                li class="list-group-item d-flex justify-content-between" {
                                    a href=(format!("/tracks/{}", track.id)) { (track.title) }
                                    span class="badge text-bg-secondary" { (track.status().as_str()) }
                                }
                            }
                        }
                        a class="btn btn-primary" href="/tracks/create" { "Create new track" }
                    } @else {
                        ul {
                            li { a href="/leaderboard" { "View the leaderboards" } }
                            li { a href="/judge/login" { "Sign in as a judge" } }
                            li { a href="/login" { "Organizer login" } }
                        }
                    }
                }
            })
            .render(),
    )
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login_page).post(do_login))
        .route("/logout", get(logout))
        .route("/register", get(register_page).post(do_register))
        // organizers
        .route("/tracks/create", get(create_track_page).post(do_create_track))
        .route("/tracks/:tid", get(track_overview))
        .route("/tracks/:tid/status", post(set_track_status))
        .route("/tracks/:tid/reveal", post(set_names_revealed))
        .route("/tracks/:tid/delete", post(remove_track))
        .route("/tracks/:tid/participants", post(add_participant))
        .route(
            "/tracks/:tid/participants/aliases",
            post(regenerate_track_aliases),
        )
        .route(
            "/tracks/:tid/participants/:pid/delete",
            post(remove_participant),
        )
        .route("/tracks/:tid/judges", post(add_judge))
        .route("/tracks/:tid/judges/:jid/delete", post(remove_judge))
        .route("/tracks/:tid/criteria", post(add_criterion))
        .route("/tracks/:tid/criteria/:cid/delete", post(remove_criterion))
        .route("/tracks/:tid/tabulation", get(tabulation_page))
        .route("/tracks/:tid/tabulation/fragment", get(tabulation_fragment))
        .route("/tracks/:tid/tabulation.json", get(tabulation_json))
        .route("/tracks/:tid/tabulation/:jid/:pid", get(cell_breakdown))
        .route(
            "/tracks/:tid/tabulation/:jid/:pid/unlock",
            post(grant_unlock_ballot),
        )
        .route(
            "/tracks/:tid/tabulation/:jid/:pid/force_unlock",
            post(force_unlock_ballot),
        )
        .route("/tracks/:tid/tabulation/:jid/:pid/delete", post(delete_cells))
        .route(
            "/tracks/:tid/tabulation/:jid/:pid/override",
            post(override_cell),
        )
        .route("/tracks/:tid/export/rankings.csv", get(rankings_export))
        .route("/tracks/:tid/export/matrix.csv", get(matrix_export))
        .route("/tracks/:tid/export/audit.csv", get(audit_export))
        // public
        .route("/leaderboard", get(leaderboard_index))
        .route("/tracks/:tid/leaderboard", get(leaderboard_page))
        .route("/tracks/:tid/leaderboard/fragment", get(leaderboard_fragment))
        .route("/tracks/:tid/leaderboard.json", get(leaderboard_json))
        .route("/tracks/:tid/leaderboard/updates", get(leaderboard_updates))
        // judges
        .route("/judge/login", get(judge_login_page).post(do_judge_login))
        .route("/judge/logout", get(judge_logout))
        .route("/judge", get(judge_dashboard))
        .route("/judge/lookup", post(lookup_booth))
        .route(
            "/judge/ballots/:pid",
            get(ballot_page).post(do_submit_ballot),
        )
        .route(
            "/judge/ballots/:pid/request_unlock",
            post(request_ballot_unlock),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn missing_fields_take_their_defaults() {
        let settings: Settings =
            toml::from_str("poll_interval_secs = 10").unwrap();
        assert_eq!(settings.poll_interval_secs, 10);
        assert_eq!(settings.database_url, ":memory:");
        assert_eq!(settings.bind, Settings::default().bind);
    }

    #[test]
    fn environment_overrides_the_file() {
        let env = HashMap::from([
            ("DATABASE_URL", "expo.db"),
            ("BIND_ADDR", "0.0.0.0:9000"),
        ]);
        let settings: Settings =
            toml::from_str("database_url = \"file.db\"").unwrap();

        let settings = settings
            .with_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.database_url, "expo.db");
        assert_eq!(settings.bind.port(), 9000);
        assert_eq!(settings.secret_key, None);
    }

    #[test]
    fn bad_overrides_are_reported() {
        let result = Settings::default()
            .with_overrides(|name| (name == "BIND_ADDR").then(|| "nowhere".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidBind(_))));

        let short = Settings {
            secret_key: Some("too short".to_string()),
            ..Settings::default()
        };
        assert!(matches!(short.key(), Err(ConfigError::SecretTooShort)));
    }
}
