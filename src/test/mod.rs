//! Shared fixtures for the unit tests and the end-to-end workloads.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::Request,
    http::header::{CONTENT_TYPE, COOKIE},
    response::Response,
};
use axum_extra::extract::cookie::Key;
use diesel::{
    Connection, SqliteConnection, connection::LoadConnection, sqlite::Sqlite,
};
use diesel_migrations::MigrationHarness;
use tower::ServiceExt;

use crate::{
    MIGRATIONS,
    config::{Settings, create_app},
    msg::Msg,
    state::{AppState, DbPool, build_pool},
    tracks::{
        Track, TrackStatus,
        criteria::{RatingScale, create_criterion},
        participants::{create_judge, create_participant},
    },
};


// This is a macro rather than a function because the `assert!` panic
// then directly notes the span of the call site.
macro_rules! assert_res_ok {
    ($response:expr) => {
        assert!(
            $response.status().is_success()
                || $response.status().is_redirection(),
            "response status = {:?}, str = {}",
            $response.status(),
            {
                let body_bytes =
                    axum::body::to_bytes($response.into_body(), usize::MAX)
                        .await
                        .unwrap();
                String::from_utf8_lossy(&body_bytes).to_string()
            }
        );
    };
}
pub(crate) use assert_res_ok;

/// A single connection to a fresh, migrated in-memory database.
pub fn memory_conn() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:").unwrap();
    conn.run_pending_migrations(MIGRATIONS).unwrap();
    conn
}

/// A pool over a fresh, migrated in-memory database.
pub fn memory_pool() -> DbPool {
    let pool = build_pool(":memory:").unwrap();
    pool.get().unwrap().run_pending_migrations(MIGRATIONS).unwrap();
    pool
}

pub fn seed_track(
    conn: &mut impl LoadConnection<Backend = Sqlite>,
    title: &str,
) -> Track {
    Track::create(title, None, conn).unwrap()
}

/// A live track with two criteria (Design 60%, Function 40%), three
/// participants (Alpha, Beta, Gamma in that order) and two judges.
pub struct ScoringFixture {
    pub track_id: String,
    pub p1: String,
    pub p2: String,
    pub p3: String,
    pub j1: String,
    pub j2: String,
    pub design: String,
    pub function: String,
}

impl ScoringFixture {
    pub fn design_and_function(
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Self {
        Self::build(RatingScale::Continuous, conn)
    }

    /// As [`ScoringFixture::design_and_function`], but Function is rated on
    /// the five level scale.
    pub fn with_categorical(
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Self {
        Self::build(RatingScale::Categorical, conn)
    }

    fn build(
        function_scale: RatingScale,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Self {
        let track = seed_track(conn, "Hardware");
        track.set_status(TrackStatus::Live, conn).unwrap();

        let design = create_criterion(
            &track.id,
            "Design",
            "",
            60.0,
            RatingScale::Continuous,
            conn,
        )
        .unwrap();
        let function = create_criterion(
            &track.id,
            "Function",
            "",
            40.0,
            function_scale,
            conn,
        )
        .unwrap();

        let p1 = create_participant(&track.id, "Alpha", None, "A-1", conn)
            .unwrap();
        let p2 =
            create_participant(&track.id, "Beta", None, "A-2", conn).unwrap();
        let p3 = create_participant(&track.id, "Gamma", None, "A-3", conn)
            .unwrap();

        let j1 = create_judge(&track.id, "Judge One", conn).unwrap();
        let j2 = create_judge(&track.id, "Judge Two", conn).unwrap();

        ScoringFixture {
            track_id: track.id,
            p1: p1.id,
            p2: p2.id,
            p3: p3.id,
            j1: j1.id,
            j2: j2.id,
            design: design.id,
            function: function.id,
        }
    }

    /// The track as it is currently stored.
    pub fn track(&self, conn: &mut impl LoadConnection<Backend = Sqlite>) -> Track {
        crate::tracks::scoring::store::fetch_track(&self.track_id, conn).unwrap()
    }
}

pub fn test_settings() -> Settings {
    Settings {
        secret_key: Some("0".repeat(64)),
        ..Settings::default()
    }
}

/// The full application over a fresh in-memory database.
pub fn test_app() -> (Router, AppState) {
    let pool = memory_pool();
    let (tx, _) = tokio::sync::broadcast::channel::<Msg>(1000);
    let state = AppState {
        pool,
        key: Key::from(&[0u8; 64]),
        tx,
        settings: Arc::new(test_settings()),
    };
    (create_app(state.clone()), state)
}

pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
    let mut request = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_form(
    app: &Router,
    uri: &str,
    form: &[(&str, &str)],
    cookie: Option<&str>,
) -> Response {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    app.clone()
        .oneshot(
            request
                .body(Body::from(serde_urlencoded::to_string(form).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// The `name=value` part of the first cookie a response sets.
pub fn session_cookie(response: &Response) -> String {
    response
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).to_string()
}
