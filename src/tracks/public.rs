//! The public leaderboards. Nothing here needs a session, and nothing here
//! ever shows a real name unless the track has revealed them.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, WebSocketUpgrade, ws},
    response::{IntoResponse, Response},
};
use futures::{sink::SinkExt, stream::StreamExt};
use hypertext::prelude::*;
use tokio::sync::broadcast::{Receiver, Sender, error::RecvError};

use crate::{
    auth::User,
    config::Settings,
    msg::Msg,
    state::{Conn, DbPool},
    template::Page,
    tracks::{
        Track, TrackStatus,
        scoring::{projection::PublicStanding, snapshot::TrackSnapshot},
    },
    util_resp::{FailureResponse, StandardResponse, success},
};

/// Loads the track's snapshot, treating tracks which are still being set up
/// as if they did not exist.
async fn public_snapshot(
    pool: &DbPool,
    track_id: &str,
) -> Result<Arc<TrackSnapshot>, FailureResponse> {
    let snapshot = TrackSnapshot::load_concurrently(pool, track_id).await?;
    if snapshot.track.status() == TrackStatus::Setup {
        return Err(FailureResponse::NotFound(()));
    }
    Ok(snapshot)
}

pub async fn leaderboard_index(
    user: Option<User>,
    mut conn: Conn,
) -> StandardResponse {
    let tracks = Track::public_tracks(&mut *conn)?;

    success(
        Page::new()
            .user_opt(user)
            .body(maud! {
                div class="container py-4" {
                    h1 { "Leaderboards" }
                    @if tracks.is_empty() {
                        p class="text-muted" { "No tracks are live yet." }
                    }
                    div class="list-group" {
                        @for track in &tracks {
                            a class="list-group-item list-group-item-action d-flex justify-content-between"
                                href=(format!("/tracks/{}/leaderboard", track.id)) {
                                (track.title)
                                @if track.is_live() {
                                    span class="badge text-bg-success" { "live" }
                                } @else {
                                    span class="badge text-bg-secondary" { "final" }
                                }
                            }
                        }
                    }
                }
            })
            .render(),
    )
}

struct StandingsTable<'r> {
    standings: &'r [PublicStanding],
}

impl Renderable for StandingsTable<'_> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        maud! {
            table class="table table-striped align-middle" {
                thead {
                    tr {
                        th { "Rank" }
                        th { "Team" }
                        th class="text-end" { "Score" }
                    }
                }
                tbody {
                    @for standing in self.standings {
                        tr {
                            td {
                                @if standing.tied { "=" }
                                (standing.rank.to_string())
                            }
                            td {
                                (standing.display_name)
                                @if let Some(sub_label) = &standing.sub_label {
                                    div class="text-muted small" { (sub_label) }
                                }
                            }
                            td class="text-end" { (format!("{:.2}", standing.score)) }
                        }
                    }
                }
            }
        }
        .render_to(buffer);
    }
}

pub async fn leaderboard_page(
    Path(track_id): Path<String>,
    State(pool): State<DbPool>,
    State(settings): State<Arc<Settings>>,
    user: Option<User>,
) -> StandardResponse {
    let snapshot = public_snapshot(&pool, &track_id).await?;
    let standings = snapshot.leaderboard();
    let live = snapshot.track.is_live();

    success(
        Page::new()
            .user_opt(user)
            .track(snapshot.track.clone())
            .body(maud! {
                div class="container py-4" {
                    h1 { (snapshot.track.title) }
                    @if live {
                        p class="text-muted" { "Live results. This page updates as judges submit their scores." }
                    } @else {
                        p class="text-muted" { "Final results." }
                    }
                    div hx-get=(format!("/tracks/{}/leaderboard/fragment", snapshot.track.id))
                        hx-trigger=(format!("every {}s", settings.poll_interval_secs))
                        hx-swap="innerHTML" {
                        StandingsTable standings=(&standings);
                    }
                }
            })
            .render(),
    )
}

pub async fn leaderboard_fragment(
    Path(track_id): Path<String>,
    State(pool): State<DbPool>,
) -> StandardResponse {
    let snapshot = public_snapshot(&pool, &track_id).await?;
    let standings = snapshot.leaderboard();

    success(maud! { StandingsTable standings=(&standings); }.render())
}

pub async fn leaderboard_json(
    Path(track_id): Path<String>,
    State(pool): State<DbPool>,
) -> Result<Json<Vec<PublicStanding>>, FailureResponse> {
    let snapshot = public_snapshot(&pool, &track_id).await?;
    Ok(Json(snapshot.leaderboard()))
}

/// Pushes the leaderboard (as JSON) to the client once on connection, and
/// then again whenever the track changes.
pub async fn leaderboard_updates(
    ws: WebSocketUpgrade,
    Path(track_id): Path<String>,
    State(pool): State<DbPool>,
    State(tx): State<Sender<Msg>>,
) -> Response {
    // subscribe before the first load, so no change can fall in between
    let rx = tx.subscribe();
    let snapshot = match public_snapshot(&pool, &track_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => return e.into_response(),
    };

    ws.on_upgrade(move |socket| {
        handle_socket(socket, rx, pool, snapshot.track.id.clone())
    })
}

async fn leaderboard_text(pool: &DbPool, track_id: &str) -> Option<String> {
    let snapshot = public_snapshot(pool, track_id).await.ok()?;
    serde_json::to_string(&snapshot.leaderboard())
        .map_err(|e| tracing::error!("could not serialize leaderboard: {e}"))
        .ok()
}

async fn handle_socket(
    socket: ws::WebSocket,
    mut rx: Receiver<Msg>,
    pool: DbPool,
    track_id: String,
) {
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        let Some(initial) = leaderboard_text(&pool, &track_id).await else {
            return;
        };
        if sender.send(ws::Message::Text(initial)).await.is_err() {
            return;
        }

        loop {
            match rx.recv().await {
                Ok(msg) if msg.track_id == track_id => {}
                Ok(_) => continue,
                // some messages were dropped, and any of them may have
                // been for this track
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "leaderboard socket lagged");
                }
                Err(RecvError::Closed) => break,
            }

            // the track was deleted or taken back into setup
            let Some(text) = leaderboard_text(&pool, &track_id).await else {
                break;
            };
            if sender.send(ws::Message::Text(text)).await.is_err() {
                break;
            }
        }

        let _ = sender.close().await;
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {
            // keep alive
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };
}
