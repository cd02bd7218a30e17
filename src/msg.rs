// Every track shares one channel. Subscribers filter on `track_id`.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::Sender;

#[derive(Clone, Debug)]
/// A message which is sent after a modification to a track has been
/// committed. Pages and sockets which display data derived from the track
/// use this to decide when to recompute.
pub struct Msg {
    pub track_id: String,
    pub inner: MsgContents,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum MsgContents {
    ScoresUpdated,
    RosterUpdated,
    TrackUpdated,
}

/// Publishes a change notification. Having no subscribers is not an error.
pub fn notify(tx: &Sender<Msg>, track_id: &str, inner: MsgContents) {
    let receivers = tx
        .send(Msg {
            track_id: track_id.to_string(),
            inner,
        })
        .unwrap_or(0);
    tracing::debug!(track_id, receivers, "published change notification");
}
