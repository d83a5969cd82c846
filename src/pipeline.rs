use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::export_json;
use crate::html::escape;
use crate::strava::{ActivitySummary, StravaClient, ACTIVITY_PAGE_URL};
use crate::track::Track;

pub type ProgressChunk = Result<String, Infallible>;

/// Sends HTML progress lines to the browser. A closed receiver does not stop the export.
pub struct Progress {
    tx: UnboundedSender<ProgressChunk>,
    disconnected: AtomicBool,
}

impl Progress {
    pub fn channel() -> (Progress, UnboundedReceiver<ProgressChunk>) {
        let (tx, rx) = mpsc::unbounded();
        let progress = Progress {
            tx,
            disconnected: AtomicBool::new(false),
        };
        (progress, rx)
    }

    pub fn send(&self, line: impl Into<String>) {
        if self.tx.unbounded_send(Ok(line.into())).is_err()
            && !self.disconnected.swap(true, Ordering::Relaxed)
        {
            warn!("browser went away, export continues");
        }
    }
}

/// Lists the user's activities, fetches the streams of every activity of the configured
/// type, and writes them to the export file. Returns the exported tracks by activity id.
pub async fn run(
    client: &StravaClient,
    config: &Config,
    access_token: &str,
    progress: &Progress,
) -> Result<HashMap<String, Track>> {
    progress.send("<p>Generating JSON...</p>");

    let (ids, mut tracks) = fetch_activities(
        client,
        access_token,
        &config.activity_type,
        config.page_size,
        progress,
    )
    .await?;
    progress.send("<br>\n");
    info!(
        activity_type = %config.activity_type,
        matched = ids.len(),
        "activity list fetched"
    );

    fetch_tracks(client, access_token, &ids, &mut tracks, progress).await?;

    let path = config.export_path.clone();
    let keys: Vec<String> = ids.iter().map(u64::to_string).collect();
    let tracks = tokio::task::spawn_blocking(move || {
        export_json(&path, &keys, &tracks).map(|_| tracks)
    })
    .await
    .map_err(|e| Error::Internal(format!("export task failed: {e}")))??;

    let path = config.export_path.display().to_string();
    info!(path = %path, tracks = tracks.len(), "export written");
    progress.send(format!("<br><b>{}</b> has been generated", escape(&path)));
    Ok(tracks)
}

/// Pages through the activity list until an empty page and keeps the activities whose
/// `type` equals `activity_type`, in list order. A page shorter than `page_size` is not
/// taken as the end, since the provider may serve fewer entries per page than asked.
async fn fetch_activities(
    client: &StravaClient,
    access_token: &str,
    activity_type: &str,
    page_size: u32,
    progress: &Progress,
) -> Result<(Vec<u64>, HashMap<String, Track>)> {
    let page_size = page_size.max(1);
    let mut ids = Vec::new();
    let mut tracks = HashMap::new();

    for page in 1.. {
        let activities = client
            .list_activities(access_token, page, page_size)
            .await?;
        if activities.is_empty() {
            break;
        }

        for activity in activities {
            if activity.get("type").and_then(Value::as_str) != Some(activity_type) {
                continue;
            }
            let summary: ActivitySummary = serde_json::from_value(activity)
                .map_err(|e| Error::malformed(format!("activity list page {page}"), e))?;
            let key = summary.id.to_string();
            if tracks.contains_key(&key) {
                continue;
            }

            progress.send(format!(
                "<a href=\"{ACTIVITY_PAGE_URL}/{id}\">{kind} {id}</a><br>\n",
                id = summary.id,
                kind = escape(&summary.activity_type),
            ));
            ids.push(summary.id);
            tracks.insert(key, Track::from_summary(&summary));
        }
    }

    Ok((ids, tracks))
}

async fn fetch_tracks(
    client: &StravaClient,
    access_token: &str,
    ids: &[u64],
    tracks: &mut HashMap<String, Track>,
    progress: &Progress,
) -> Result<()> {
    for id in ids {
        let streams = client.activity_streams(access_token, *id).await?;
        progress.send(format!(
            "{} lat-long points loaded<br>\n",
            streams.coords.len()
        ));

        let track = tracks
            .get_mut(&id.to_string())
            .ok_or_else(|| Error::Internal(format!("no track recorded for activity {id}")))?;
        track.attach_streams(streams)?;
        if track.is_empty() {
            debug!(id, "activity has no GPS samples");
        }
    }
    Ok(())
}
