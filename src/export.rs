use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::track::Track;

#[cfg(windows)]
const NEWLINE: &str = "\r\n";
#[cfg(not(windows))]
const NEWLINE: &str = "\n";

/// Writes the tracks named by `ids` to `path` as one JSON object keyed by activity id,
/// then reads the file back and checks that it parses.
///
/// Field order is fixed (`date`, `max_speed`, `average_speed`, `distance`, `duration`,
/// `track`) and every sample sits on its own line as `lat, lon, seconds`. The `track`
/// array is flat: three numbers per sample. A file that fails the check is left on disk.
pub fn export_json(path: &Path, ids: &[String], tracks: &HashMap<String, Track>) -> Result<Value> {
    let content = render(ids, tracks)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;

    let written = fs::read_to_string(path)?;
    serde_json::from_str(&written).map_err(Error::InvalidOutput)
}

fn render(ids: &[String], tracks: &HashMap<String, Track>) -> Result<String> {
    if ids.is_empty() {
        return Err(Error::NoActivities);
    }

    let mut out = String::from("{");
    out.push_str(NEWLINE);

    for (i, id) in ids.iter().enumerate() {
        let track = lookup(tracks, id)?;
        if i > 0 {
            out.push(',');
        }
        out.push_str(&format!("{}: {{{NEWLINE}", string(id)?));
        out.push_str(&format!("\"date\": {},{NEWLINE}", string(&track.date)?));
        out.push_str(&format!("\"max_speed\": {},{NEWLINE}", float(track.max_speed)?));
        out.push_str(&format!("\"average_speed\": {},{NEWLINE}", float(track.average_speed)?));
        out.push_str(&format!("\"distance\": {},{NEWLINE}", float(track.distance)?));
        out.push_str(&format!("\"duration\": {},{NEWLINE}", track.duration));
        out.push_str("\"track\": [");
        for (j, (lat, lon, time)) in track.samples().enumerate() {
            if j > 0 {
                out.push(',');
            }
            out.push_str(&format!("{NEWLINE}{}, {}, {time}", float(lat)?, float(lon)?));
        }
        out.push_str(NEWLINE);
        out.push_str("]}");
    }

    out.push('}');
    out.push_str(NEWLINE);
    Ok(out)
}

/// The value `export_json` is expected to read back for the same input.
pub fn document(ids: &[String], tracks: &HashMap<String, Track>) -> Result<Value> {
    let mut doc = serde_json::Map::new();
    for id in ids {
        let track = lookup(tracks, id)?;
        let flat: Vec<Value> = track
            .samples()
            .flat_map(|(lat, lon, time)| [Value::from(lat), Value::from(lon), Value::from(time)])
            .collect();
        doc.insert(
            id.clone(),
            serde_json::json!({
                "date": track.date,
                "max_speed": track.max_speed,
                "average_speed": track.average_speed,
                "distance": track.distance,
                "duration": track.duration,
                "track": flat,
            }),
        );
    }
    Ok(Value::Object(doc))
}

fn lookup<'a>(tracks: &'a HashMap<String, Track>, id: &str) -> Result<&'a Track> {
    tracks
        .get(id)
        .ok_or_else(|| Error::Internal(format!("no track recorded for activity {id}")))
}

fn string(s: &str) -> Result<String> {
    serde_json::to_string(s).map_err(Error::InvalidOutput)
}

fn float(v: f64) -> Result<String> {
    if !v.is_finite() {
        return Err(Error::NonFiniteNumber(v));
    }
    serde_json::to_string(&v).map_err(Error::InvalidOutput)
}
