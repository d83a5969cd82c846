use crate::error::{Error, Result};
use crate::strava::{ActivitySummary, TrackStreams};

/// One exported activity. Summary fields are filled from the activity list, the
/// coordinate and time samples from the activity's streams.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub date: String,
    pub max_speed: f64,
    pub average_speed: f64,
    pub distance: f64,
    pub duration: i64,
    coords: Vec<[f64; 2]>,
    times: Vec<i64>,
}

impl Track {
    pub fn from_summary(summary: &ActivitySummary) -> Self {
        Track {
            date: summary.start_date_local.clone(),
            max_speed: summary.max_speed,
            average_speed: summary.average_speed,
            distance: summary.distance,
            duration: summary.elapsed_time,
            coords: Vec::new(),
            times: Vec::new(),
        }
    }

    /// Replaces the samples. `coords[i]` and `times[i]` describe the same point.
    pub fn set_samples(&mut self, coords: Vec<[f64; 2]>, times: Vec<i64>) -> Result<()> {
        if coords.len() != times.len() {
            return Err(Error::Internal(format!(
                "{} coordinates but {} timestamps",
                coords.len(),
                times.len()
            )));
        }
        self.coords = coords;
        self.times = times;
        Ok(())
    }

    pub fn attach_streams(&mut self, streams: TrackStreams) -> Result<()> {
        self.set_samples(streams.coords, streams.times)
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// `(lat, lon, seconds)` per sample, in stream order.
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64, i64)> + '_ {
        self.coords
            .iter()
            .zip(&self.times)
            .map(|([lat, lon], time)| (*lat, *lon, *time))
    }
}
