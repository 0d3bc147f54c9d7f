use crate::content::model::CueConfig;

use super::PlaybackTime;

/// One-shot trigger on a track's elapsed time. Once fired it stays fired
/// until [`reset`](Self::reset), however often the threshold is seen again
/// and even if updates skip past it.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeCue {
    pub name: String,
    pub track: usize,
    pub at_seconds: f64,
    fired: bool,
}

impl TimeCue {
    pub fn new(name: impl Into<String>, track: usize, at_seconds: f64) -> Self {
        Self {
            name: name.into(),
            track,
            at_seconds,
            fired: false,
        }
    }

    /// Returns `true` exactly once: on the first update for this cue's track
    /// at or past the threshold.
    pub fn observe(&mut self, time: &PlaybackTime) -> bool {
        if self.fired || time.track != Some(self.track) || time.seconds < self.at_seconds {
            return false;
        }
        self.fired = true;
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn reset(&mut self) {
        self.fired = false;
    }
}

impl From<&CueConfig> for TimeCue {
    fn from(config: &CueConfig) -> Self {
        Self::new(config.name.clone(), config.track, config.at_seconds)
    }
}
