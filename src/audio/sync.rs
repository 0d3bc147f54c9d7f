use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::navigation::NavigationSnapshot;

use super::AudioPlayer;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Keeps an [`AudioPlayer`] in line with navigation: the state's
/// `current_track` picks the track, `is_playing` pauses and resumes it,
/// `is_muted` is mirrored, and reaching the closing video stops playback.
/// A track change while paused is picked up on the next resume.
pub struct AudioSync<A: AudioPlayer> {
    player: Arc<A>,
    active_track: Option<usize>,
    paused: bool,
    muted: Option<bool>,
}

impl<A: AudioPlayer> AudioSync<A> {
    pub fn new(player: Arc<A>) -> Self {
        Self {
            player,
            active_track: None,
            paused: false,
            muted: None,
        }
    }

    pub fn active_track(&self) -> Option<usize> {
        self.active_track
    }

    pub fn apply(&mut self, snapshot: &NavigationSnapshot) {
        let state = &snapshot.state;

        if self.muted != Some(state.is_muted()) {
            self.muted = Some(state.is_muted());
            report("mute", self.player.set_mute(state.is_muted()));
        }

        if state.is_complete() {
            if self.active_track.take().is_some() {
                log_info!("Story complete, stopping audio");
                report("stop", self.player.stop());
            }
            self.paused = false;
            return;
        }

        let track = state.current_track();
        if state.is_playing() {
            if self.active_track != Some(track) {
                log_debug!("Switching audio to track {}", track);
                report("play", self.player.play(track, 0.0));
                self.active_track = Some(track);
                self.paused = false;
            } else if self.paused {
                report("resume", self.player.resume());
                self.paused = false;
            }
        } else if self.active_track.is_some() && !self.paused {
            report("pause", self.player.pause());
            self.paused = true;
        }
    }

    /// Follow snapshots until cancelled or the controller goes away, then
    /// stop the player.
    pub async fn run(
        mut self,
        mut snapshots: watch::Receiver<NavigationSnapshot>,
        cancel_token: CancellationToken,
    ) {
        let initial = snapshots.borrow_and_update().clone();
        self.apply(&initial);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    self.apply(&snapshot);
                }
            }
        }

        if self.active_track.take().is_some() {
            report("stop", self.player.stop());
        }
        log_debug!("audio sync loop shutting down");
    }
}

fn report(action: &str, result: Result<()>) {
    if let Err(err) = result {
        log_warn!("audio {} failed: {:#}", action, err);
    }
}
