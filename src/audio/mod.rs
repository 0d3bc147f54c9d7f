pub mod cue;
pub mod sync;

pub use cue::TimeCue;
pub use sync::AudioSync;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Elapsed-time updates are published at this rate.
pub const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// Elapsed playback position of the active track.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackTime {
    /// `None` while nothing is loaded.
    pub track: Option<usize>,
    pub seconds: f64,
}

/// The audio backend the story drives. Navigation decides which track should
/// be active; the player only executes.
pub trait AudioPlayer: Send + Sync + 'static {
    fn play(&self, track: usize, start_seconds: f64) -> Result<()>;
    fn pause(&self) -> Result<()>;
    fn resume(&self) -> Result<()>;
    fn set_mute(&self, muted: bool) -> Result<()>;
    fn stop(&self) -> Result<()>;
    /// Receives the elapsed position roughly every [`TIME_UPDATE_INTERVAL`].
    fn time_updates(&self) -> watch::Receiver<PlaybackTime>;

    /// Release the backend. Further calls may fail.
    fn destroy(&self) {
        if let Err(err) = self.stop() {
            log_warn!("Failed to stop audio on destroy: {:#}", err);
        }
    }
}

enum AudioCommand {
    Play { track: usize, start_seconds: f64 },
    Pause,
    Resume,
    Stop,
}

/// Player without an output device: keeps a playback clock per track and
/// publishes it like a real backend would. Used for headless runs.
pub struct ClockAudio {
    tx: mpsc::UnboundedSender<AudioCommand>,
    time_rx: watch::Receiver<PlaybackTime>,
    muted: Arc<AtomicBool>,
    cancel_token: CancellationToken,
}

impl ClockAudio {
    /// Spawns the clock task; needs a running tokio runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (time_tx, time_rx) = watch::channel(PlaybackTime::default());
        let cancel_token = CancellationToken::new();

        tokio::spawn(clock_loop(rx, time_tx, cancel_token.clone()));

        Self {
            tx,
            time_rx,
            muted: Arc::new(AtomicBool::new(false)),
            cancel_token,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    fn send(&self, command: AudioCommand) -> Result<()> {
        self.tx
            .send(command)
            .ok()
            .context("audio clock is no longer running")
    }
}

impl AudioPlayer for ClockAudio {
    fn play(&self, track: usize, start_seconds: f64) -> Result<()> {
        self.send(AudioCommand::Play {
            track,
            start_seconds,
        })
    }

    fn pause(&self) -> Result<()> {
        self.send(AudioCommand::Pause)
    }

    fn resume(&self) -> Result<()> {
        self.send(AudioCommand::Resume)
    }

    fn set_mute(&self, muted: bool) -> Result<()> {
        self.muted.store(muted, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.send(AudioCommand::Stop)
    }

    fn time_updates(&self) -> watch::Receiver<PlaybackTime> {
        self.time_rx.clone()
    }

    fn destroy(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for ClockAudio {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn clock_loop(
    mut rx: mpsc::UnboundedReceiver<AudioCommand>,
    time_tx: watch::Sender<PlaybackTime>,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + TIME_UPDATE_INTERVAL, TIME_UPDATE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // (track, start offset, ticks elapsed)
    let mut current: Option<(usize, f64, u64)> = None;
    let mut running = false;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_debug!("audio clock shutting down");
                break;
            }
            command = rx.recv() => {
                let Some(command) = command else { break };
                match command {
                    AudioCommand::Play { track, start_seconds } => {
                        log_info!("Playing track {} from {:.1}s", track, start_seconds);
                        current = Some((track, start_seconds, 0));
                        running = true;
                        time_tx.send_replace(PlaybackTime {
                            track: Some(track),
                            seconds: start_seconds,
                        });
                    }
                    AudioCommand::Pause => running = false,
                    AudioCommand::Resume => running = current.is_some(),
                    AudioCommand::Stop => {
                        current = None;
                        running = false;
                        time_tx.send_replace(PlaybackTime::default());
                    }
                }
            }
            _ = ticker.tick() => {
                if !running {
                    continue;
                }
                if let Some((track, start, ticks)) = current.as_mut() {
                    *ticks += 1;
                    let seconds = *start + *ticks as f64 * TIME_UPDATE_INTERVAL.as_secs_f64();
                    time_tx.send_replace(PlaybackTime { track: Some(*track), seconds });
                }
            }
        }
    }
}
