//! One root-owned story session: content, navigation, images, network and
//! audio wired together, with the background loops that keep them in step.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audio::{AudioPlayer, AudioSync, PlaybackTime, TimeCue};
use crate::content::Content;
use crate::images::{
    ImageCache, ImageLoader, NetworkAdapter, NetworkPolicy, PreloadHints, PreloadScheduler,
};
use crate::navigation::{NavigationSnapshot, StoryController};
use crate::settings::EngineSettings;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub struct StorySession<L: ImageLoader, A: AudioPlayer> {
    id: Uuid,
    controller: StoryController,
    cache: ImageCache<L>,
    scheduler: PreloadScheduler<L>,
    network: NetworkAdapter,
    audio: Arc<A>,
    hints: Option<PreloadHints>,
    cancel_token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl<L: ImageLoader, A: AudioPlayer> StorySession<L, A> {
    /// Build every component and spawn the audio, preload and cue loops.
    /// Must be called from within a tokio runtime.
    pub async fn start(
        content: Arc<Content>,
        settings: &EngineSettings,
        loader: L,
        audio: Arc<A>,
        network: NetworkAdapter,
    ) -> Self {
        let id = Uuid::new_v4();
        log_info!(
            "Starting story session {} ({} sections, {} slides)",
            id,
            content.sections().len(),
            content.total_slides()
        );

        let cache = ImageCache::new(loader, settings.cache_capacity);
        let scheduler = PreloadScheduler::new(cache.clone(), settings.max_concurrent_preloads);
        let controller = StoryController::new(Arc::clone(&content));
        let cancel_token = CancellationToken::new();
        let hints = settings.hints_path.clone().map(PreloadHints::new);

        if settings.start_muted {
            controller.set_muted(true).await;
        }

        let mut handles = Vec::new();

        if let Some(hints) = hints.clone() {
            let cache = cache.clone();
            let token = cancel_token.child_token();
            handles.push(tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    restored = cache.restore_hints(&hints) => {
                        log_debug!("Restored {} images from hints", restored);
                    }
                }
            }));
        }

        let audio_sync = AudioSync::new(Arc::clone(&audio));
        handles.push(tokio::spawn(
            audio_sync.run(controller.subscribe(), cancel_token.child_token()),
        ));

        handles.push(tokio::spawn(preload_loop(
            controller.subscribe(),
            network.subscribe(),
            scheduler.clone(),
            Arc::clone(&content),
            cancel_token.child_token(),
        )));

        let cues: Vec<TimeCue> = content.cues().iter().map(TimeCue::from).collect();
        if !cues.is_empty() {
            handles.push(tokio::spawn(cue_loop(
                controller.clone(),
                audio.time_updates(),
                cues,
                cancel_token.child_token(),
            )));
        }

        if settings.autoplay {
            controller.toggle_playback().await;
        }

        Self {
            id,
            controller,
            cache,
            scheduler,
            network,
            audio,
            hints,
            cancel_token,
            handles,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn controller(&self) -> &StoryController {
        &self.controller
    }

    pub fn cache(&self) -> &ImageCache<L> {
        &self.cache
    }

    pub fn scheduler(&self) -> &PreloadScheduler<L> {
        &self.scheduler
    }

    pub fn network(&self) -> &NetworkAdapter {
        &self.network
    }

    pub fn audio(&self) -> &Arc<A> {
        &self.audio
    }

    /// Resolves once navigation reaches the closing stage.
    pub async fn wait_until_complete(&self) -> Result<()> {
        let mut snapshots = self.controller.subscribe();
        snapshots
            .wait_for(|snapshot| snapshot.state.is_complete())
            .await
            .context("story controller went away before completion")?;
        Ok(())
    }

    /// Stop the loops and the timer, save preload hints and release audio.
    pub async fn shutdown(mut self) -> Result<()> {
        log_info!("Shutting down story session {}", self.id);
        self.cancel_token.cancel();
        self.controller.shutdown().await;

        for handle in self.handles.drain(..) {
            handle.await.context("session loop task failed to join")?;
        }

        self.scheduler.clear();
        if let Some(hints) = &self.hints {
            if let Err(err) = self.cache.save_hints(hints) {
                log_warn!("Could not save preload hints: {:#}", err);
            }
        }
        self.audio.destroy();
        Ok(())
    }
}

/// Re-plan preloading whenever the position or the preload distance moves.
async fn preload_loop<L: ImageLoader>(
    mut snapshots: watch::Receiver<NavigationSnapshot>,
    mut policy: watch::Receiver<NetworkPolicy>,
    scheduler: PreloadScheduler<L>,
    content: Arc<Content>,
    cancel_token: CancellationToken,
) {
    let mut last = None;

    loop {
        let position = snapshots.borrow_and_update().state.position();
        let distance = policy.borrow_and_update().preload_distance;
        if last != Some((position, distance)) {
            scheduler.schedule(position.0, position.1, content.sections(), distance);
            last = Some((position, distance));
        }

        tokio::select! {
            _ = cancel_token.cancelled() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = policy.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    log_debug!("preload loop shutting down");
}

/// Reveal the overlay the first time each cue's threshold is reached.
async fn cue_loop(
    controller: StoryController,
    mut times: watch::Receiver<PlaybackTime>,
    mut cues: Vec<TimeCue>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            changed = times.changed() => {
                if changed.is_err() {
                    break;
                }
                let time = *times.borrow_and_update();
                for cue in cues.iter_mut() {
                    if cue.observe(&time) {
                        log_info!("Cue '{}' reached at {:.1}s", cue.name, time.seconds);
                        controller.reveal_overlay().await;
                    }
                }
            }
        }
    }
    log_debug!("cue loop shutting down");
}
