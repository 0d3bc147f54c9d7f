use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time,
};

use crate::content::{Content, SpecialStyle};

use super::autoplay::{self, AutoAdvance};
use super::state::NavigationState;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// User-originated navigation requests, subject to gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Input {
    Next,
    Previous,
    TogglePlayback,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NavigationSnapshot {
    pub state: NavigationState,
    pub progress: f64,
    /// The exclusive full-screen overlay (closing declaration) is showing.
    pub overlay_revealed: bool,
}

struct Inner {
    nav: NavigationState,
    overlay_revealed: bool,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every change the timer depends on; a timer only fires if
    /// the epoch it was armed under is still current.
    epoch: u64,
}

impl Inner {
    fn timer_key(&self) -> (usize, usize, bool, bool) {
        (
            self.nav.current_section(),
            self.nav.current_slide(),
            self.nav.is_playing(),
            self.overlay_revealed,
        )
    }
}

/// Root-owned navigation state plus the single auto-advance timer. Cheap to
/// clone; clones share the same state.
#[derive(Clone)]
pub struct StoryController {
    content: Arc<Content>,
    inner: Arc<Mutex<Inner>>,
    snapshots: Arc<watch::Sender<NavigationSnapshot>>,
}

impl StoryController {
    pub fn new(content: Arc<Content>) -> Self {
        let nav = NavigationState::new();
        let (tx, _rx) = watch::channel(NavigationSnapshot {
            progress: content.progress_fraction(0, 0),
            state: nav.clone(),
            overlay_revealed: false,
        });

        Self {
            content,
            inner: Arc::new(Mutex::new(Inner {
                nav,
                overlay_revealed: false,
                timer: None,
                epoch: 0,
            })),
            snapshots: Arc::new(tx),
        }
    }

    pub fn content(&self) -> &Arc<Content> {
        &self.content
    }

    /// Receives a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<NavigationSnapshot> {
        self.snapshots.subscribe()
    }

    pub async fn state(&self) -> NavigationState {
        self.inner.lock().await.nav.clone()
    }

    pub async fn snapshot(&self) -> NavigationSnapshot {
        let guard = self.inner.lock().await;
        self.snapshot_of(&guard)
    }

    pub async fn advance(&self) {
        self.apply(|nav, content| nav.advance(content)).await
    }

    pub async fn retreat(&self) {
        self.apply(|nav, content| nav.retreat(content)).await
    }

    /// Returns `false` when `section_id` is unknown; nothing changes then.
    pub async fn jump_to(&self, section_id: usize, slide_index: usize) -> bool {
        let found = self
            .apply(|nav, content| nav.jump_to(content, section_id, slide_index))
            .await;
        if !found {
            log_warn!("Section {} not found, ignoring jump", section_id);
        }
        found
    }

    pub async fn toggle_playback(&self) {
        self.apply(|nav, _| nav.toggle_playback()).await
    }

    pub async fn toggle_mute(&self) {
        self.apply(|nav, _| nav.toggle_mute()).await
    }

    pub async fn set_muted(&self, muted: bool) {
        self.apply(|nav, _| nav.set_muted(muted)).await
    }

    pub async fn set_chapter_menu_visible(&self, visible: bool) {
        self.apply(|nav, _| nav.set_chapter_menu_visible(visible)).await
    }

    pub async fn set_full_screen_photo(&self, url: Option<&str>) {
        self.apply(|nav, _| nav.set_full_screen_photo(url)).await
    }

    pub async fn set_current_track(&self, track: usize) {
        self.apply(|nav, _| nav.set_current_track(track)).await
    }

    /// Back to the opening slide with every flag cleared, including the
    /// exclusive overlay.
    pub async fn reset(&self) {
        let mut guard = self.inner.lock().await;
        guard.nav.reset();
        guard.overlay_revealed = false;
        self.after_change(&mut guard, true);
        log_info!("Story reset");
    }

    /// Show the exclusive overlay. Returns `true` only for the call that
    /// actually revealed it.
    pub async fn reveal_overlay(&self) -> bool {
        let mut guard = self.inner.lock().await;
        if guard.overlay_revealed {
            return false;
        }
        guard.overlay_revealed = true;
        self.after_change(&mut guard, true);
        log_info!("Exclusive overlay revealed");
        true
    }

    /// Apply a user input unless the current screen refuses it. Returns
    /// whether the input was accepted.
    pub async fn handle_input(&self, input: Input) -> bool {
        let mut guard = self.inner.lock().await;

        if guard.overlay_revealed {
            log_debug!("Input {:?} blocked by overlay", input);
            return false;
        }

        let on_valentine = self
            .content
            .slide(guard.nav.current_section(), guard.nav.current_slide())
            .map(|slide| slide.slide.special() == Some(SpecialStyle::Valentine))
            .unwrap_or(false);
        if input == Input::Next && on_valentine {
            log_debug!("Forward navigation blocked on valentine slide");
            return false;
        }

        let key_before = guard.timer_key();
        let before = guard.nav.clone();
        match input {
            Input::Next => guard.nav.advance(&self.content),
            Input::Previous => guard.nav.retreat(&self.content),
            Input::TogglePlayback => guard.nav.toggle_playback(),
        }
        let changed = guard.nav != before;
        let rearm = guard.timer_key() != key_before;
        if changed {
            self.after_change(&mut guard, rearm);
        }
        true
    }

    /// Abort the pending auto-advance timer, if any.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        guard.epoch = guard.epoch.wrapping_add(1);
        if let Some(handle) = guard.timer.take() {
            handle.abort();
        }
    }

    async fn apply<R>(&self, f: impl FnOnce(&mut NavigationState, &Content) -> R) -> R {
        let mut guard = self.inner.lock().await;
        let key_before = guard.timer_key();
        let before = guard.nav.clone();

        let result = f(&mut guard.nav, self.content.as_ref());

        if guard.nav != before {
            let rearm = guard.timer_key() != key_before;
            self.after_change(&mut guard, rearm);
        }
        result
    }

    fn after_change(&self, inner: &mut Inner, rearm: bool) {
        if rearm {
            self.arm_timer(inner);
        }
        let (section, slide) = inner.nav.position();
        log_debug!(
            "Navigation now at section {} slide {} (playing: {})",
            section,
            slide,
            inner.nav.is_playing()
        );
        self.snapshots.send_replace(self.snapshot_of(inner));
    }

    fn arm_timer(&self, inner: &mut Inner) {
        inner.epoch = inner.epoch.wrapping_add(1);
        if let Some(handle) = inner.timer.take() {
            handle.abort();
        }

        let decision = autoplay::decide(&inner.nav, &self.content, inner.overlay_revealed);
        let AutoAdvance::Arm(duration) = decision else {
            return;
        };

        let epoch = inner.epoch;
        let controller = self.clone();
        inner.timer = Some(tokio::spawn(async move {
            time::sleep(duration).await;
            controller.fire_timer(epoch).await;
        }));
    }

    async fn fire_timer(&self, epoch: u64) {
        let mut guard = self.inner.lock().await;
        if guard.epoch != epoch {
            return;
        }
        // this task is the armed timer; detach it before re-arming
        guard.timer = None;
        log_debug!("Auto-advance timer fired");

        let key_before = guard.timer_key();
        guard.nav.advance(&self.content);
        let rearm = guard.timer_key() != key_before;
        self.after_change(&mut guard, rearm);
    }

    fn snapshot_of(&self, inner: &Inner) -> NavigationSnapshot {
        let (section, slide) = inner.nav.position();
        NavigationSnapshot {
            state: inner.nav.clone(),
            progress: self.content.progress_fraction(section, slide),
            overlay_revealed: inner.overlay_revealed,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::content::model::Slide;
    use crate::content::test_fixtures::sample_config;

    fn controller(sizes: &[usize]) -> StoryController {
        StoryController::new(Arc::new(Content::load(&sample_config(sizes)).unwrap()))
    }

    #[tokio::test(start_paused = true)]
    async fn auto_advance_follows_slide_durations() {
        let controller = controller(&[2, 3]);
        controller.toggle_playback().await;

        time::sleep(Duration::from_millis(4100)).await;
        assert_eq!(controller.state().await.position(), (0, 1));

        time::sleep(Duration::from_millis(5000)).await;
        let state = controller.state().await;
        assert_eq!(state.position(), (1, 0));
        assert_eq!(state.current_track(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_navigation_rearms_the_timer() {
        let controller = controller(&[3, 1]);
        controller.toggle_playback().await;

        time::sleep(Duration::from_millis(3000)).await;
        controller.advance().await;

        // the 4s timer of slide 0 would have fired at 4s; the new 5s one fires at 8s
        time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(controller.state().await.position(), (0, 1));

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.state().await.position(), (0, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn pausing_cancels_the_pending_advance() {
        let controller = controller(&[2]);
        controller.toggle_playback().await;
        time::sleep(Duration::from_millis(1000)).await;
        controller.toggle_playback().await;

        time::sleep(Duration::from_secs(30)).await;
        let state = controller.state().await;
        assert_eq!(state.position(), (0, 0));
        assert!(state.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn plays_through_to_terminal_and_stops() {
        let controller = controller(&[2, 1]);
        controller.toggle_playback().await;

        time::sleep(Duration::from_secs(60)).await;
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.state.position(), (2, 0));
        assert!(!snapshot.state.is_playing());
        assert_eq!(snapshot.progress, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn mute_changes_do_not_reset_the_countdown() {
        let controller = controller(&[2]);
        controller.toggle_playback().await;

        time::sleep(Duration::from_millis(3000)).await;
        controller.toggle_mute().await;
        time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(controller.state().await.position(), (0, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn overlay_suppresses_auto_advance_and_blocks_input() {
        let controller = controller(&[3]);
        controller.toggle_playback().await;

        assert!(controller.reveal_overlay().await);
        assert!(!controller.reveal_overlay().await);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(controller.state().await.position(), (0, 0));
        assert!(!controller.handle_input(Input::Next).await);
        assert!(!controller.handle_input(Input::TogglePlayback).await);

        controller.reset().await;
        assert!(!controller.snapshot().await.overlay_revealed);
        assert!(controller.handle_input(Input::Next).await);
        assert_eq!(controller.state().await.position(), (0, 1));
    }

    #[tokio::test]
    async fn valentine_slide_refuses_forward_input_only() {
        let mut config = sample_config(&[1, 2]);
        config.sections[1].slides[1] = Slide::Text(crate::content::model::TextSlide {
            content: "Will you?".into(),
            duration: 3000,
            special: Some(SpecialStyle::Valentine),
            background_photo: None,
        });
        let controller = StoryController::new(Arc::new(Content::load(&config).unwrap()));
        assert!(controller.jump_to(1, 1).await);

        assert!(!controller.handle_input(Input::Next).await);
        assert_eq!(controller.state().await.position(), (1, 1));

        assert!(controller.handle_input(Input::Previous).await);
        assert_eq!(controller.state().await.position(), (1, 0));
    }

    #[tokio::test]
    async fn invalid_jump_leaves_state_and_reports_failure() {
        let controller = controller(&[2, 2]);
        controller.advance().await;
        let before = controller.state().await;

        assert!(!controller.jump_to(9, 0).await);
        assert_eq!(controller.state().await, before);
    }

    #[tokio::test]
    async fn subscribers_see_each_change() {
        let controller = controller(&[2, 3, 1]);
        let mut rx = controller.subscribe();

        controller.jump_to(2, 0).await;
        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.state.position(), (2, 0));
        assert_eq!(snapshot.progress, 5.0 / 6.0);
    }
}
