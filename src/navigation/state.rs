use serde::Serialize;

use crate::content::{Content, Stage};

/// Where the viewer is in the story and what the chrome around it shows.
///
/// Fields are read through accessors; every mutation goes through one of the
/// transition methods so `current_slide` always stays inside the current
/// section (or at 0 on the terminal stage).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    current_section: usize,
    current_slide: usize,
    is_playing: bool,
    is_paused: bool,
    is_complete: bool,
    is_muted: bool,
    current_track: usize,
    show_chapter_menu: bool,
    show_full_screen: bool,
    full_screen_photo_url: String,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            current_section: 0,
            current_slide: 0,
            is_playing: false,
            is_paused: false,
            is_complete: false,
            is_muted: false,
            current_track: 0,
            show_chapter_menu: false,
            show_full_screen: false,
            full_screen_photo_url: String::new(),
        }
    }
}

impl NavigationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_section(&self) -> usize {
        self.current_section
    }

    pub fn current_slide(&self) -> usize {
        self.current_slide
    }

    pub fn position(&self) -> (usize, usize) {
        (self.current_section, self.current_slide)
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    pub fn current_track(&self) -> usize {
        self.current_track
    }

    pub fn show_chapter_menu(&self) -> bool {
        self.show_chapter_menu
    }

    pub fn show_full_screen(&self) -> bool {
        self.show_full_screen
    }

    pub fn full_screen_photo_url(&self) -> &str {
        &self.full_screen_photo_url
    }

    pub fn advance(&mut self, content: &Content) {
        let Some(Stage::Section(section)) = content.stage(self.current_section) else {
            // already on the closing video
            return;
        };

        if self.current_slide < section.last_slide_index() {
            self.current_slide += 1;
            return;
        }

        match content.section_by_id(self.current_section + 1) {
            Some(next) => self.enter_section(next.id, 0, next.audio_track_index),
            None => self.enter_terminal(content),
        }
    }

    pub fn retreat(&mut self, content: &Content) {
        if self.current_slide > 0 {
            self.current_slide -= 1;
            return;
        }

        if self.current_section == 0 {
            return;
        }

        if let Some(previous) = content.section_by_id(self.current_section - 1) {
            self.enter_section(
                previous.id,
                previous.last_slide_index(),
                previous.audio_track_index,
            );
        }
    }

    /// Returns `false` and leaves the state untouched when `section_id` does
    /// not exist. `slide_index` is clamped into the section.
    pub fn jump_to(&mut self, content: &Content, section_id: usize, slide_index: usize) -> bool {
        match content.stage(section_id) {
            Some(Stage::Section(section)) => {
                let slide = slide_index.min(section.last_slide_index());
                self.enter_section(section.id, slide, section.audio_track_index);
                true
            }
            Some(Stage::Terminal(_)) => {
                self.enter_terminal(content);
                true
            }
            None => false,
        }
    }

    pub fn toggle_playback(&mut self) {
        self.is_paused = self.is_playing;
        self.is_playing = !self.is_playing;
    }

    pub fn toggle_mute(&mut self) {
        self.is_muted = !self.is_muted;
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.is_muted = muted;
    }

    pub fn set_chapter_menu_visible(&mut self, visible: bool) {
        self.show_chapter_menu = visible;
    }

    pub fn set_full_screen_photo(&mut self, url: Option<&str>) {
        self.show_full_screen = url.is_some();
        self.full_screen_photo_url = url.unwrap_or_default().to_string();
    }

    pub fn set_current_track(&mut self, track: usize) {
        self.current_track = track;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn enter_section(&mut self, section: usize, slide: usize, track: usize) {
        self.current_section = section;
        self.current_slide = slide;
        self.current_track = track;
        self.is_complete = false;
    }

    fn enter_terminal(&mut self, content: &Content) {
        self.current_section = content.terminal_id();
        self.current_slide = 0;
        self.is_playing = false;
        self.is_complete = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::test_fixtures::sample_config;

    fn content(sizes: &[usize]) -> Content {
        Content::load(&sample_config(sizes)).unwrap()
    }

    #[test]
    fn starts_at_the_beginning() {
        let state = NavigationState::new();
        assert_eq!(state.position(), (0, 0));
        assert!(!state.is_playing());
        assert!(!state.is_paused());
        assert!(!state.is_muted());
        assert_eq!(state.current_track(), 0);
    }

    #[test]
    fn advancing_through_every_slide_reaches_terminal() {
        let content = content(&[2, 3, 1]);
        let mut state = NavigationState::new();
        state.toggle_playback();

        for _ in 0..content.total_slides() {
            state.advance(&content);
        }

        assert_eq!(state.position(), (content.terminal_id(), 0));
        assert!(!state.is_playing());
        assert!(state.is_complete());

        // no-op once there
        state.advance(&content);
        assert_eq!(state.position(), (3, 0));
    }

    #[test]
    fn crossing_a_section_adopts_its_track() {
        let content = content(&[2, 3]);
        let mut state = NavigationState::new();
        state.advance(&content);
        state.advance(&content);

        assert_eq!(state.position(), (1, 0));
        assert_eq!(state.current_track(), 1);
    }

    #[test]
    fn retreat_at_start_is_a_no_op() {
        let content = content(&[2, 3]);
        let mut state = NavigationState::new();
        let before = state.clone();
        state.retreat(&content);
        assert_eq!(state, before);
    }

    #[test]
    fn jump_then_retreat_lands_on_previous_section_end() {
        let content = content(&[2, 3, 1]);
        let mut state = NavigationState::new();

        assert!(state.jump_to(&content, 1, 2));
        for _ in 0..3 {
            state.retreat(&content);
        }

        assert_eq!(state.position(), (0, 1));
        assert_eq!(state.current_track(), 0);
    }

    #[test]
    fn jump_to_unknown_section_is_reported_and_ignored() {
        let content = content(&[2, 3]);
        let mut state = NavigationState::new();
        state.advance(&content);
        let before = state.clone();

        assert!(!state.jump_to(&content, 7, 0));
        assert_eq!(state, before);
    }

    #[test]
    fn jump_clamps_slide_and_handles_terminal() {
        let content = content(&[2, 3]);
        let mut state = NavigationState::new();

        assert!(state.jump_to(&content, 1, 99));
        assert_eq!(state.position(), (1, 2));

        state.toggle_playback();
        assert!(state.jump_to(&content, content.terminal_id(), 4));
        assert_eq!(state.position(), (2, 0));
        assert!(!state.is_playing());
    }

    #[test]
    fn toggling_playback_twice_restores_flags() {
        let mut state = NavigationState::new();

        state.toggle_playback();
        assert!(state.is_playing());
        assert!(!state.is_paused());

        state.toggle_playback();
        assert!(!state.is_playing());
        assert!(state.is_paused());

        // from playing back to playing: paused clears again
        state.toggle_playback();
        state.toggle_playback();
        state.toggle_playback();
        assert!(state.is_playing());
        assert!(!state.is_paused());
    }

    #[test]
    fn overlay_flags_are_independent() {
        let mut state = NavigationState::new();
        state.set_chapter_menu_visible(true);
        state.set_full_screen_photo(Some("/test.jpg"));
        state.toggle_mute();

        assert!(state.show_chapter_menu());
        assert!(state.show_full_screen());
        assert_eq!(state.full_screen_photo_url(), "/test.jpg");
        assert!(state.is_muted());

        state.set_full_screen_photo(None);
        assert!(!state.show_full_screen());
        assert_eq!(state.full_screen_photo_url(), "");
        assert!(state.show_chapter_menu());
    }

    #[test]
    fn reset_restores_initial_values() {
        let content = content(&[2, 3, 4, 2]);
        let mut state = NavigationState::new();
        state.jump_to(&content, 3, 1);
        state.toggle_playback();
        state.toggle_mute();
        state.set_chapter_menu_visible(true);

        state.reset();
        assert_eq!(state, NavigationState::new());
    }
}
