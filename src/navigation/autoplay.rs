use std::time::Duration;

use crate::content::{Content, SpecialStyle};

use super::state::NavigationState;

/// Outcome of the auto-advance policy for one navigation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoAdvance {
    Arm(Duration),
    Idle,
}

impl AutoAdvance {
    pub fn should_arm(&self) -> bool {
        matches!(self, AutoAdvance::Arm(_))
    }
}

/// Decide whether an auto-advance timer belongs to this state. The controller
/// re-evaluates this after every transition and owns the actual timer.
pub fn decide(state: &NavigationState, content: &Content, exclusive_overlay: bool) -> AutoAdvance {
    if !state.is_playing() || exclusive_overlay {
        return AutoAdvance::Idle;
    }

    let Some(slide) = content.slide(state.current_section(), state.current_slide()) else {
        return AutoAdvance::Idle;
    };

    if slide.slide.special() == Some(SpecialStyle::Valentine) {
        return AutoAdvance::Idle;
    }

    AutoAdvance::Arm(Duration::from_millis(slide.duration_ms()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::model::Slide;
    use crate::content::test_fixtures::sample_config;

    fn playing_state() -> NavigationState {
        let mut state = NavigationState::new();
        state.toggle_playback();
        state
    }

    #[test]
    fn arms_with_slide_duration_while_playing() {
        let content = Content::load(&sample_config(&[2, 2])).unwrap();
        let mut state = playing_state();

        assert_eq!(decide(&state, &content, false), AutoAdvance::Arm(Duration::from_millis(4000)));
        state.advance(&content);
        assert_eq!(decide(&state, &content, false), AutoAdvance::Arm(Duration::from_millis(5000)));
    }

    #[test]
    fn idle_when_paused_or_overlay_or_terminal() {
        let content = Content::load(&sample_config(&[1])).unwrap();
        let mut state = NavigationState::new();
        assert_eq!(decide(&state, &content, false), AutoAdvance::Idle);

        state.toggle_playback();
        assert_eq!(decide(&state, &content, true), AutoAdvance::Idle);

        state.jump_to(&content, content.terminal_id(), 0);
        state.toggle_playback();
        assert!(!decide(&state, &content, false).should_arm());
    }

    #[test]
    fn valentine_slide_never_auto_advances() {
        let mut config = sample_config(&[1]);
        if let Slide::Text(text) = &mut config.sections[0].slides[0] {
            text.special = Some(SpecialStyle::Valentine);
        }
        let content = Content::load(&config).unwrap();

        assert_eq!(decide(&playing_state(), &content, false), AutoAdvance::Idle);
    }
}
