pub mod autoplay;
pub mod controller;
pub mod state;

pub use autoplay::{decide, AutoAdvance};
pub use controller::{Input, NavigationSnapshot, StoryController};
pub use state::NavigationState;
