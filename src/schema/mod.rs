pub mod content;
pub mod event;
pub mod player;
