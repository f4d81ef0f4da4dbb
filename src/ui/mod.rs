//! Terminal front-end: notifications, rendering, prompts

pub mod notifier;
pub mod render;
pub mod selector;
