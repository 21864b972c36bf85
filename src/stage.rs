//! Presentation surface driven by the capture flow.

use crate::compositor::EncodedImage;
use crate::error::PlaybackPolicyError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level screens of the experience
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Screen {
    Permission,
    Camera,
    Results,
}

/// Screens, indicators and cues the host renders
#[async_trait]
pub trait Stage: Send + Sync {
    fn show(&self, screen: Screen);

    fn set_loading(&self, visible: bool, message: Option<&str>);

    /// Show a countdown digit, or hide the countdown with `None`
    fn set_countdown(&self, value: Option<u8>);

    /// White flash over the preview; fire-and-forget
    fn flash(&self, duration: Duration);

    async fn play_shutter(&self) -> Result<(), PlaybackPolicyError>;

    /// Replace the animated idle overlay with a still image
    fn show_static_overlay(&self);

    fn show_result(&self, image: &EncodedImage);

    fn alert(&self, message: &str);
}
