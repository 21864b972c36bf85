use crate::compositor::EncodedImage;
use crate::error::PlaybackPolicyError;
use crate::stage::{Screen, Stage};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// One call made on a [`SimStage`]
#[derive(Debug, Clone, PartialEq)]
pub enum StageCall {
    Show(Screen),
    Loading {
        visible: bool,
        message: Option<String>,
    },
    Countdown(Option<u8>),
    Flash(Duration),
    Shutter,
    StaticOverlay,
    Result { bytes: usize },
    Alert(String),
}

#[derive(Debug)]
struct StageState {
    screen: Screen,
    loading: bool,
    countdown: Option<u8>,
    static_overlay: bool,
    last_result: Option<EncodedImage>,
}

/// Headless stage that records every call with its timestamp
#[derive(Debug)]
pub struct SimStage {
    calls: Mutex<Vec<(Instant, StageCall)>>,
    state: Mutex<StageState>,
    shutter_fails: AtomicBool,
}

impl SimStage {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            state: Mutex::new(StageState {
                screen: Screen::Permission,
                loading: false,
                countdown: None,
                static_overlay: false,
                last_result: None,
            }),
            shutter_fails: AtomicBool::new(false),
        }
    }

    /// Make the shutter cue fail, as a blocked audio element would
    pub fn fail_shutter(&self, fail: bool) {
        self.shutter_fails.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(Instant, StageCall)> {
        self.calls.lock().clone()
    }

    pub fn screen(&self) -> Screen {
        self.state.lock().screen
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn countdown(&self) -> Option<u8> {
        self.state.lock().countdown
    }

    pub fn static_overlay_shown(&self) -> bool {
        self.state.lock().static_overlay
    }

    pub fn last_result(&self) -> Option<EncodedImage> {
        self.state.lock().last_result.clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|(_, call)| match call {
                StageCall::Alert(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Countdown values in the order they were shown
    pub fn countdown_values(&self) -> Vec<Option<u8>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|(_, call)| match call {
                StageCall::Countdown(value) => Some(*value),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: StageCall) {
        self.calls.lock().push((Instant::now(), call));
    }
}

impl Default for SimStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for SimStage {
    fn show(&self, screen: Screen) {
        debug!("Stage: show {:?}", screen);
        self.state.lock().screen = screen;
        self.record(StageCall::Show(screen));
    }

    fn set_loading(&self, visible: bool, message: Option<&str>) {
        self.state.lock().loading = visible;
        self.record(StageCall::Loading {
            visible,
            message: message.map(str::to_string),
        });
    }

    fn set_countdown(&self, value: Option<u8>) {
        self.state.lock().countdown = value;
        self.record(StageCall::Countdown(value));
    }

    fn flash(&self, duration: Duration) {
        self.record(StageCall::Flash(duration));
    }

    async fn play_shutter(&self) -> Result<(), PlaybackPolicyError> {
        self.record(StageCall::Shutter);
        if self.shutter_fails.load(Ordering::SeqCst) {
            return Err(PlaybackPolicyError::AutoplayRejected {
                details: "audio blocked".to_string(),
            });
        }
        Ok(())
    }

    fn show_static_overlay(&self) {
        self.state.lock().static_overlay = true;
        self.record(StageCall::StaticOverlay);
    }

    fn show_result(&self, image: &EncodedImage) {
        self.state.lock().last_result = Some(image.clone());
        self.record(StageCall::Result { bytes: image.len() });
    }

    fn alert(&self, message: &str) {
        info!("Stage alert: {}", message);
        self.record(StageCall::Alert(message.to_string()));
    }
}
