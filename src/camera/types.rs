use crate::config::CameraConfig;
use crate::error::CameraAccessError;
use crate::media::{ElementId, Frame};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which camera the stream comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Front,
    Back,
}

impl Facing {
    pub fn opposite(self) -> Self {
        match self {
            Facing::Front => Facing::Back,
            Facing::Back => Facing::Front,
        }
    }

    /// Front-facing previews and captures are horizontally mirrored
    pub fn is_mirrored(self) -> bool {
        matches!(self, Facing::Front)
    }

    /// Facing-mode string understood by stream sources
    pub fn as_facing_mode(self) -> &'static str {
        match self {
            Facing::Front => "user",
            Facing::Back => "environment",
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facing::Front => write!(f, "front"),
            Facing::Back => write!(f, "back"),
        }
    }
}

/// Ideal stream constraints; sources may deliver something else
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConstraints {
    pub facing: Facing,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub ideal_aspect_ratio: f64,
    pub ideal_frame_rate: u32,
    pub audio: bool,
}

impl CameraConstraints {
    /// Portrait video-only constraints for the given facing mode
    pub fn portrait(config: &CameraConfig, facing: Facing) -> Self {
        Self {
            facing,
            ideal_width: config.resolution.0,
            ideal_height: config.resolution.1,
            ideal_aspect_ratio: config.aspect_ratio,
            ideal_frame_rate: config.fps,
            audio: false,
        }
    }
}

/// A live camera stream bound to the preview element
pub trait CameraStream: Send + Sync + fmt::Debug {
    fn id(&self) -> u64;

    fn facing(&self) -> Facing;

    /// The live preview element showing this stream
    fn preview_id(&self) -> ElementId;

    /// Stop every hardware track; the stream is unusable afterwards
    fn stop_tracks(&self);

    fn is_live(&self) -> bool;

    /// Latest frame as delivered by the sensor, unmirrored
    fn current_frame(&self) -> Option<Frame>;
}

pub type StreamHandle = Arc<dyn CameraStream>;

/// Grants camera streams, e.g. after a permission prompt
#[async_trait]
pub trait CameraSource: Send + Sync {
    async fn request_stream(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<StreamHandle, CameraAccessError>;
}
