use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PosecamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraAccessError),

    #[error("Asset error: {0}")]
    AssetLoad(#[from] AssetLoadError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackPolicyError),

    #[error("Composite error: {0}")]
    Composite(#[from] CompositeError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl PosecamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether the user can simply try again after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            PosecamError::Camera(_) => false,
            PosecamError::Config(_) => false,
            PosecamError::AssetLoad(_) => true,
            PosecamError::Playback(_) => true,
            PosecamError::Composite(_) => true,
            _ => true,
        }
    }
}

/// Camera permission or hardware failures. Fatal to the capture flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraAccessError {
    #[error("Camera permission denied: {details}")]
    PermissionDenied { details: String },

    #[error("Camera device unavailable: {details}")]
    DeviceUnavailable { details: String },

    #[error("Camera device is already in use")]
    DeviceBusy,

    #[error("No active camera stream")]
    NoActiveStream,

    #[error("Camera cannot be switched while a capture is in progress")]
    CaptureInProgress,
}

/// Network or decode failure for a video or image asset. Always recoverable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetLoadError {
    #[error("Unknown asset id '{asset_id}'")]
    UnknownAsset { asset_id: String },

    #[error("Asset '{asset_id}' did not load within {timeout:?}")]
    Timeout { asset_id: String, timeout: Duration },

    #[error("Asset '{asset_id}' failed to decode: {details}")]
    Decode { asset_id: String, details: String },

    #[error("Asset '{asset_id}' network failure: {details}")]
    Network { asset_id: String, details: String },

    #[error("Asset '{asset_id}' failed after {attempts} attempts")]
    RetriesExhausted { asset_id: String, attempts: u32 },
}

impl AssetLoadError {
    pub fn asset_id(&self) -> &str {
        match self {
            AssetLoadError::UnknownAsset { asset_id }
            | AssetLoadError::Timeout { asset_id, .. }
            | AssetLoadError::Decode { asset_id, .. }
            | AssetLoadError::Network { asset_id, .. }
            | AssetLoadError::RetriesExhausted { asset_id, .. } => asset_id,
        }
    }
}

/// Playback refused by the runtime, typically an autoplay policy. Never user facing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackPolicyError {
    #[error("Autoplay rejected: {details}")]
    AutoplayRejected { details: String },

    #[error("Playback not supported: {details}")]
    NotSupported { details: String },
}

/// A layer that was unavailable when the freeze-frame was composed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionWarning {
    #[error("overlay frame unavailable, overlay layer skipped")]
    OverlayUnavailable,

    #[error("logo image unavailable, logo skipped")]
    LogoUnavailable,

    #[error("QR image unavailable, QR skipped")]
    QrUnavailable,
}

/// Freeze-frame failures that are surfaced to the user with a retry prompt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositeError {
    #[error("Camera has no frame available")]
    NoCameraFrame,

    #[error("Failed to encode composite: {details}")]
    Encode { details: String },
}

#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },
}

pub type Result<T> = std::result::Result<T, PosecamError>;
