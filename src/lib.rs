pub mod app;
pub mod camera;
pub mod capture;
pub mod compositor;
pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod export;
pub mod maintenance;
pub mod media;
pub mod playback;
pub mod preload;
pub mod sim;
pub mod stage;

pub use app::{
    AppStatus, Collaborators, Component, ComponentState, Lifecycle, PosecamApp, ShutdownReason,
};
pub use camera::{CameraSessionManager, CameraSource, CameraStream, Facing, StreamHandle};
pub use capture::{CaptureResult, CaptureSequencer, CaptureSession, Phase, SessionHandle};
pub use compositor::{DecorationSource, EncodedImage, FrameCompositor, StaticDecorations};
pub use config::PosecamConfig;
pub use detector::{AssetProfile, CodecProbe, Environment, PlatformFamily, VideoFormat};
pub use error::{PosecamError, Result};
pub use events::{EventBus, PosecamEvent};
pub use export::{ExportOutcome, Exporter, ShareTarget};
pub use maintenance::Maintenance;
pub use media::{MediaBackend, MediaElement, MediaHandle, MediaKind};
pub use playback::{Interaction, InteractionGate, PlaybackOutcome, PlaybackReliability};
pub use preload::PreloadCache;
pub use stage::{Screen, Stage};
