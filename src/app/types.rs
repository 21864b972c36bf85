use crate::camera::{CameraSource, Facing};
use crate::capture::Phase;
use crate::compositor::DecorationSource;
use crate::detector::Environment;
use crate::export::ShareTarget;
use crate::media::MediaBackend;
use crate::stage::Stage;
use std::sync::Arc;

/// Lifecycle of one part of the app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComponentState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Parts of the app that start and stop independently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// Camera permission and the live stream
    Camera,
    /// Preloaded overlays, the idle overlay and the capture path that needs them
    Assets,
    /// Stall repair and reclaim timers
    Maintenance,
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Component::Camera => write!(f, "camera"),
            Component::Assets => write!(f, "assets"),
            Component::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// Lifecycle state of every [`Component`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lifecycle {
    pub camera: ComponentState,
    pub assets: ComponentState,
    pub maintenance: ComponentState,
}

impl Lifecycle {
    pub fn get(&self, component: Component) -> ComponentState {
        match component {
            Component::Camera => self.camera,
            Component::Assets => self.assets,
            Component::Maintenance => self.maintenance,
        }
    }

    pub(super) fn slot_mut(&mut self, component: Component) -> &mut ComponentState {
        match component {
            Component::Camera => &mut self.camera,
            Component::Assets => &mut self.assets,
            Component::Maintenance => &mut self.maintenance,
        }
    }

    /// Ready to take a photo
    pub fn is_running(&self) -> bool {
        self.camera == ComponentState::Running && self.assets == ComponentState::Running
    }
}

/// Point-in-time view of the app, read from the live components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStatus {
    pub lifecycle: Lifecycle,
    pub phase: Phase,
    pub facing: Facing,
    pub camera_live: bool,
    pub critical_loaded: bool,
    pub loaded_poses: usize,
    pub capture_count: u64,
    pub has_capture: bool,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Signal(signal) => write!(f, "signal {}", signal),
            ShutdownReason::Error(message) => write!(f, "error: {}", message),
            ShutdownReason::UserRequest => write!(f, "user request"),
        }
    }
}

/// Host-side implementations the app is wired to
#[derive(Clone)]
pub struct Collaborators {
    pub environment: Environment,
    pub camera_source: Arc<dyn CameraSource>,
    pub media_backend: Arc<dyn MediaBackend>,
    pub stage: Arc<dyn Stage>,
    pub decorations: Arc<dyn DecorationSource>,
    pub share_target: Option<Arc<dyn ShareTarget>>,
}
