mod manager;
mod types;

pub use manager::CameraSessionManager;
pub use types::{CameraConstraints, CameraSource, CameraStream, Facing, StreamHandle};
