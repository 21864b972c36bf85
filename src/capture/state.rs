use crate::camera::{Facing, StreamHandle};
use crate::compositor::EncodedImage;
use crate::error::CameraAccessError;
use crate::media::MediaHandle;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Capture sequencer phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    PlayingPose,
    Counting,
    Capturing,
    Cleanup,
}

impl Phase {
    /// The phase that follows this one
    pub fn next(self) -> Phase {
        match self {
            Phase::Idle => Phase::PlayingPose,
            Phase::PlayingPose => Phase::Counting,
            Phase::Counting => Phase::Capturing,
            Phase::Capturing => Phase::Cleanup,
            Phase::Cleanup => Phase::Idle,
        }
    }
}

/// The process-wide capture context
#[derive(Debug)]
pub struct CaptureSession {
    pub phase: Phase,
    pub current_camera: Facing,
    pub active_stream: Option<StreamHandle>,
    pub active_pose_overlay: Option<MediaHandle>,
    pub idle_overlay: Option<MediaHandle>,
    pub captured_image: Option<EncodedImage>,
    pub capture_count: u64,
    pub loaded_pose_ids: BTreeSet<String>,
    pub priority_pose_id: Option<String>,
}

impl CaptureSession {
    pub fn new(initial_camera: Facing) -> Self {
        Self {
            phase: Phase::Idle,
            current_camera: initial_camera,
            active_stream: None,
            active_pose_overlay: None,
            idle_overlay: None,
            captured_image: None,
            capture_count: 0,
            loaded_pose_ids: BTreeSet::new(),
            priority_pose_id: None,
        }
    }
}

/// Shared handle to the single [`CaptureSession`].
///
/// The lock is never held across an await point.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<CaptureSession>>,
}

impl SessionHandle {
    pub fn new(initial_camera: Facing) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CaptureSession::new(initial_camera))),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, CaptureSession> {
        self.inner.lock()
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == Phase::Idle
    }

    pub fn capture_count(&self) -> u64 {
        self.inner.lock().capture_count
    }

    pub fn current_camera(&self) -> Facing {
        self.inner.lock().current_camera
    }

    pub fn active_stream(&self) -> Option<StreamHandle> {
        self.inner.lock().active_stream.clone()
    }

    pub fn active_pose_overlay(&self) -> Option<MediaHandle> {
        self.inner.lock().active_pose_overlay.clone()
    }

    pub fn idle_overlay(&self) -> Option<MediaHandle> {
        self.inner.lock().idle_overlay.clone()
    }

    pub fn captured_image(&self) -> Option<EncodedImage> {
        self.inner.lock().captured_image.clone()
    }

    pub fn loaded_pose_ids(&self) -> BTreeSet<String> {
        self.inner.lock().loaded_pose_ids.clone()
    }

    pub fn priority_pose_id(&self) -> Option<String> {
        self.inner.lock().priority_pose_id.clone()
    }

    /// Enter `PlayingPose` if idle with a live camera.
    ///
    /// Returns `Ok(false)` without touching anything when a capture is already
    /// running, and an error when there is no camera stream to capture from.
    pub fn try_begin_capture(&self) -> Result<bool, CameraAccessError> {
        let mut session = self.inner.lock();
        if session.phase != Phase::Idle {
            return Ok(false);
        }
        match &session.active_stream {
            Some(stream) if stream.is_live() => {}
            _ => return Err(CameraAccessError::NoActiveStream),
        }
        session.phase = Phase::PlayingPose;
        debug!("Capture phase: Idle -> PlayingPose");
        Ok(true)
    }

    /// Move to the next phase in sequence
    pub fn advance(&self) -> Phase {
        let mut session = self.inner.lock();
        let from = session.phase;
        session.phase = from.next();
        debug!("Capture phase: {:?} -> {:?}", from, session.phase);
        session.phase
    }
}
