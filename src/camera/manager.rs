use super::types::{CameraConstraints, CameraSource, Facing, StreamHandle};
use crate::capture::SessionHandle;
use crate::config::CameraConfig;
use crate::error::CameraAccessError;
use crate::events::{EventBus, PosecamEvent};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Owns acquisition and release of the single camera stream
pub struct CameraSessionManager {
    config: CameraConfig,
    source: Arc<dyn CameraSource>,
    session: SessionHandle,
    event_bus: Arc<EventBus>,
}

impl CameraSessionManager {
    pub fn new(
        config: CameraConfig,
        source: Arc<dyn CameraSource>,
        session: SessionHandle,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            source,
            session,
            event_bus,
        }
    }

    /// Acquire a stream for `facing`, replacing any active stream
    pub async fn start(&self, facing: Facing) -> Result<StreamHandle, CameraAccessError> {
        self.release_active();

        let stream = self.request(facing).await?;
        {
            let mut session = self.session.lock();
            session.current_camera = facing;
            session.active_stream = Some(Arc::clone(&stream));
        }

        let _ = self
            .event_bus
            .publish(PosecamEvent::CameraStarted { facing });
        Ok(stream)
    }

    /// Stop a stream's tracks and clear it from the session if it is the active one
    pub fn stop(&self, handle: &StreamHandle) {
        handle.stop_tracks();

        let mut session = self.session.lock();
        if session
            .active_stream
            .as_ref()
            .is_some_and(|active| active.id() == handle.id())
        {
            session.active_stream = None;
        }
        debug!("Stopped camera stream {}", handle.id());
    }

    /// Switch to the opposite camera.
    ///
    /// The old stream's tracks are stopped before the new one is requested.
    /// On failure the previous facing mode is restored and re-acquired on a
    /// best-effort basis before the error is returned.
    pub async fn flip(&self) -> Result<StreamHandle, CameraAccessError> {
        if !self.session.is_idle() {
            return Err(CameraAccessError::CaptureInProgress);
        }

        let previous = self.session.current_camera();
        let next = previous.opposite();
        info!("Flipping camera from {} to {}", previous, next);

        self.release_active();
        self.session.lock().current_camera = next;

        match self.request(next).await {
            Ok(stream) => {
                self.session.lock().active_stream = Some(Arc::clone(&stream));
                let _ = self
                    .event_bus
                    .publish(PosecamEvent::CameraFlipped { facing: next });
                Ok(stream)
            }
            Err(e) => {
                error!("Failed to switch to {} camera: {}", next, e);
                self.session.lock().current_camera = previous;

                match self.request(previous).await {
                    Ok(stream) => {
                        self.session.lock().active_stream = Some(stream);
                        info!("Restored {} camera after failed flip", previous);
                    }
                    Err(restore_err) => {
                        warn!(
                            "Could not restore {} camera after failed flip: {}",
                            previous, restore_err
                        );
                    }
                }

                Err(e)
            }
        }
    }

    /// Stop and drop whatever stream the session holds
    pub fn release_active(&self) {
        let previous = self.session.lock().active_stream.take();
        if let Some(stream) = previous {
            stream.stop_tracks();
            debug!("Released camera stream {} ({})", stream.id(), stream.facing());
        }
    }

    async fn request(&self, facing: Facing) -> Result<StreamHandle, CameraAccessError> {
        let constraints = CameraConstraints::portrait(&self.config, facing);
        debug!(
            "Requesting {} camera ({}x{} @ {}fps, aspect {:.2})",
            facing,
            constraints.ideal_width,
            constraints.ideal_height,
            constraints.ideal_frame_rate,
            constraints.ideal_aspect_ratio
        );

        self.source.request_stream(&constraints).await.map_err(|e| {
            warn!("Camera request for {} failed: {}", facing, e);
            e
        })
    }
}
