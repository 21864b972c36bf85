use super::types::{Component, ComponentState};
use super::PosecamApp;
use crate::error::Result;
use crate::media;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

impl PosecamApp {
    /// Stop background work and release the camera and media elements
    pub async fn shutdown(&self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();
        let mut exit_code = 0;

        self.set_state(Component::Maintenance, ComponentState::Stopping);
        let tasks: Vec<_> = self.background_tasks.lock().drain(..).collect();
        for task in tasks {
            // background loads do not watch the token
            task.abort();
            match timeout(Duration::from_secs(5), task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => {
                    error!("Background task failed: {}", e);
                    exit_code = 1;
                }
                Err(_) => {
                    warn!("Background task did not stop in time");
                    exit_code = 1;
                }
            }
        }
        self.set_state(Component::Maintenance, ComponentState::Stopped);

        self.set_state(Component::Assets, ComponentState::Stopping);
        let (pose, idle) = {
            let mut session = self.session.lock();
            (session.active_pose_overlay.take(), session.idle_overlay.take())
        };
        for overlay in pose.iter().chain(idle.iter()) {
            media::teardown(self.backend.as_ref(), overlay);
        }
        self.cache.clear();
        self.set_state(Component::Assets, ComponentState::Stopped);

        self.set_state(Component::Camera, ComponentState::Stopping);
        self.camera.release_active();
        self.set_state(Component::Camera, ComponentState::Stopped);

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }
}
