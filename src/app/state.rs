use super::types::{AppStatus, Component, ComponentState, Lifecycle};
use super::PosecamApp;
use tracing::debug;

impl PosecamApp {
    pub(super) fn set_state(&self, component: Component, state: ComponentState) {
        let previous = std::mem::replace(self.lifecycle.lock().slot_mut(component), state);
        if previous != state {
            debug!("{} {:?} -> {:?}", component, previous, state);
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }

    /// Snapshot of lifecycle, session and cache readiness
    pub fn status(&self) -> AppStatus {
        let lifecycle = self.lifecycle();
        let critical_loaded = self.cache.is_ready_for_capture();

        let session = self.session.lock();
        AppStatus {
            lifecycle,
            phase: session.phase,
            facing: session.current_camera,
            camera_live: session
                .active_stream
                .as_ref()
                .is_some_and(|stream| stream.is_live()),
            critical_loaded,
            loaded_poses: session.loaded_pose_ids.len(),
            capture_count: session.capture_count,
            has_capture: session.captured_image.is_some(),
        }
    }
}
