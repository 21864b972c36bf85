use crate::camera::{CameraConstraints, CameraSource, CameraStream, Facing, StreamHandle};
use crate::error::CameraAccessError;
use crate::media::{ElementId, Frame};
use async_trait::async_trait;
use image::Rgba;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Preview element ids live well above media element ids
const PREVIEW_ID_BASE: u64 = 1 << 32;

#[derive(Debug, Default)]
struct Device {
    next_id: AtomicU64,
    live: AtomicUsize,
    max_live: AtomicUsize,
    requests: AtomicUsize,
}

impl Device {
    fn release(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-process camera with one exclusive device per facing mode
pub struct SimCameraSource {
    device: Arc<Device>,
    deny: AtomicBool,
    unavailable: Mutex<HashSet<Facing>>,
    acquire_delay: Duration,
    frame_size: (u32, u32),
}

impl SimCameraSource {
    pub fn new() -> Self {
        Self {
            device: Arc::new(Device::default()),
            deny: AtomicBool::new(false),
            unavailable: Mutex::new(HashSet::new()),
            acquire_delay: Duration::from_millis(20),
            frame_size: (720, 960),
        }
    }

    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = (width, height);
        self
    }

    /// Refuse every request as if the user denied permission
    pub fn deny_permission(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    /// Make one facing mode unavailable
    pub fn set_unavailable(&self, facing: Facing, unavailable: bool) {
        let mut set = self.unavailable.lock();
        if unavailable {
            set.insert(facing);
        } else {
            set.remove(&facing);
        }
    }

    /// Streams currently holding the device
    pub fn live_streams(&self) -> usize {
        self.device.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously live streams observed
    pub fn max_live_streams(&self) -> usize {
        self.device.max_live.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> usize {
        self.device.requests.load(Ordering::SeqCst)
    }
}

impl Default for SimCameraSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraSource for SimCameraSource {
    async fn request_stream(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<StreamHandle, CameraAccessError> {
        self.device.requests.fetch_add(1, Ordering::SeqCst);

        if self.deny.load(Ordering::SeqCst) {
            return Err(CameraAccessError::PermissionDenied {
                details: "NotAllowedError".to_string(),
            });
        }
        if self.unavailable.lock().contains(&constraints.facing) {
            return Err(CameraAccessError::DeviceUnavailable {
                details: format!("no {} camera", constraints.facing),
            });
        }
        if self.device.live.load(Ordering::SeqCst) > 0 {
            return Err(CameraAccessError::DeviceBusy);
        }

        sleep(self.acquire_delay).await;

        let live = self.device.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.device.max_live.fetch_max(live, Ordering::SeqCst);
        let id = self.device.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Opened simulated {} camera stream {}", constraints.facing, id);

        Ok(Arc::new(SimCameraStream {
            id,
            facing: constraints.facing,
            live: AtomicBool::new(true),
            device: Arc::clone(&self.device),
            frame_size: self.frame_size,
        }))
    }
}

/// A stream from [`SimCameraSource`]
#[derive(Debug)]
pub struct SimCameraStream {
    id: u64,
    facing: Facing,
    live: AtomicBool,
    device: Arc<Device>,
    frame_size: (u32, u32),
}

impl CameraStream for SimCameraStream {
    fn id(&self) -> u64 {
        self.id
    }

    fn facing(&self) -> Facing {
        self.facing
    }

    fn preview_id(&self) -> ElementId {
        ElementId(PREVIEW_ID_BASE + self.id)
    }

    fn stop_tracks(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.device.release();
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Left half red, right half blue, so mirroring is observable
    fn current_frame(&self) -> Option<Frame> {
        if !self.is_live() {
            return None;
        }
        let (w, h) = self.frame_size;
        Some(Frame::from_fn(w, h, |x, _| {
            if x < w / 2 {
                Rgba([220, 40, 40, 255])
            } else {
                Rgba([40, 40, 220, 255])
            }
        }))
    }
}
