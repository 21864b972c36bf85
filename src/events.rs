use crate::camera::Facing;
use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Lifecycle events published by the capture core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PosecamEvent {
    /// A camera stream was acquired
    CameraStarted { facing: Facing },
    /// The camera was switched to the other facing mode
    CameraFlipped { facing: Facing },
    /// A video asset finished preloading
    AssetLoaded { asset_id: String },
    /// A video asset failed to preload
    AssetFailed { asset_id: String, error: String },
    /// Idle and priority pose settled; the first capture may start
    CriticalLoadComplete { priority_pose: Option<String> },
    /// Background pose loading finished
    BackgroundLoadComplete { loaded: usize, failed: usize },
    /// A pose overlay was chosen for the current capture
    PoseSelected { asset_id: String, from_cache: bool },
    /// Countdown value changed; `None` hides the counter
    CountdownTick {
        value: Option<u8>,
        overlay_playing: bool,
    },
    /// A capture finished and produced an image
    CaptureCompleted {
        capture_id: String,
        capture_count: u64,
        bytes: usize,
    },
    /// The idle overlay was found stalled and reloaded
    IdleRepaired,
    /// Leaked media elements were removed
    ElementsPruned { count: usize },
    /// A component reported an error
    SystemError { component: String, error: String },
    /// Shutdown requested
    ShutdownRequested { reason: String },
}

impl PosecamEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            PosecamEvent::CameraStarted { facing } => format!("Camera started ({})", facing),
            PosecamEvent::CameraFlipped { facing } => format!("Camera flipped to {}", facing),
            PosecamEvent::AssetLoaded { asset_id } => format!("Asset {} loaded", asset_id),
            PosecamEvent::AssetFailed { asset_id, error } => {
                format!("Asset {} failed: {}", asset_id, error)
            }
            PosecamEvent::CriticalLoadComplete { priority_pose } => format!(
                "Critical load complete (priority pose: {})",
                priority_pose.as_deref().unwrap_or("none")
            ),
            PosecamEvent::BackgroundLoadComplete { loaded, failed } => format!(
                "Background load complete ({} loaded, {} failed)",
                loaded, failed
            ),
            PosecamEvent::PoseSelected {
                asset_id,
                from_cache,
            } => format!(
                "Pose {} selected ({})",
                asset_id,
                if *from_cache { "cached" } else { "fresh" }
            ),
            PosecamEvent::CountdownTick { value, .. } => match value {
                Some(v) => format!("Countdown {}", v),
                None => "Countdown hidden".to_string(),
            },
            PosecamEvent::CaptureCompleted {
                capture_id,
                capture_count,
                bytes,
            } => format!(
                "Capture {} completed (#{}, {} bytes)",
                capture_id, capture_count, bytes
            ),
            PosecamEvent::IdleRepaired => "Idle overlay repaired".to_string(),
            PosecamEvent::ElementsPruned { count } => {
                format!("Pruned {} media elements", count)
            }
            PosecamEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            PosecamEvent::ShutdownRequested { reason } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            PosecamEvent::CameraStarted { .. } => "camera_started",
            PosecamEvent::CameraFlipped { .. } => "camera_flipped",
            PosecamEvent::AssetLoaded { .. } => "asset_loaded",
            PosecamEvent::AssetFailed { .. } => "asset_failed",
            PosecamEvent::CriticalLoadComplete { .. } => "critical_load_complete",
            PosecamEvent::BackgroundLoadComplete { .. } => "background_load_complete",
            PosecamEvent::PoseSelected { .. } => "pose_selected",
            PosecamEvent::CountdownTick { .. } => "countdown_tick",
            PosecamEvent::CaptureCompleted { .. } => "capture_completed",
            PosecamEvent::IdleRepaired => "idle_repaired",
            PosecamEvent::ElementsPruned { .. } => "elements_pruned",
            PosecamEvent::SystemError { .. } => "system_error",
            PosecamEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Event bus for lifecycle observers using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<PosecamEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<PosecamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers; returns how many received it
    pub fn publish(&self, event: PosecamEvent) -> Result<usize, EventBusError> {
        match &event {
            PosecamEvent::AssetFailed { asset_id, error } => {
                warn!("Asset {} failed to load: {}", asset_id, error);
            }
            PosecamEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            PosecamEvent::CaptureCompleted { .. } | PosecamEvent::CameraFlipped { .. } => {
                info!("{}", event.description());
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        if self.sender.receiver_count() == 0 {
            return Ok(0);
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(8);
        let delivered = bus.publish(PosecamEvent::IdleRepaired).unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(PosecamEvent::AssetLoaded {
            asset_id: "idle".to_string(),
        })
        .unwrap();
        bus.publish(PosecamEvent::ElementsPruned { count: 2 }).unwrap();

        assert_eq!(rx.recv().await.unwrap().event_type(), "asset_loaded");
        match rx.recv().await.unwrap() {
            PosecamEvent::ElementsPruned { count } => assert_eq!(count, 2),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_event_description() {
        let event = PosecamEvent::CountdownTick {
            value: Some(2),
            overlay_playing: true,
        };
        assert_eq!(event.description(), "Countdown 2");
        assert_eq!(
            PosecamEvent::CountdownTick {
                value: None,
                overlay_playing: false
            }
            .description(),
            "Countdown hidden"
        );
    }
}
