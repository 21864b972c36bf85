use super::types::{Collaborators, Lifecycle, ShutdownReason};
use crate::camera::CameraSessionManager;
use crate::capture::{CaptureSequencer, SessionHandle};
use crate::config::PosecamConfig;
use crate::detector::{self, AssetProfile};
use crate::error::Result;
use crate::events::EventBus;
use crate::export::Exporter;
use crate::maintenance::Maintenance;
use crate::media::MediaBackend;
use crate::playback::{InteractionGate, PlaybackReliability};
use crate::preload::PreloadCache;
use crate::stage::Stage;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Wires the capture core to its collaborators and owns its lifecycle
pub struct PosecamApp {
    pub(super) config: PosecamConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) session: SessionHandle,
    pub(super) profile: Arc<AssetProfile>,
    pub(super) backend: Arc<dyn MediaBackend>,
    pub(super) stage: Arc<dyn Stage>,
    pub(super) gate: Arc<InteractionGate>,
    pub(super) playback: PlaybackReliability,

    // Components
    pub(super) cache: Arc<PreloadCache>,
    pub(super) camera: CameraSessionManager,
    pub(super) sequencer: CaptureSequencer,
    pub(super) maintenance: Arc<Maintenance>,
    pub(super) exporter: Exporter,

    // Lifecycle management
    pub(super) lifecycle: parking_lot::Mutex<Lifecycle>,
    pub(super) background_tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    pub(super) shutdown_sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl PosecamApp {
    /// Create the app; detects the asset profile and builds every component
    pub fn new(config: PosecamConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let profile = Arc::new(detector::detect(&collaborators.environment, &config.assets));
        let session = SessionHandle::new(config.camera.initial_facing);
        let backend = collaborators.media_backend;
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let gate = Arc::new(InteractionGate::new());
        let playback = PlaybackReliability::new(config.playback.clone(), Arc::clone(&gate));

        let cache = Arc::new(PreloadCache::new(
            Arc::clone(&profile),
            Arc::clone(&backend),
            config.preload.clone(),
            session.clone(),
            Arc::clone(&event_bus),
            config.system.rng_seed,
        ));

        let camera = CameraSessionManager::new(
            config.camera.clone(),
            collaborators.camera_source,
            session.clone(),
            Arc::clone(&event_bus),
        );

        // Separate RNG stream from the cache's priority pick
        let sequencer = CaptureSequencer::builder()
            .with_config(config.capture.clone())
            .with_compositor_config(config.compositor.clone())
            .with_profile(Arc::clone(&profile))
            .with_session(session.clone())
            .with_cache(Arc::clone(&cache))
            .with_backend(Arc::clone(&backend))
            .with_playback(playback.clone())
            .with_decorations(collaborators.decorations)
            .with_stage(Arc::clone(&collaborators.stage))
            .with_event_bus(Arc::clone(&event_bus))
            .with_rng_seed(config.system.rng_seed.map(|seed| seed.wrapping_add(1)))
            .build()?;

        let maintenance = Arc::new(Maintenance::new(
            config.maintenance.clone(),
            session.clone(),
            Arc::clone(&cache),
            Arc::clone(&backend),
            playback.clone(),
            Arc::clone(&event_bus),
        ));

        let exporter = Exporter::new(config.export.clone(), collaborators.share_target);

        info!(
            "Posecam app created ({} poses, {} format)",
            profile.pose_asset_ids.len(),
            profile.format
        );

        Ok(Self {
            config,
            event_bus,
            session,
            profile,
            backend,
            stage: collaborators.stage,
            gate,
            playback,
            cache,
            camera,
            sequencer,
            maintenance,
            exporter,
            lifecycle: parking_lot::Mutex::new(Lifecycle::default()),
            background_tasks: parking_lot::Mutex::new(Vec::new()),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_sender))),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &PosecamConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn profile(&self) -> &AssetProfile {
        &self.profile
    }

    pub fn cache(&self) -> &PreloadCache {
        &self.cache
    }

    pub fn maintenance(&self) -> &Maintenance {
        &self.maintenance
    }
}
