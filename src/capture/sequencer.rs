use super::state::SessionHandle;
use crate::compositor::{CameraFrame, Composite, DecorationSource, EncodedImage, FrameCompositor};
use crate::config::{CaptureConfig, CompositorConfig};
use crate::detector::AssetProfile;
use crate::error::{CompositeError, CompositionWarning, PosecamError, Result};
use crate::events::{EventBus, PosecamEvent};
use crate::media::{self, MediaBackend, MediaHandle, MediaKind};
use crate::playback::{PlaybackOutcome, PlaybackReliability};
use crate::preload::PreloadCache;
use crate::stage::Stage;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A completed capture
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub capture_id: String,
    pub image: EncodedImage,
    pub pose_id: Option<String>,
    pub warnings: Vec<CompositionWarning>,
    pub capture_count: u64,
}

/// Runs pose, countdown, freeze-frame and cleanup for one capture at a time
pub struct CaptureSequencer {
    config: CaptureConfig,
    profile: Arc<AssetProfile>,
    session: SessionHandle,
    cache: Arc<PreloadCache>,
    backend: Arc<dyn MediaBackend>,
    playback: PlaybackReliability,
    compositor: FrameCompositor,
    decorations: Arc<dyn DecorationSource>,
    stage: Arc<dyn Stage>,
    event_bus: Arc<EventBus>,
    rng: Mutex<StdRng>,
}

/// Builder for CaptureSequencer
#[derive(Default)]
pub struct CaptureSequencerBuilder {
    config: Option<CaptureConfig>,
    compositor_config: Option<CompositorConfig>,
    profile: Option<Arc<AssetProfile>>,
    session: Option<SessionHandle>,
    cache: Option<Arc<PreloadCache>>,
    backend: Option<Arc<dyn MediaBackend>>,
    playback: Option<PlaybackReliability>,
    decorations: Option<Arc<dyn DecorationSource>>,
    stage: Option<Arc<dyn Stage>>,
    event_bus: Option<Arc<EventBus>>,
    rng_seed: Option<u64>,
}

impl CaptureSequencerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: CaptureConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_compositor_config(mut self, config: CompositorConfig) -> Self {
        self.compositor_config = Some(config);
        self
    }

    pub fn with_profile(mut self, profile: Arc<AssetProfile>) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_session(mut self, session: SessionHandle) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_cache(mut self, cache: Arc<PreloadCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn MediaBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_playback(mut self, playback: PlaybackReliability) -> Self {
        self.playback = Some(playback);
        self
    }

    pub fn with_decorations(mut self, decorations: Arc<dyn DecorationSource>) -> Self {
        self.decorations = Some(decorations);
        self
    }

    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Seed pose selection; entropy-seeded when unset
    pub fn with_rng_seed(mut self, seed: Option<u64>) -> Self {
        self.rng_seed = seed;
        self
    }

    pub fn build(self) -> Result<CaptureSequencer> {
        fn required<T>(value: Option<T>, name: &str) -> Result<T> {
            value.ok_or_else(|| {
                PosecamError::component("capture_sequencer", &format!("{} is required", name))
            })
        }

        let rng = match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(CaptureSequencer {
            config: required(self.config, "Capture config")?,
            compositor: FrameCompositor::new(required(
                self.compositor_config,
                "Compositor config",
            )?),
            profile: required(self.profile, "Asset profile")?,
            session: required(self.session, "Session")?,
            cache: required(self.cache, "Preload cache")?,
            backend: required(self.backend, "Media backend")?,
            playback: required(self.playback, "Playback wrapper")?,
            decorations: required(self.decorations, "Decoration source")?,
            stage: required(self.stage, "Stage")?,
            event_bus: required(self.event_bus, "Event bus")?,
            rng: Mutex::new(rng),
        })
    }
}

impl CaptureSequencer {
    pub fn builder() -> CaptureSequencerBuilder {
        CaptureSequencerBuilder::new()
    }

    /// Run one full capture.
    ///
    /// Returns `Ok(None)` when a capture is already running. Overlay problems
    /// never stop the sequence; only a missing camera frame or an encoding
    /// failure is returned as an error, after cleanup has run.
    pub async fn capture(&self) -> Result<Option<CaptureResult>> {
        match self.session.try_begin_capture() {
            Ok(true) => {}
            Ok(false) => {
                debug!("Capture already in progress, ignoring request");
                return Ok(None);
            }
            Err(e) => {
                warn!("Cannot start capture: {}", e);
                return Err(e.into());
            }
        }

        let capture_id = Uuid::new_v4().to_string();
        info!("Capture {} started", capture_id);

        let pose_id = self.play_pose().await;
        self.session.advance();

        self.count_down().await;
        self.session.advance();

        let composite = self.freeze_frame().await;
        self.session.advance();

        self.cleanup().await;

        let capture_count = {
            let mut session = self.session.lock();
            if let Ok(composite) = &composite {
                session.captured_image = Some(composite.image.clone());
            }
            session.capture_count
        };
        self.session.advance();

        let composite = composite.map_err(|e| {
            error!("Capture {} failed: {}", capture_id, e);
            PosecamError::from(e)
        })?;

        let _ = self.event_bus.publish(PosecamEvent::CaptureCompleted {
            capture_id: capture_id.clone(),
            capture_count,
            bytes: composite.image.len(),
        });

        Ok(Some(CaptureResult {
            capture_id,
            image: composite.image,
            pose_id,
            warnings: composite.warnings,
            capture_count,
        }))
    }

    /// Random loaded pose, else the priority pose, else the first configured one
    fn select_pose(&self) -> Option<String> {
        let (loaded, priority) = {
            let session = self.session.lock();
            let loaded: Vec<String> = session.loaded_pose_ids.iter().cloned().collect();
            (loaded, session.priority_pose_id.clone())
        };

        loaded
            .choose(&mut *self.rng.lock())
            .cloned()
            .or(priority)
            .or_else(|| self.profile.pose_asset_ids.first().cloned())
    }

    async fn play_pose(&self) -> Option<String> {
        if let Some(idle) = self.session.idle_overlay() {
            idle.set_visible(false);
        }

        let pose_id = self.select_pose()?;
        let (handle, from_cache) = match self.cache.checkout(&pose_id, MediaKind::Pose) {
            Some(handle) => (handle, true),
            None => {
                let source = self.profile.source(&pose_id)?;
                debug!("Pose {} not cached, creating a fresh element", pose_id);
                (self.backend.create_element(&source, MediaKind::Pose), false)
            }
        };

        handle.set_visible(true);
        handle.present();
        let leftover = self
            .session
            .lock()
            .active_pose_overlay
            .replace(Arc::clone(&handle));
        if let Some(leftover) = leftover {
            warn!("Removing leftover pose overlay {}", leftover.id());
            media::teardown(self.backend.as_ref(), &leftover);
        }

        let _ = self.event_bus.publish(PosecamEvent::PoseSelected {
            asset_id: pose_id.clone(),
            from_cache,
        });

        let outcome = self
            .playback
            .attach_with_deadline(handle, MediaKind::Pose, self.config.pose_start_timeout())
            .await;
        match outcome {
            PlaybackOutcome::Playing => debug!("Pose {} playing", pose_id),
            PlaybackOutcome::Failed => warn!("Pose {} unavailable, continuing without it", pose_id),
            other => debug!("Pose {} not yet playing ({:?}), continuing", pose_id, other),
        }

        Some(pose_id)
    }

    async fn count_down(&self) {
        let pose = self.session.active_pose_overlay();
        let mut ticker = interval(self.config.countdown_step());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for value in (1..=self.config.countdown_from).rev() {
            ticker.tick().await;
            self.stage.set_countdown(Some(value));
            let overlay_playing = self.reassert_pose(pose.as_ref()).await;
            let _ = self.event_bus.publish(PosecamEvent::CountdownTick {
                value: Some(value),
                overlay_playing,
            });
        }

        ticker.tick().await;
        self.stage.set_countdown(None);
        let _ = self.event_bus.publish(PosecamEvent::CountdownTick {
            value: None,
            overlay_playing: pose.as_ref().is_some_and(|p| !p.is_paused()),
        });

        sleep(self.config.settle_delay()).await;
    }

    /// Nudge a paused pose overlay back into playback
    async fn reassert_pose(&self, pose: Option<&MediaHandle>) -> bool {
        let Some(pose) = pose else {
            return false;
        };
        if pose.is_presented() && pose.is_paused() {
            if let Err(e) = pose.play().await {
                debug!("Pose overlay still not playing: {}", e);
            }
        }
        !pose.is_paused()
    }

    async fn freeze_frame(&self) -> std::result::Result<Composite, CompositeError> {
        self.stage.flash(self.config.flash_duration());
        if let Err(e) = self.stage.play_shutter().await {
            debug!("Shutter sound unavailable: {}", e);
        }

        let (stream, pose, idle) = {
            let session = self.session.lock();
            (
                session.active_stream.clone(),
                session.active_pose_overlay.clone(),
                session.idle_overlay.clone(),
            )
        };

        let stream = stream.ok_or(CompositeError::NoCameraFrame)?;
        let camera_image = stream.current_frame().ok_or(CompositeError::NoCameraFrame)?;
        let overlay = pose
            .and_then(|p| p.current_frame())
            .or_else(|| idle.and_then(|i| i.current_frame()));

        let composite = self.compositor.compose(
            CameraFrame {
                image: &camera_image,
                mirrored: stream.facing().is_mirrored(),
            },
            overlay.as_ref(),
            &self.decorations.decorations(),
        )?;

        for warning in &composite.warnings {
            warn!("Capture composited without a layer: {}", warning);
        }
        Ok(composite)
    }

    async fn cleanup(&self) {
        let pose = self.session.lock().active_pose_overlay.take();
        if let Some(pose) = pose {
            media::teardown(self.backend.as_ref(), &pose);
        }

        let orphans: Vec<MediaHandle> = self
            .backend
            .elements()
            .into_iter()
            .filter(|e| e.kind() == MediaKind::Pose)
            .collect();
        if !orphans.is_empty() {
            debug!("Sweeping {} orphaned pose overlays", orphans.len());
            for orphan in &orphans {
                media::teardown(self.backend.as_ref(), orphan);
            }
        }

        if let Some(idle) = self.session.idle_overlay() {
            idle.set_visible(true);
            if idle.is_paused() {
                if let Err(e) = idle.play().await {
                    debug!("Idle overlay did not resume: {}", e);
                }
            }
        }

        // every capture that reaches cleanup counts, composited or not
        self.session.lock().capture_count += 1;
    }
}
