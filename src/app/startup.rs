use super::types::{Component, ComponentState, Lifecycle};
use super::PosecamApp;
use crate::error::Result;
use crate::media::MediaKind;
use crate::playback::PlaybackOutcome;
use crate::preload::CriticalLoad;
use crate::stage::Screen;
use std::sync::Arc;
use tracing::{error, info, warn};

impl PosecamApp {
    /// Register components and show the permission screen
    pub async fn initialize(&self) -> Result<()> {
        info!("Initializing posecam components");

        *self.lifecycle.lock() = Lifecycle::default();

        self.stage.show(Screen::Permission);
        Ok(())
    }

    /// Acquire the initial camera and move to the camera screen.
    ///
    /// On failure the user is alerted and the permission screen stays up.
    pub async fn request_permission(&self) -> Result<()> {
        self.set_state(Component::Camera, ComponentState::Starting);

        match self.camera.start(self.config.camera.initial_facing).await {
            Ok(stream) => {
                self.set_state(Component::Camera, ComponentState::Running);
                self.stage.show(Screen::Camera);
                info!("Camera access granted ({} camera)", stream.facing());
                Ok(())
            }
            Err(e) => {
                self.set_state(Component::Camera, ComponentState::Failed);
                error!("Camera access failed: {}", e);
                self.stage.alert(
                    "Camera access is required to take a photo. Please allow access and try again.",
                );
                self.stage.show(Screen::Permission);
                Err(e.into())
            }
        }
    }

    /// Critical load behind the loading indicator, then the idle overlay,
    /// then the remaining poses in the background
    pub async fn load_assets(&self) -> Result<CriticalLoad> {
        self.set_state(Component::Assets, ComponentState::Starting);

        if !self.profile.supports_alpha {
            info!("No alpha-capable format on this device, using static overlay");
            self.stage.show_static_overlay();
        }

        self.stage.set_loading(true, Some("Loading..."));
        let critical = self.cache.load_critical().await;
        self.stage.set_loading(false, None);

        self.start_idle_overlay().await;

        let cache = Arc::clone(&self.cache);
        let background = tokio::spawn(async move {
            cache.load_remaining().await;
        });
        self.background_tasks.lock().push(background);

        self.set_state(Component::Assets, ComponentState::Running);
        Ok(critical)
    }

    async fn start_idle_overlay(&self) {
        let idle_id = &self.profile.idle_asset_id;
        let Some(idle) = self.cache.checkout(idle_id, MediaKind::Idle) else {
            warn!("Idle overlay {} unavailable, using static overlay", idle_id);
            self.stage.show_static_overlay();
            return;
        };

        idle.set_visible(true);
        idle.present();
        self.session.lock().idle_overlay = Some(Arc::clone(&idle));

        let stage = Arc::clone(&self.stage);
        let outcome = self
            .playback
            .attach_or_else(&idle, MediaKind::Idle, |_| stage.show_static_overlay())
            .await;
        if outcome == PlaybackOutcome::Deferred {
            info!("Idle overlay waiting for user interaction");
        }
    }

    /// Spawn the periodic maintenance loops
    pub async fn start_maintenance(&self) -> Result<()> {
        self.set_state(Component::Maintenance, ComponentState::Starting);

        let handle = Arc::clone(&self.maintenance).spawn(self.cancellation_token.child_token());
        self.background_tasks.lock().push(handle);

        self.set_state(Component::Maintenance, ComponentState::Running);
        Ok(())
    }

    /// Permission, assets and maintenance, in order
    pub async fn start(&self) -> Result<()> {
        info!("Starting posecam");
        self.initialize().await?;
        self.request_permission().await?;
        self.load_assets().await?;
        self.start_maintenance().await?;
        info!("Posecam ready for capture");
        Ok(())
    }
}
