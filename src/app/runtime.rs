use super::{PosecamApp, ShutdownReason};
use crate::camera::StreamHandle;
use crate::capture::CaptureResult;
use crate::compositor::EncodedImage;
use crate::error::{CameraAccessError, PosecamError, Result};
use crate::events::PosecamEvent;
use crate::export::ExportOutcome;
use crate::playback::Interaction;
use crate::stage::Screen;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info, warn};

impl PosecamApp {
    /// Run one capture and show its result
    pub async fn capture(&self) -> Result<Option<CaptureResult>> {
        match self.sequencer.capture().await {
            Ok(Some(result)) => {
                self.stage.show_result(&result.image);
                self.stage.show(Screen::Results);
                Ok(Some(result))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                error!("Capture failed: {}", e);
                self.stage
                    .alert("Something went wrong taking your photo. Please try again.");
                Err(e)
            }
        }
    }

    /// Discard the last capture and go back to the camera
    pub fn retake(&self) {
        self.session.lock().captured_image = None;
        self.stage.show(Screen::Camera);
        info!("Retake requested");
    }

    /// Switch between front and back camera
    pub async fn flip_camera(&self) -> Result<StreamHandle> {
        match self.camera.flip().await {
            Ok(stream) => Ok(stream),
            Err(CameraAccessError::CaptureInProgress) => {
                warn!("Ignoring camera flip during capture");
                Err(CameraAccessError::CaptureInProgress.into())
            }
            Err(e) => {
                self.stage.alert("Could not switch cameras. Please try again.");
                Err(e.into())
            }
        }
    }

    /// Save the current capture
    pub async fn download(&self) -> Result<PathBuf> {
        let image = self.captured_image()?;
        self.exporter.download(&image).await
    }

    /// Share the current capture, or download it when sharing is unavailable
    pub async fn share(&self) -> Result<ExportOutcome> {
        let image = self.captured_image()?;
        self.exporter.share(&image).await
    }

    fn captured_image(&self) -> Result<EncodedImage> {
        self.session
            .captured_image()
            .ok_or_else(|| PosecamError::component("export", "No capture to export"))
    }

    /// Forward a touch or pointer event from the host
    pub fn interaction(&self, kind: Interaction) {
        self.gate.interact(kind);
    }

    /// Ask a running [`run`](Self::run) loop to shut down
    pub async fn request_shutdown(&self, reason: ShutdownReason) {
        let _ = self.event_bus.publish(PosecamEvent::ShutdownRequested {
            reason: reason.to_string(),
        });
        if let Some(sender) = self.shutdown_sender.lock().await.take() {
            let _ = sender.send(reason);
        }
    }

    /// Run the main application loop with signal handling
    pub async fn run(&mut self) -> Result<i32> {
        info!("Posecam is running");

        let shutdown_receiver =
            self.shutdown_receiver
                .take()
                .ok_or_else(|| PosecamError::System {
                    message: "Shutdown receiver already taken".to_string(),
                })?;

        self.setup_signal_handlers(Arc::clone(&self.shutdown_sender));

        let shutdown_reason = shutdown_receiver.await.map_err(|_| PosecamError::System {
            message: "Shutdown channel closed unexpectedly".to_string(),
        })?;

        info!("Shutdown initiated: {}", shutdown_reason);

        let exit_code = self.shutdown().await?;

        info!("Posecam shutdown complete");
        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(
        &self,
        shutdown_sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
    ) {
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            warn!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };
                if let Some(()) = sigterm.recv().await {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}
