use crate::compositor::EncodedImage;
use crate::config::ExportConfig;
use crate::error::{PosecamError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// Native share sheet, when the host has one
#[async_trait]
pub trait ShareTarget: Send + Sync {
    fn is_available(&self) -> bool;

    async fn share(&self, image: &EncodedImage, file_name: &str) -> Result<()>;
}

/// Where an exported still ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Downloaded(PathBuf),
    Shared,
}

/// Sidecar written next to a downloaded still
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub file_name: String,
    pub exported_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
    pub mime: String,
}

/// Resolve configured timezone, falling back to UTC on parse errors
pub(crate) fn resolve_timezone(tz_name: &str) -> Tz {
    match tz_name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!("Invalid export timezone '{}', falling back to UTC", tz_name);
            chrono_tz::UTC
        }
    }
}

/// Hands encoded stills to the download and share collaborators
pub struct Exporter {
    config: ExportConfig,
    timezone: Tz,
    share_target: Option<Arc<dyn ShareTarget>>,
}

impl Exporter {
    pub fn new(config: ExportConfig, share_target: Option<Arc<dyn ShareTarget>>) -> Self {
        let timezone = resolve_timezone(&config.timezone);
        Self {
            config,
            timezone,
            share_target,
        }
    }

    /// File name for a still exported at `at`, in the configured timezone
    pub fn file_name(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone)
            .format("posecam-%Y%m%d-%H%M%S.jpg")
            .to_string()
    }

    /// Save the still under the export directory
    pub async fn download(&self, image: &EncodedImage) -> Result<PathBuf> {
        if image.is_empty() {
            return Err(PosecamError::component("export", "Nothing to export"));
        }

        let now = Utc::now();
        let file_name = self.file_name(now);
        let directory = PathBuf::from(&self.config.directory);

        fs::create_dir_all(&directory).await.map_err(|e| {
            PosecamError::component(
                "export",
                &format!("Failed to create export directory: {}", e),
            )
        })?;

        let path = directory.join(&file_name);
        fs::write(&path, &image.bytes).await?;
        info!("Saved capture to {} ({} bytes)", path.display(), image.len());

        if self.config.save_metadata {
            let metadata = ExportMetadata {
                file_name,
                exported_at: now,
                width: image.width,
                height: image.height,
                bytes: image.len(),
                mime: image.mime.to_string(),
            };
            save_metadata(&metadata, &path).await?;
        }

        Ok(path)
    }

    /// Share through the native target, downloading instead when there is none
    /// or the share fails
    pub async fn share(&self, image: &EncodedImage) -> Result<ExportOutcome> {
        if let Some(target) = self.share_target.as_ref().filter(|t| t.is_available()) {
            let file_name = self.file_name(Utc::now());
            match target.share(image, &file_name).await {
                Ok(()) => {
                    info!("Shared capture as {}", file_name);
                    return Ok(ExportOutcome::Shared);
                }
                Err(e) => warn!("Share failed, downloading instead: {}", e),
            }
        } else {
            debug!("No share target available, downloading instead");
        }

        self.download(image).await.map(ExportOutcome::Downloaded)
    }
}

async fn save_metadata(metadata: &ExportMetadata, image_path: &Path) -> Result<()> {
    let metadata_json = serde_json::to_string_pretty(metadata)?;
    let metadata_path = image_path.with_extension("json");
    fs::write(&metadata_path, metadata_json).await?;

    debug!("Saved metadata to {}", metadata_path.display());
    Ok(())
}
