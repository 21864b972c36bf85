use crate::config::AssetsConfig;
use crate::media::Frame;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Static images drawn over every capture
#[derive(Debug, Clone, Default)]
pub struct Decorations {
    pub logo: Option<Arc<Frame>>,
    pub qr: Option<Arc<Frame>>,
}

/// Provides decorations as currently loaded; missing images are `None`
pub trait DecorationSource: Send + Sync {
    fn decorations(&self) -> Decorations;
}

/// Decorations decoded once and held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticDecorations {
    decorations: Decorations,
}

impl StaticDecorations {
    pub fn new(logo: Option<Frame>, qr: Option<Frame>) -> Self {
        Self {
            decorations: Decorations {
                logo: logo.map(Arc::new),
                qr: qr.map(Arc::new),
            },
        }
    }

    /// Decode the configured logo and QR images; unreadable files are skipped
    pub fn load(config: &AssetsConfig) -> Self {
        let logo = load_image(&config.logo_path, "logo");
        let qr = load_image(&config.qr_path, "qr");
        Self::new(logo, qr)
    }
}

impl DecorationSource for StaticDecorations {
    fn decorations(&self) -> Decorations {
        self.decorations.clone()
    }
}

fn load_image(path: &str, label: &str) -> Option<Frame> {
    match image::open(Path::new(path)) {
        Ok(img) => {
            let img = img.to_rgba8();
            info!(
                "Loaded {} image {} ({}x{})",
                label,
                path,
                img.width(),
                img.height()
            );
            Some(img)
        }
        Err(e) => {
            warn!("Failed to load {} image '{}': {}", label, path, e);
            None
        }
    }
}
