//! One-shot device capability detection.
//!
//! The platform family is derived here and nowhere else; every other module
//! consumes the resulting [`AssetProfile`] as data.

use crate::config::AssetsConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Platform families, each with its own container/codec preference chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformFamily {
    /// Apple WebKit (iOS, iPadOS, desktop Safari): HEVC with alpha in QuickTime
    WebKit,
    /// Chromium, Firefox and Android: VP9/VP8 with alpha in WebM
    Chromium,
    /// Anything else: opaque H.264
    Baseline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Container {
    Mov,
    Webm,
    Mp4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Codec {
    Hevc,
    Vp9,
    Vp8,
    H264,
}

/// A container/codec pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub container: Container,
    pub codec: Codec,
}

impl VideoFormat {
    pub const HEVC_MOV: VideoFormat = VideoFormat {
        container: Container::Mov,
        codec: Codec::Hevc,
    };
    pub const VP9_WEBM: VideoFormat = VideoFormat {
        container: Container::Webm,
        codec: Codec::Vp9,
    };
    pub const VP8_WEBM: VideoFormat = VideoFormat {
        container: Container::Webm,
        codec: Codec::Vp8,
    };
    pub const H264_MP4: VideoFormat = VideoFormat {
        container: Container::Mp4,
        codec: Codec::H264,
    };

    /// MIME type used for codec support queries
    pub fn mime(&self) -> &'static str {
        match (self.container, self.codec) {
            (Container::Mov, _) => "video/quicktime; codecs=\"hvc1\"",
            (Container::Webm, Codec::Vp9) => "video/webm; codecs=\"vp9\"",
            (Container::Webm, _) => "video/webm; codecs=\"vp8\"",
            (Container::Mp4, _) => "video/mp4; codecs=\"avc1.42E01E\"",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self.container {
            Container::Mov => "mov",
            Container::Webm => "webm",
            Container::Mp4 => "mp4",
        }
    }

    /// Asset sub-directory holding this encoding
    pub fn folder(&self) -> &'static str {
        match self.codec {
            Codec::Hevc => "hevc",
            Codec::Vp9 => "vp9",
            Codec::Vp8 => "vp8",
            Codec::H264 => "h264",
        }
    }

    /// Whether this pairing carries an alpha channel
    pub fn supports_alpha(&self) -> bool {
        !matches!(self.codec, Codec::H264)
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.codec, self.container)
    }
}

impl PlatformFamily {
    /// Preferred formats, best first
    pub fn candidates(&self) -> &'static [VideoFormat] {
        match self {
            PlatformFamily::WebKit => &[VideoFormat::HEVC_MOV, VideoFormat::H264_MP4],
            PlatformFamily::Chromium => &[
                VideoFormat::VP9_WEBM,
                VideoFormat::VP8_WEBM,
                VideoFormat::H264_MP4,
            ],
            PlatformFamily::Baseline => &[VideoFormat::H264_MP4],
        }
    }

    /// Classify a user-agent string
    pub fn classify(user_agent: &str) -> Self {
        let ua = user_agent;
        let apple_mobile = ["iPhone", "iPad", "iPod"].iter().any(|m| ua.contains(m));
        let desktop_safari = ua.contains("Macintosh")
            && ua.contains("Safari")
            && !ua.contains("Chrome")
            && !ua.contains("Chromium")
            && !ua.contains("Firefox");

        if apple_mobile || desktop_safari {
            PlatformFamily::WebKit
        } else if ["Chrome", "Chromium", "Firefox", "Android", "Edg/"]
            .iter()
            .any(|m| ua.contains(m))
        {
            PlatformFamily::Chromium
        } else {
            PlatformFamily::Baseline
        }
    }
}

/// Answers "can this runtime play the given MIME type"
pub trait CodecProbe: Send + Sync {
    fn can_play(&self, mime: &str) -> bool;
}

/// Probe backed by a fixed list of supported MIME types
#[derive(Debug, Clone, Default)]
pub struct StaticCodecProbe {
    supported: HashSet<String>,
}

impl StaticCodecProbe {
    pub fn new<I, S>(supported: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supported: supported.into_iter().map(Into::into).collect(),
        }
    }

    /// Probe that accepts every format
    pub fn permissive() -> Self {
        Self::new(
            [
                VideoFormat::HEVC_MOV,
                VideoFormat::VP9_WEBM,
                VideoFormat::VP8_WEBM,
                VideoFormat::H264_MP4,
            ]
            .iter()
            .map(|f| f.mime()),
        )
    }
}

impl CodecProbe for StaticCodecProbe {
    fn can_play(&self, mime: &str) -> bool {
        self.supported.contains(mime)
    }
}

/// Ambient runtime description inspected at startup
#[derive(Clone)]
pub struct Environment {
    pub user_agent: String,
    pub probe: Arc<dyn CodecProbe>,
}

impl Environment {
    pub fn new<S: Into<String>>(user_agent: S, probe: Arc<dyn CodecProbe>) -> Self {
        Self {
            user_agent: user_agent.into(),
            probe,
        }
    }
}

/// A logical asset id resolved to a concrete file and encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSource {
    pub asset_id: String,
    pub path: PathBuf,
    pub format: VideoFormat,
}

/// Immutable description of which video assets to use on this device
#[derive(Debug, Clone)]
pub struct AssetProfile {
    pub platform_family: PlatformFamily,
    pub format: VideoFormat,
    pub supports_alpha: bool,
    pub pose_asset_ids: Vec<String>,
    pub idle_asset_id: String,
    assets_dir: PathBuf,
}

impl AssetProfile {
    /// Resolve a logical id; only configured ids resolve
    pub fn source(&self, asset_id: &str) -> Option<AssetSource> {
        if asset_id != self.idle_asset_id && !self.is_pose(asset_id) {
            return None;
        }

        Some(AssetSource {
            asset_id: asset_id.to_string(),
            path: self
                .assets_dir
                .join(self.format.folder())
                .join(format!("{}.{}", asset_id, self.format.extension())),
            format: self.format,
        })
    }

    pub fn is_pose(&self, asset_id: &str) -> bool {
        self.pose_asset_ids.iter().any(|id| id == asset_id)
    }
}

/// Inspect the environment once and pick the asset family
pub fn detect(env: &Environment, assets: &AssetsConfig) -> AssetProfile {
    let platform_family = PlatformFamily::classify(&env.user_agent);
    debug!(
        "Classified user agent '{}' as {:?}",
        env.user_agent, platform_family
    );

    let candidates = platform_family.candidates();
    let format = candidates
        .iter()
        .copied()
        .find(|f| env.probe.can_play(f.mime()))
        .unwrap_or_else(|| {
            warn!(
                "No candidate format reported as playable for {:?}, assuming H.264",
                platform_family
            );
            VideoFormat::H264_MP4
        });

    let supports_alpha = format.supports_alpha();

    info!(
        "Asset profile: family={:?} format={} alpha={}",
        platform_family, format, supports_alpha
    );

    AssetProfile {
        platform_family,
        format,
        supports_alpha,
        pose_asset_ids: assets.pose_ids.clone(),
        idle_asset_id: assets.idle_id.clone(),
        assets_dir: PathBuf::from(&assets.directory),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PosecamConfig;

    const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const MAC_SAFARI_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15";
    const MAC_CHROME_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const ANDROID_UA: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";

    fn env(ua: &str, probe: StaticCodecProbe) -> Environment {
        Environment::new(ua, Arc::new(probe))
    }

    #[test]
    fn test_classify_user_agents() {
        assert_eq!(PlatformFamily::classify(IPHONE_UA), PlatformFamily::WebKit);
        assert_eq!(PlatformFamily::classify(MAC_SAFARI_UA), PlatformFamily::WebKit);
        assert_eq!(PlatformFamily::classify(MAC_CHROME_UA), PlatformFamily::Chromium);
        assert_eq!(PlatformFamily::classify(ANDROID_UA), PlatformFamily::Chromium);
        assert_eq!(PlatformFamily::classify("curl/8.0"), PlatformFamily::Baseline);
    }

    #[test]
    fn test_detect_prefers_alpha_format() {
        let assets = PosecamConfig::default().assets;
        let profile = detect(&env(IPHONE_UA, StaticCodecProbe::permissive()), &assets);

        assert_eq!(profile.format, VideoFormat::HEVC_MOV);
        assert!(profile.supports_alpha);
        assert_eq!(profile.idle_asset_id, "idle");
        assert_eq!(profile.pose_asset_ids.len(), 5);
    }

    #[test]
    fn test_detect_walks_fallback_chain() {
        let assets = PosecamConfig::default().assets;
        let probe = StaticCodecProbe::new([VideoFormat::VP8_WEBM.mime()]);
        let profile = detect(&env(ANDROID_UA, probe), &assets);
        assert_eq!(profile.format, VideoFormat::VP8_WEBM);
        assert!(profile.supports_alpha);

        let probe = StaticCodecProbe::new([VideoFormat::H264_MP4.mime()]);
        let profile = detect(&env(IPHONE_UA, probe), &assets);
        assert_eq!(profile.format, VideoFormat::H264_MP4);
        assert!(!profile.supports_alpha);
    }

    #[test]
    fn test_detect_without_any_playable_format() {
        let assets = PosecamConfig::default().assets;
        let profile = detect(&env(MAC_CHROME_UA, StaticCodecProbe::default()), &assets);
        assert_eq!(profile.format, VideoFormat::H264_MP4);
        assert!(!profile.supports_alpha);
    }

    #[test]
    fn test_source_resolution() {
        let mut assets = PosecamConfig::default().assets;
        assets.directory = "/srv/assets".to_string();
        let profile = detect(&env(ANDROID_UA, StaticCodecProbe::permissive()), &assets);

        let source = profile.source("pose2").unwrap();
        assert_eq!(source.path, PathBuf::from("/srv/assets/vp9/pose2.webm"));
        assert_eq!(source.format, VideoFormat::VP9_WEBM);

        assert!(profile.source("idle").is_some());
        assert!(profile.source("pose99").is_none());
    }
}
