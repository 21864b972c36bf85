use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::camera::Facing;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PosecamConfig {
    pub assets: AssetsConfig,
    pub camera: CameraConfig,
    pub preload: PreloadConfig,
    pub playback: PlaybackConfig,
    pub capture: CaptureConfig,
    pub compositor: CompositorConfig,
    pub maintenance: MaintenanceConfig,
    pub export: ExportConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AssetsConfig {
    /// Root directory holding the per-format video folders
    #[serde(default = "default_assets_directory")]
    pub directory: String,

    /// Logical id of the looping idle animation
    #[serde(default = "default_idle_id")]
    pub idle_id: String,

    /// Logical ids of the pose animations, in display order
    #[serde(default = "default_pose_ids")]
    pub pose_ids: Vec<String>,

    /// Logo drawn at the top-left of every capture
    #[serde(default = "default_logo_path")]
    pub logo_path: String,

    /// QR/marker image drawn at the bottom-right of every capture
    #[serde(default = "default_qr_path")]
    pub qr_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera used when permission is first granted
    #[serde(default = "default_initial_facing")]
    pub initial_facing: Facing,

    /// Ideal capture resolution (width, height), portrait
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Ideal width/height ratio
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: f64,

    /// Ideal frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PreloadConfig {
    /// Per-asset load timeout in milliseconds
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    /// Spacing between background loads in milliseconds
    #[serde(default = "default_inter_load_delay_ms")]
    pub inter_load_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlaybackConfig {
    /// Retries for both load failures and play rejections
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff between play attempts in milliseconds
    #[serde(default = "default_play_retry_delay_ms")]
    pub play_retry_delay_ms: u64,

    /// Backoff between load attempts in milliseconds
    #[serde(default = "default_load_retry_delay_ms")]
    pub load_retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// First countdown value shown
    #[serde(default = "default_countdown_from")]
    pub countdown_from: u8,

    /// Countdown step in milliseconds
    #[serde(default = "default_countdown_step_ms")]
    pub countdown_step_ms: u64,

    /// Delay between countdown end and the freeze-frame
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Upper bound on waiting for the pose overlay to start
    #[serde(default = "default_pose_start_timeout_ms")]
    pub pose_start_timeout_ms: u64,

    /// Duration of the flash effect
    #[serde(default = "default_flash_duration_ms")]
    pub flash_duration_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CompositorConfig {
    /// Output canvas (width, height)
    #[serde(default = "default_output_resolution")]
    pub output_resolution: (u32, u32),

    /// JPEG quality factor (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Border stroke as a fraction of canvas width
    #[serde(default = "default_border_fraction")]
    pub border_fraction: f64,

    /// Border stroke floor in pixels
    #[serde(default = "default_border_min_px")]
    pub border_min_px: u32,

    /// Border colour as RGBA
    #[serde(default = "default_border_color")]
    pub border_color: [u8; 4],

    /// Logo width as a fraction of canvas width
    #[serde(default = "default_logo_width_fraction")]
    pub logo_width_fraction: f64,

    /// QR width as a fraction of canvas width
    #[serde(default = "default_qr_width_fraction")]
    pub qr_width_fraction: f64,

    /// Decoration inset from the canvas edge as a fraction of canvas width
    #[serde(default = "default_margin_fraction")]
    pub margin_fraction: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MaintenanceConfig {
    /// Idle-stall check and orphan sweep period in seconds
    #[serde(default = "default_stall_check_interval_secs")]
    pub stall_check_interval_secs: u64,

    /// Decoder reclaim hint period in seconds
    #[serde(default = "default_reclaim_interval_secs")]
    pub reclaim_interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExportConfig {
    /// Directory downloads are saved into
    #[serde(default = "default_export_directory")]
    pub directory: String,

    /// Timezone used for download file names
    #[serde(default = "default_export_timezone")]
    pub timezone: String,

    /// Write a JSON sidecar next to each download
    #[serde(default = "default_save_metadata")]
    pub save_metadata: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Fixed seed for pose selection; entropy when unset
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl PreloadConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn inter_load_delay(&self) -> Duration {
        Duration::from_millis(self.inter_load_delay_ms)
    }
}

impl PlaybackConfig {
    pub fn play_retry_delay(&self) -> Duration {
        Duration::from_millis(self.play_retry_delay_ms)
    }

    pub fn load_retry_delay(&self) -> Duration {
        Duration::from_millis(self.load_retry_delay_ms)
    }
}

impl CaptureConfig {
    pub fn countdown_step(&self) -> Duration {
        Duration::from_millis(self.countdown_step_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn pose_start_timeout(&self) -> Duration {
        Duration::from_millis(self.pose_start_timeout_ms)
    }

    pub fn flash_duration(&self) -> Duration {
        Duration::from_millis(self.flash_duration_ms)
    }
}

impl MaintenanceConfig {
    pub fn stall_check_interval(&self) -> Duration {
        Duration::from_secs(self.stall_check_interval_secs)
    }

    pub fn reclaim_interval(&self) -> Duration {
        Duration::from_secs(self.reclaim_interval_secs)
    }
}

impl PosecamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("posecam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let (camera_w, camera_h) = default_camera_resolution();
        let (output_w, output_h) = default_output_resolution();

        let settings = Config::builder()
            .set_default("assets.directory", default_assets_directory())?
            .set_default("assets.idle_id", default_idle_id())?
            .set_default("assets.pose_ids", default_pose_ids())?
            .set_default("assets.logo_path", default_logo_path())?
            .set_default("assets.qr_path", default_qr_path())?
            .set_default("camera.initial_facing", "front")?
            .set_default("camera.resolution", vec![camera_w, camera_h])?
            .set_default("camera.aspect_ratio", default_aspect_ratio())?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("preload.load_timeout_ms", default_load_timeout_ms())?
            .set_default("preload.inter_load_delay_ms", default_inter_load_delay_ms())?
            .set_default("playback.max_retries", default_max_retries())?
            .set_default("playback.play_retry_delay_ms", default_play_retry_delay_ms())?
            .set_default("playback.load_retry_delay_ms", default_load_retry_delay_ms())?
            .set_default("capture.countdown_from", default_countdown_from() as u64)?
            .set_default("capture.countdown_step_ms", default_countdown_step_ms())?
            .set_default("capture.settle_delay_ms", default_settle_delay_ms())?
            .set_default(
                "capture.pose_start_timeout_ms",
                default_pose_start_timeout_ms(),
            )?
            .set_default("capture.flash_duration_ms", default_flash_duration_ms())?
            .set_default("compositor.output_resolution", vec![output_w, output_h])?
            .set_default("compositor.jpeg_quality", default_jpeg_quality() as u64)?
            .set_default("compositor.border_fraction", default_border_fraction())?
            .set_default("compositor.border_min_px", default_border_min_px())?
            .set_default(
                "compositor.border_color",
                default_border_color()
                    .iter()
                    .map(|c| *c as u64)
                    .collect::<Vec<_>>(),
            )?
            .set_default(
                "compositor.logo_width_fraction",
                default_logo_width_fraction(),
            )?
            .set_default("compositor.qr_width_fraction", default_qr_width_fraction())?
            .set_default("compositor.margin_fraction", default_margin_fraction())?
            .set_default(
                "maintenance.stall_check_interval_secs",
                default_stall_check_interval_secs(),
            )?
            .set_default(
                "maintenance.reclaim_interval_secs",
                default_reclaim_interval_secs(),
            )?
            .set_default("export.directory", default_export_directory())?
            .set_default("export.timezone", default_export_timezone())?
            .set_default("export.save_metadata", default_save_metadata())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with POSECAM_ prefix, e.g. POSECAM_CAPTURE__COUNTDOWN_FROM
            .add_source(
                Environment::with_prefix("POSECAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: PosecamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.assets.pose_ids.is_empty() {
            return Err(ConfigError::Message(
                "At least one pose asset id must be configured".to_string(),
            ));
        }

        if self.assets.pose_ids.contains(&self.assets.idle_id) {
            return Err(ConfigError::Message(format!(
                "Idle asset id '{}' must not also be a pose id",
                self.assets.idle_id
            )));
        }

        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.preload.load_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Preload load_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.playback.play_retry_delay_ms == 0 || self.playback.load_retry_delay_ms == 0 {
            return Err(ConfigError::Message(
                "Playback retry delays must be greater than 0".to_string(),
            ));
        }

        if self.capture.countdown_from == 0 || self.capture.countdown_step_ms == 0 {
            return Err(ConfigError::Message(
                "Countdown must start above 0 with a non-zero step".to_string(),
            ));
        }

        if self.capture.pose_start_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Capture pose_start_timeout_ms must be greater than 0".to_string(),
            ));
        }

        let (out_w, out_h) = self.compositor.output_resolution;
        if out_w == 0 || out_h == 0 {
            return Err(ConfigError::Message(
                "Compositor output resolution must be greater than 0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.compositor.jpeg_quality) {
            return Err(ConfigError::Message(
                "Compositor jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.maintenance.stall_check_interval_secs == 0
            || self.maintenance.reclaim_interval_secs == 0
        {
            return Err(ConfigError::Message(
                "Maintenance intervals must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PosecamConfig {
    fn default() -> Self {
        Self {
            assets: AssetsConfig {
                directory: default_assets_directory(),
                idle_id: default_idle_id(),
                pose_ids: default_pose_ids(),
                logo_path: default_logo_path(),
                qr_path: default_qr_path(),
            },
            camera: CameraConfig {
                initial_facing: default_initial_facing(),
                resolution: default_camera_resolution(),
                aspect_ratio: default_aspect_ratio(),
                fps: default_camera_fps(),
            },
            preload: PreloadConfig {
                load_timeout_ms: default_load_timeout_ms(),
                inter_load_delay_ms: default_inter_load_delay_ms(),
            },
            playback: PlaybackConfig {
                max_retries: default_max_retries(),
                play_retry_delay_ms: default_play_retry_delay_ms(),
                load_retry_delay_ms: default_load_retry_delay_ms(),
            },
            capture: CaptureConfig {
                countdown_from: default_countdown_from(),
                countdown_step_ms: default_countdown_step_ms(),
                settle_delay_ms: default_settle_delay_ms(),
                pose_start_timeout_ms: default_pose_start_timeout_ms(),
                flash_duration_ms: default_flash_duration_ms(),
            },
            compositor: CompositorConfig {
                output_resolution: default_output_resolution(),
                jpeg_quality: default_jpeg_quality(),
                border_fraction: default_border_fraction(),
                border_min_px: default_border_min_px(),
                border_color: default_border_color(),
                logo_width_fraction: default_logo_width_fraction(),
                qr_width_fraction: default_qr_width_fraction(),
                margin_fraction: default_margin_fraction(),
            },
            maintenance: MaintenanceConfig {
                stall_check_interval_secs: default_stall_check_interval_secs(),
                reclaim_interval_secs: default_reclaim_interval_secs(),
            },
            export: ExportConfig {
                directory: default_export_directory(),
                timezone: default_export_timezone(),
                save_metadata: default_save_metadata(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                rng_seed: None,
            },
        }
    }
}

// Default value functions
fn default_assets_directory() -> String {
    "./assets".to_string()
}
fn default_idle_id() -> String {
    "idle".to_string()
}
fn default_pose_ids() -> Vec<String> {
    (1..=5).map(|i| format!("pose{}", i)).collect()
}
fn default_logo_path() -> String {
    "./assets/logo.png".to_string()
}
fn default_qr_path() -> String {
    "./assets/qr.png".to_string()
}

fn default_initial_facing() -> Facing {
    Facing::Front
}
fn default_camera_resolution() -> (u32, u32) {
    (720, 960)
}
fn default_aspect_ratio() -> f64 {
    0.75
}
fn default_camera_fps() -> u32 {
    30
}

fn default_load_timeout_ms() -> u64 {
    10_000
}
fn default_inter_load_delay_ms() -> u64 {
    100
}

fn default_max_retries() -> u32 {
    3
}
fn default_play_retry_delay_ms() -> u64 {
    500
}
fn default_load_retry_delay_ms() -> u64 {
    1_000
}

fn default_countdown_from() -> u8 {
    3
}
fn default_countdown_step_ms() -> u64 {
    1_000
}
fn default_settle_delay_ms() -> u64 {
    100
}
fn default_pose_start_timeout_ms() -> u64 {
    2_500
}
fn default_flash_duration_ms() -> u64 {
    300
}

fn default_output_resolution() -> (u32, u32) {
    (1440, 1920)
} // 3:4 portrait at twice the ideal camera size
fn default_jpeg_quality() -> u8 {
    90
}
fn default_border_fraction() -> f64 {
    0.01
}
fn default_border_min_px() -> u32 {
    8
}
fn default_border_color() -> [u8; 4] {
    [255, 255, 255, 255]
}
fn default_logo_width_fraction() -> f64 {
    0.20
}
fn default_qr_width_fraction() -> f64 {
    0.15
}
fn default_margin_fraction() -> f64 {
    0.03
}

fn default_stall_check_interval_secs() -> u64 {
    60
}
fn default_reclaim_interval_secs() -> u64 {
    300
}

fn default_export_directory() -> String {
    "./captures".to_string()
}
fn default_export_timezone() -> String {
    "UTC".to_string()
}
fn default_save_metadata() -> bool {
    false
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PosecamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.compositor.output_resolution, (1440, 1920));
        assert_eq!(config.compositor.jpeg_quality, 90);
        assert_eq!(config.preload.load_timeout(), Duration::from_secs(10));
        assert_eq!(config.assets.pose_ids.len(), 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = PosecamConfig::default();
        config.camera.resolution = (0, 0);
        assert!(config.validate().is_err());

        config.camera.resolution = (720, 960);
        assert!(config.validate().is_ok());

        config.compositor.jpeg_quality = 0;
        assert!(config.validate().is_err());

        config.compositor.jpeg_quality = 90;
        config.assets.pose_ids.clear();
        assert!(config.validate().is_err());

        config.assets.pose_ids = vec!["idle".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[assets]\npose_ids = [\"wave\", \"jump\"]\n\n[capture]\ncountdown_from = 5\n\n[camera]\ninitial_facing = \"back\"\n"
        )
        .unwrap();

        let config = PosecamConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.assets.pose_ids, vec!["wave", "jump"]);
        assert_eq!(config.capture.countdown_from, 5);
        assert_eq!(config.camera.initial_facing, Facing::Back);
        assert_eq!(config.playback.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_serializes_to_toml() {
        let rendered = toml::to_string_pretty(&PosecamConfig::default()).unwrap();
        assert!(rendered.contains("[compositor]"));
        assert!(rendered.contains("jpeg_quality = 90"));
    }
}
