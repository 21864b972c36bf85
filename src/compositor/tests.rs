use super::*;
use crate::config::{CompositorConfig, PosecamConfig};
use crate::error::{CompositeError, CompositionWarning};
use crate::media::Frame;
use image::{Rgba, RgbaImage};
use std::sync::Arc;

const EPS: f64 = 1e-6;

fn small_config() -> CompositorConfig {
    let mut config = PosecamConfig::default().compositor;
    config.output_resolution = (300, 400);
    config
}

fn solid(w: u32, h: u32, color: [u8; 4]) -> Frame {
    RgbaImage::from_pixel(w, h, Rgba(color))
}

/// Left half red, right half blue
fn split_frame(w: u32, h: u32) -> Frame {
    RgbaImage::from_fn(w, h, |x, _| {
        if x < w / 2 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 255, 255])
        }
    })
}

fn decode(image: &EncodedImage) -> image::RgbImage {
    image::load_from_memory(&image.bytes).unwrap().to_rgb8()
}

#[test]
fn test_cover_crops_wide_camera_symmetrically() {
    let rect = cover_rect((1920, 1080), (1440, 1920));

    assert!((rect.height - 1920.0).abs() < EPS);
    assert!(rect.width > 1440.0);
    assert!((rect.width / rect.height - 16.0 / 9.0).abs() < EPS);
    assert!(rect.x < 0.0);
    // Equal overflow on both sides
    assert!((-rect.x - (rect.right() - 1440.0)).abs() < EPS);
    assert!(rect.y.abs() < EPS);
}

#[test]
fn test_cover_crops_tall_camera_vertically() {
    let rect = cover_rect((720, 1280), (1440, 1920));
    assert!((rect.width - 1440.0).abs() < EPS);
    assert!(rect.y < 0.0);
    assert!((-rect.y - (rect.bottom() - 1920.0)).abs() < EPS);
}

#[test]
fn test_contain_letterboxes_wide_overlay_top_and_bottom() {
    let rect = contain_rect((2000, 1000), (1440, 1920));

    assert!((rect.width - 1440.0).abs() < EPS);
    assert!((rect.height - 720.0).abs() < EPS);
    assert!((rect.y - (1920.0 - rect.bottom())).abs() < EPS);
    assert!((rect.y - 600.0).abs() < EPS);
}

#[test]
fn test_contain_pillarboxes_one_to_two_overlay() {
    let rect = contain_rect((500, 1000), (1440, 1920));

    assert!((rect.height - 1920.0).abs() < EPS);
    assert!((rect.width - 960.0).abs() < EPS);
    assert!((rect.x - 240.0).abs() < EPS);
    assert!((rect.x - (1440.0 - rect.right())).abs() < EPS);
}

#[test]
fn test_matching_aspect_fills_exactly() {
    let cover = cover_rect((720, 960), (1440, 1920));
    let contain = contain_rect((720, 960), (1440, 1920));
    for rect in [cover, contain] {
        assert!(rect.x.abs() < EPS && rect.y.abs() < EPS);
        assert!((rect.width - 1440.0).abs() < EPS);
        assert!((rect.height - 1920.0).abs() < EPS);
    }
}

#[test]
fn test_zero_sized_source_yields_empty_rect() {
    assert!(cover_rect((0, 100), (300, 400)).is_empty());
    assert!(contain_rect((100, 0), (300, 400)).is_empty());
}

#[test]
fn test_compose_produces_fixed_size_jpeg() {
    let compositor = FrameCompositor::new(small_config());
    let camera = solid(1280, 720, [0, 200, 0, 255]);
    let overlay = solid(100, 200, [255, 255, 0, 128]);
    let decorations = StaticDecorations::new(
        Some(solid(64, 32, [255, 255, 255, 255])),
        Some(solid(50, 50, [0, 0, 0, 255])),
    )
    .decorations();

    let composite = compositor
        .compose(
            CameraFrame {
                image: &camera,
                mirrored: false,
            },
            Some(&overlay),
            &decorations,
        )
        .unwrap();

    assert_eq!(composite.image.mime, "image/jpeg");
    assert_eq!((composite.image.width, composite.image.height), (300, 400));
    assert!(composite.warnings.is_empty());
    assert_eq!(&composite.image.bytes[..2], &[0xFF, 0xD8]);

    let decoded = decode(&composite.image);
    assert_eq!(decoded.dimensions(), (300, 400));
    assert!(composite.image.to_data_uri().starts_with("data:image/jpeg;base64,"));
}

#[test]
fn test_front_camera_is_mirrored() {
    let compositor = FrameCompositor::new(small_config());
    let camera = split_frame(300, 400);
    let decorations = Decorations::default();

    let plain = compositor
        .compose(
            CameraFrame {
                image: &camera,
                mirrored: false,
            },
            None,
            &decorations,
        )
        .unwrap();
    let mirrored = compositor
        .compose(
            CameraFrame {
                image: &camera,
                mirrored: true,
            },
            None,
            &decorations,
        )
        .unwrap();

    let plain = decode(&plain.image);
    let mirrored = decode(&mirrored.image);

    let left_plain = plain.get_pixel(75, 200);
    let left_mirrored = mirrored.get_pixel(75, 200);
    assert!(left_plain[0] > 200 && left_plain[2] < 60);
    assert!(left_mirrored[2] > 200 && left_mirrored[0] < 60);
}

#[test]
fn test_missing_layers_are_skipped_with_warnings() {
    let compositor = FrameCompositor::new(small_config());
    let camera = solid(720, 960, [10, 10, 10, 255]);

    let composite = compositor
        .compose(
            CameraFrame {
                image: &camera,
                mirrored: true,
            },
            None,
            &Decorations::default(),
        )
        .unwrap();

    assert!(composite.layout.overlay.is_none());
    assert!(composite.layout.logo.is_none());
    assert!(composite.layout.qr.is_none());
    assert_eq!(
        composite.warnings,
        vec![
            CompositionWarning::OverlayUnavailable,
            CompositionWarning::LogoUnavailable,
            CompositionWarning::QrUnavailable,
        ]
    );
}

#[test]
fn test_zero_sized_decorations_are_skipped_with_warnings() {
    let compositor = FrameCompositor::new(small_config());
    let camera = solid(720, 960, [10, 10, 10, 255]);
    let overlay = solid(300, 400, [0, 0, 0, 0]);
    let decorations = Decorations {
        logo: Some(Arc::new(RgbaImage::new(0, 40))),
        qr: Some(Arc::new(RgbaImage::new(40, 0))),
    };

    let composite = compositor
        .compose(
            CameraFrame {
                image: &camera,
                mirrored: false,
            },
            Some(&overlay),
            &decorations,
        )
        .unwrap();

    assert!(composite.layout.logo.is_none());
    assert!(composite.layout.qr.is_none());
    assert_eq!(
        composite.warnings,
        vec![
            CompositionWarning::LogoUnavailable,
            CompositionWarning::QrUnavailable,
        ]
    );
    assert_eq!((composite.image.width, composite.image.height), (300, 400));
}

#[test]
fn test_empty_camera_frame_is_an_error() {
    let compositor = FrameCompositor::new(small_config());
    let camera = RgbaImage::new(0, 0);
    let result = compositor.compose(
        CameraFrame {
            image: &camera,
            mirrored: false,
        },
        None,
        &Decorations::default(),
    );
    assert_eq!(result.unwrap_err(), CompositeError::NoCameraFrame);
}

#[test]
fn test_decoration_placement() {
    let compositor = FrameCompositor::new(PosecamConfig::default().compositor);

    assert_eq!(compositor.border_px(), 14);

    let logo = compositor.logo_rect((400, 100));
    assert!((logo.width - 288.0).abs() < EPS);
    assert!((logo.height - 72.0).abs() < EPS);
    assert!(logo.x > 0.0 && logo.x < 100.0);
    assert!((logo.x - logo.y).abs() < EPS);

    let qr = compositor.qr_rect((100, 100));
    assert!((qr.width - 216.0).abs() < EPS);
    assert!((1440.0 - qr.right() - logo.x).abs() < EPS);
    assert!((1920.0 - qr.bottom() - logo.y).abs() < EPS);
}

#[test]
fn test_border_respects_pixel_floor() {
    let mut config = small_config();
    config.border_min_px = 8;
    let compositor = FrameCompositor::new(config);
    // 1% of 300 is 3px, below the floor
    assert_eq!(compositor.border_px(), 8);

    let camera = solid(300, 400, [0, 0, 0, 255]);
    let composite = compositor
        .compose(
            CameraFrame {
                image: &camera,
                mirrored: false,
            },
            None,
            &Decorations::default(),
        )
        .unwrap();
    let decoded = decode(&composite.image);
    let edge = decoded.get_pixel(2, 200);
    let inner = decoded.get_pixel(150, 200);
    assert!(edge[0] > 200 && edge[1] > 200 && edge[2] > 200);
    assert!(inner[0] < 50);
}
