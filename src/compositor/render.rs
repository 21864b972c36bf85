use super::decorations::Decorations;
use super::geometry::{contain_rect, cover_rect, visible_source, DrawRect};
use crate::config::CompositorConfig;
use crate::error::{CompositeError, CompositionWarning};
use crate::media::Frame;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::fmt;
use tracing::{debug, warn};

/// A compressed still image
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
    pub mime: &'static str,
}

impl EncodedImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `data:` URI suitable for an image element
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime", &self.mime)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// The live camera frame and whether it must be mirrored
#[derive(Debug, Clone, Copy)]
pub struct CameraFrame<'a> {
    pub image: &'a Frame,
    pub mirrored: bool,
}

/// Where each layer was drawn
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeLayout {
    pub canvas: (u32, u32),
    pub camera: DrawRect,
    pub overlay: Option<DrawRect>,
    pub logo: Option<DrawRect>,
    pub qr: Option<DrawRect>,
    pub border_px: u32,
}

/// Result of a freeze-frame composite
#[derive(Debug, Clone)]
pub struct Composite {
    pub image: EncodedImage,
    pub layout: CompositeLayout,
    pub warnings: Vec<CompositionWarning>,
}

/// Draws camera, overlay and decorations onto a fixed-size canvas
#[derive(Debug, Clone)]
pub struct FrameCompositor {
    config: CompositorConfig,
}

impl FrameCompositor {
    pub fn new(config: CompositorConfig) -> Self {
        Self { config }
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.config.output_resolution
    }

    /// Border stroke width in pixels
    pub fn border_px(&self) -> u32 {
        let (width, _) = self.config.output_resolution;
        ((width as f64 * self.config.border_fraction).round() as u32).max(self.config.border_min_px)
    }

    /// Logo position: top-left, inset by the margin
    pub fn logo_rect(&self, logo: (u32, u32)) -> DrawRect {
        let (cw, _) = self.config.output_resolution;
        let width = cw as f64 * self.config.logo_width_fraction;
        let margin = self.margin();
        DrawRect {
            x: margin,
            y: margin,
            width,
            height: width * logo.1 as f64 / logo.0.max(1) as f64,
        }
    }

    /// QR position: bottom-right, inset by the margin
    pub fn qr_rect(&self, qr: (u32, u32)) -> DrawRect {
        let (cw, ch) = self.config.output_resolution;
        let width = cw as f64 * self.config.qr_width_fraction;
        let height = width * qr.1 as f64 / qr.0.max(1) as f64;
        let margin = self.margin();
        DrawRect {
            x: cw as f64 - margin - width,
            y: ch as f64 - margin - height,
            width,
            height,
        }
    }

    fn margin(&self) -> f64 {
        let (cw, _) = self.config.output_resolution;
        (cw as f64 * self.config.margin_fraction).max(self.border_px() as f64)
    }

    /// Compose a freeze-frame and encode it as JPEG
    pub fn compose(
        &self,
        camera: CameraFrame<'_>,
        overlay: Option<&Frame>,
        decorations: &Decorations,
    ) -> Result<Composite, CompositeError> {
        let canvas_size = self.config.output_resolution;
        let mut canvas = RgbaImage::from_pixel(canvas_size.0, canvas_size.1, Rgba([0, 0, 0, 255]));
        let mut warnings = Vec::new();

        if camera.image.width() == 0 || camera.image.height() == 0 {
            return Err(CompositeError::NoCameraFrame);
        }

        let camera_rect = cover_rect(camera.image.dimensions(), canvas_size);
        draw_cropped(&mut canvas, camera.image, &camera_rect, camera.mirrored);

        let overlay_rect = match overlay {
            Some(frame) if frame.width() > 0 && frame.height() > 0 => {
                let rect = contain_rect(frame.dimensions(), canvas_size);
                draw_cropped(&mut canvas, frame, &rect, false);
                Some(rect)
            }
            _ => {
                debug!("No overlay frame available, skipping overlay layer");
                warnings.push(CompositionWarning::OverlayUnavailable);
                None
            }
        };

        let border_px = self.border_px();
        self.draw_border(&mut canvas, border_px);

        let logo_rect = match &decorations.logo {
            Some(logo) if logo.width() > 0 && logo.height() > 0 => {
                let rect = self.logo_rect(logo.dimensions());
                draw_cropped(&mut canvas, logo, &rect, false);
                Some(rect)
            }
            _ => {
                warnings.push(CompositionWarning::LogoUnavailable);
                None
            }
        };

        let qr_rect = match &decorations.qr {
            Some(qr) if qr.width() > 0 && qr.height() > 0 => {
                let rect = self.qr_rect(qr.dimensions());
                draw_cropped(&mut canvas, qr, &rect, false);
                Some(rect)
            }
            _ => {
                warnings.push(CompositionWarning::QrUnavailable);
                None
            }
        };

        for warning in &warnings {
            debug!("Composition: {}", warning);
        }

        let image = self.encode(canvas)?;
        debug!(
            "Composed {}x{} still ({} bytes, {} warnings)",
            image.width,
            image.height,
            image.len(),
            warnings.len()
        );

        Ok(Composite {
            image,
            layout: CompositeLayout {
                canvas: canvas_size,
                camera: camera_rect,
                overlay: overlay_rect,
                logo: logo_rect,
                qr: qr_rect,
                border_px,
            },
            warnings,
        })
    }

    fn draw_border(&self, canvas: &mut RgbaImage, thickness: u32) {
        let (w, h) = canvas.dimensions();
        let t = thickness.min(w / 2).min(h / 2);
        if t == 0 {
            return;
        }
        let color = Rgba(self.config.border_color);

        draw_filled_rect_mut(canvas, Rect::at(0, 0).of_size(w, t), color);
        draw_filled_rect_mut(canvas, Rect::at(0, (h - t) as i32).of_size(w, t), color);
        draw_filled_rect_mut(canvas, Rect::at(0, 0).of_size(t, h), color);
        draw_filled_rect_mut(canvas, Rect::at((w - t) as i32, 0).of_size(t, h), color);
    }

    fn encode(&self, canvas: RgbaImage) -> Result<EncodedImage, CompositeError> {
        let (width, height) = canvas.dimensions();
        let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();

        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, self.config.jpeg_quality);
        encoder
            .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
            .map_err(|e| {
                warn!("JPEG encoding failed: {}", e);
                CompositeError::Encode {
                    details: e.to_string(),
                }
            })?;

        Ok(EncodedImage {
            bytes: Bytes::from(buffer),
            width,
            height,
            mime: "image/jpeg",
        })
    }
}

/// Draw the visible part of `src` at `rect`, alpha blended, optionally mirrored
fn draw_cropped(canvas: &mut RgbaImage, src: &Frame, rect: &DrawRect, mirrored: bool) {
    if rect.is_empty() || src.width() == 0 || src.height() == 0 {
        return;
    }

    let dst = canvas.dimensions();
    let left = rect.x.max(0.0);
    let top = rect.y.max(0.0);
    let right = rect.right().min(dst.0 as f64);
    let bottom = rect.bottom().min(dst.1 as f64);
    if right - left < 1.0 || bottom - top < 1.0 {
        return;
    }

    let (sx, sy, sw, sh) = visible_source(src.dimensions(), rect, dst);
    let mut region = imageops::crop_imm(src, sx, sy, sw, sh).to_image();
    if mirrored {
        // Crops are centred, so mirroring the crop equals cropping the mirror
        imageops::flip_horizontal_in_place(&mut region);
    }

    let out_w = (right - left).round() as u32;
    let out_h = (bottom - top).round() as u32;
    let scaled = imageops::resize(&region, out_w.max(1), out_h.max(1), FilterType::Triangle);
    imageops::overlay(canvas, &scaled, left.round() as i64, top.round() as i64);
}
