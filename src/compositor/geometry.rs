/// Destination rectangle of a layer in canvas coordinates.
///
/// May extend past the canvas (negative origin) when the layer is cropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DrawRect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width < 1.0 || self.height < 1.0
    }

    fn empty_at_center(dst: (u32, u32)) -> Self {
        Self {
            x: dst.0 as f64 / 2.0,
            y: dst.1 as f64 / 2.0,
            width: 0.0,
            height: 0.0,
        }
    }
}

/// Scale `src` to completely fill `dst`, cropping the overflow, centred
pub fn cover_rect(src: (u32, u32), dst: (u32, u32)) -> DrawRect {
    if src.0 == 0 || src.1 == 0 {
        return DrawRect::empty_at_center(dst);
    }

    let (sw, sh) = (src.0 as f64, src.1 as f64);
    let (dw, dh) = (dst.0 as f64, dst.1 as f64);
    let src_aspect = sw / sh;

    if src_aspect > dw / dh {
        // Source is wider: match heights, crop left and right
        let width = dh * src_aspect;
        DrawRect {
            x: (dw - width) / 2.0,
            y: 0.0,
            width,
            height: dh,
        }
    } else {
        let height = dw / src_aspect;
        DrawRect {
            x: 0.0,
            y: (dh - height) / 2.0,
            width: dw,
            height,
        }
    }
}

/// Scale `src` to fit entirely inside `dst`, leaving bars as needed, centred
pub fn contain_rect(src: (u32, u32), dst: (u32, u32)) -> DrawRect {
    if src.0 == 0 || src.1 == 0 {
        return DrawRect::empty_at_center(dst);
    }

    let (sw, sh) = (src.0 as f64, src.1 as f64);
    let (dw, dh) = (dst.0 as f64, dst.1 as f64);
    let src_aspect = sw / sh;

    if src_aspect > dw / dh {
        // Source is wider: match widths, bars above and below
        let height = dw / src_aspect;
        DrawRect {
            x: 0.0,
            y: (dh - height) / 2.0,
            width: dw,
            height,
        }
    } else {
        let width = dh * src_aspect;
        DrawRect {
            x: (dw - width) / 2.0,
            y: 0.0,
            width,
            height: dh,
        }
    }
}

/// The part of `src` that lands inside `dst` when drawn at `rect`, as
/// (x, y, width, height) in source pixels
pub(crate) fn visible_source(src: (u32, u32), rect: &DrawRect, dst: (u32, u32)) -> (u32, u32, u32, u32) {
    let scale_x = rect.width / src.0 as f64;
    let scale_y = rect.height / src.1 as f64;

    let left = rect.x.max(0.0);
    let top = rect.y.max(0.0);
    let right = rect.right().min(dst.0 as f64);
    let bottom = rect.bottom().min(dst.1 as f64);

    let sx = ((left - rect.x) / scale_x).round() as u32;
    let sy = ((top - rect.y) / scale_y).round() as u32;
    let sw = ((right - left) / scale_x).round() as u32;
    let sh = ((bottom - top) / scale_y).round() as u32;

    let sx = sx.min(src.0.saturating_sub(1));
    let sy = sy.min(src.1.saturating_sub(1));
    (
        sx,
        sy,
        sw.clamp(1, (src.0 - sx).max(1)),
        sh.clamp(1, (src.1 - sy).max(1)),
    )
}
