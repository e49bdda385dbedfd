use egui::{Pos2, Rect, pos2};
use image::{Rgba, RgbaImage, imageops};
use rayon::prelude::*;

#[cfg(test)]
#[path = "canvas_test.rs"]
mod canvas_test;

/// Default surface dimensions used when the host has nothing persisted.
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 400;

/// Maximum supported surface dimension in pixels (per axis).
/// Prevents memory exhaustion from crafted persisted state.
pub const MAX_CANVAS_DIM: u32 = 16_384;

/// A pixel with zero alpha; what erase and clear leave behind.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// ============================================================================
// SIZE
// ============================================================================

/// Logical dimensions of the drawing surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    /// Build a size, clamping each axis into `1..=MAX_CANVAS_DIM`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.clamp(1, MAX_CANVAS_DIM),
            height: height.clamp(1, MAX_CANVAS_DIM),
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// The surface rectangle in canvas coordinates.
    pub fn bounds(&self) -> Rect {
        Rect::from_min_max(Pos2::ZERO, pos2(self.width as f32, self.height as f32))
    }

    pub fn contains(&self, pos: Pos2) -> bool {
        pos.x >= 0.0 && pos.y >= 0.0 && pos.x < self.width as f32 && pos.y < self.height as f32
    }
}

impl Default for Size {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

// ============================================================================
// BLENDING
// ============================================================================

/// Source-over composite of `top` onto `base`, with `top`'s alpha scaled by
/// `coverage` (0.0..=1.0). Colours are straight (unpremultiplied) RGBA.
#[inline]
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let top_a = (top[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if top_a <= 0.0 {
        return base;
    }
    // Fully opaque top pixel, just overwrite
    if top_a >= 1.0 {
        return Rgba([top[0], top[1], top[2], 255]);
    }

    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return TRANSPARENT;
    }

    let channel = |t: u8, b: u8| -> u8 {
        let v = (t as f32 * top_a + b as f32 * base_a * (1.0 - top_a)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(top[0], base[0]),
        channel(top[1], base[1]),
        channel(top[2], base[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

// ============================================================================
// RASTER SURFACE
// ============================================================================

/// The committed bitmap every tool renders into.
///
/// Dimensions always equal the engine's current [`Size`]; reallocating the
/// surface is the only way to change them.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterSurface {
    pixels: RgbaImage,
}

impl RasterSurface {
    /// Create a fully transparent surface.
    pub fn new(size: Size) -> Self {
        Self {
            pixels: RgbaImage::new(size.width, size.height),
        }
    }

    /// Adopt an already-decoded image as the surface content.
    pub fn from_image(image: RgbaImage) -> Self {
        let size = Size::new(image.width(), image.height());
        if size.width != image.width() || size.height != image.height() {
            log::warn!(
                "RasterSurface::from_image: {}×{} out of range, cropped to {size}",
                image.width(),
                image.height()
            );
            let cropped = imageops::crop_imm(&image, 0, 0, size.width, size.height).to_image();
            return Self { pixels: cropped };
        }
        Self { pixels: image }
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.pixels.width(),
            height: self.pixels.height(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x < self.width() && y < self.height() {
            Some(*self.pixels.get_pixel(x, y))
        } else {
            None
        }
    }

    pub fn contains(&self, pos: Pos2) -> bool {
        self.size().contains(pos)
    }

    /// True when every pixel is fully transparent.
    pub fn is_blank(&self) -> bool {
        self.pixels.as_raw().chunks_exact(4).all(|px| px[3] == 0)
    }

    // ---- whole-surface operations -------------------------------------------

    /// Make every pixel transparent.
    pub fn clear(&mut self) {
        let raw: &mut [u8] = &mut self.pixels;
        raw.fill(0);
    }

    /// Drop the current content and allocate a blank surface of `size`.
    pub fn reallocate(&mut self, size: Size) {
        self.pixels = RgbaImage::new(size.width, size.height);
    }

    /// Replace the content with `image`, adopting its dimensions.
    pub fn restore(&mut self, image: &RgbaImage) {
        if image.dimensions() == self.pixels.dimensions() {
            let raw: &mut [u8] = &mut self.pixels;
            raw.copy_from_slice(image.as_raw());
        } else {
            self.pixels = image.clone();
        }
    }

    /// Composite `src` over the surface, scaled to fill the whole surface.
    pub fn draw_scaled(&mut self, src: &RgbaImage, filter: imageops::FilterType) {
        if src.width() == 0 || src.height() == 0 {
            return;
        }
        let (w, h) = self.pixels.dimensions();
        let scaled;
        let src = if src.dimensions() == (w, h) {
            src
        } else {
            scaled = imageops::resize(src, w, h, filter);
            &scaled
        };

        let row_bytes = w as usize * 4;
        let src_raw = src.as_raw();
        let dst: &mut [u8] = &mut self.pixels;
        dst.par_chunks_exact_mut(row_bytes)
            .zip(src_raw.par_chunks_exact(row_bytes))
            .for_each(|(dst_row, src_row)| {
                for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                    let out = blend_over(
                        Rgba([d[0], d[1], d[2], d[3]]),
                        Rgba([s[0], s[1], s[2], s[3]]),
                        1.0,
                    );
                    d.copy_from_slice(&out.0);
                }
            });
    }

    // ---- painting -----------------------------------------------------------

    /// Blend `color` into the surface through a single-channel coverage mask.
    ///
    /// `coverage` is `w * h` values laid out row-major, positioned with its
    /// top-left corner at `(x0, y0)` in canvas coordinates (may be negative).
    /// Returns `true` when at least one pixel changed.
    pub fn composite_coverage(
        &mut self,
        x0: i32,
        y0: i32,
        w: u32,
        h: u32,
        coverage: &[f32],
        color: Rgba<u8>,
    ) -> bool {
        debug_assert_eq!(coverage.len(), w as usize * h as usize);
        let (sw, sh) = (self.width() as i32, self.height() as i32);
        let row_start = y0.max(0);
        let row_end = (y0 + h as i32).min(sh);
        let col_start = x0.max(0);
        let col_end = (x0 + w as i32).min(sw);
        if row_start >= row_end || col_start >= col_end {
            return false;
        }

        let row_bytes = sw as usize * 4;
        let raw: &mut [u8] = &mut self.pixels;
        let band = &mut raw[row_start as usize * row_bytes..row_end as usize * row_bytes];

        band.par_chunks_exact_mut(row_bytes)
            .enumerate()
            .map(|(i, row)| {
                let gy = row_start + i as i32;
                let cov_row = (gy - y0) as usize * w as usize;
                let mut changed = false;
                for gx in col_start..col_end {
                    let cov = coverage[cov_row + (gx - x0) as usize];
                    if cov <= 0.0 {
                        continue;
                    }
                    let off = gx as usize * 4;
                    let px = &mut row[off..off + 4];
                    let before = Rgba([px[0], px[1], px[2], px[3]]);
                    let after = blend_over(before, color, cov);
                    if after != before {
                        px.copy_from_slice(&after.0);
                        changed = true;
                    }
                }
                changed
            })
            .reduce(|| false, |a, b| a | b)
    }

    /// Source-over blit of an RGBA buffer with its top-left at `(dst_x, dst_y)`.
    /// Returns `true` when at least one pixel changed.
    pub fn blit_rgba(&mut self, dst_x: i32, dst_y: i32, src_w: u32, src_h: u32, data: &[u8]) -> bool {
        debug_assert_eq!(data.len(), src_w as usize * src_h as usize * 4);
        let mut changed = false;
        for sy in 0..src_h {
            let gy = dst_y + sy as i32;
            if gy < 0 || gy >= self.height() as i32 {
                continue;
            }
            for sx in 0..src_w {
                let gx = dst_x + sx as i32;
                if gx < 0 || gx >= self.width() as i32 {
                    continue;
                }
                let off = (sy as usize * src_w as usize + sx as usize) * 4;
                let top = Rgba([data[off], data[off + 1], data[off + 2], data[off + 3]]);
                if top[3] == 0 {
                    continue;
                }
                let px = self.pixels.get_pixel_mut(gx as u32, gy as u32);
                let out = blend_over(*px, top, 1.0);
                if out != *px {
                    *px = out;
                    changed = true;
                }
            }
        }
        changed
    }

    /// Cut a hard-edged transparent disc centred at `center`.
    /// Returns `true` when any non-transparent pixel was removed.
    pub fn erase_disc(&mut self, center: Pos2, radius: f32) -> bool {
        if radius <= 0.0 {
            return false;
        }
        let min_x = ((center.x - radius).floor() as i32).max(0);
        let min_y = ((center.y - radius).floor() as i32).max(0);
        let max_x = ((center.x + radius).ceil() as i32).min(self.width() as i32);
        let max_y = ((center.y + radius).ceil() as i32).min(self.height() as i32);
        let r_sq = radius * radius;

        let mut changed = false;
        for y in min_y..max_y {
            for x in min_x..max_x {
                let dx = x as f32 + 0.5 - center.x;
                let dy = y as f32 + 0.5 - center.y;
                if dx * dx + dy * dy > r_sq {
                    continue;
                }
                let px = self.pixels.get_pixel_mut(x as u32, y as u32);
                if *px != TRANSPARENT {
                    *px = TRANSPARENT;
                    changed = true;
                }
            }
        }
        changed
    }
}
