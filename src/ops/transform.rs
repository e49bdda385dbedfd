use egui::Pos2;
use image::{RgbaImage, imageops};
use serde::{Deserialize, Serialize};

use crate::canvas::{MAX_CANVAS_DIM, RasterSurface, Size};
use crate::components::history::Snapshot;

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;

/// Interpolation method for resize operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl Interpolation {
    pub fn all() -> &'static [Interpolation] {
        &[
            Interpolation::Nearest,
            Interpolation::Bilinear,
            Interpolation::Bicubic,
            Interpolation::Lanczos3,
        ]
    }

    pub fn to_filter(&self) -> imageops::FilterType {
        match self {
            Interpolation::Nearest  => imageops::FilterType::Nearest,
            Interpolation::Bilinear => imageops::FilterType::Triangle,
            Interpolation::Bicubic  => imageops::FilterType::CatmullRom,
            Interpolation::Lanczos3 => imageops::FilterType::Lanczos3,
        }
    }
}

// ---------------------------------------------------------------------------
//  Interactive resize
// ---------------------------------------------------------------------------

/// True when `pos` lies in the square handle zone at the bottom-right corner.
pub fn in_resize_handle(pos: Pos2, size: Size, zone: f32) -> bool {
    let (w, h) = (size.width as f32, size.height as f32);
    pos.x >= w - zone && pos.y >= h - zone && pos.x <= w && pos.y <= h
}

/// Aspect-preserving size for a drag of `(dx, dy)` from `initial`.
///
/// The larger of the two deltas drives the width; the height follows from
/// the initial aspect ratio, rounded to whole pixels. The width is capped so
/// neither axis exceeds `MAX_CANVAS_DIM`.
pub fn constrained_size(initial: Size, aspect: f32, dx: f32, dy: f32, min_width: u32) -> Size {
    let max_dim = MAX_CANVAS_DIM as f32;
    let max_width = max_dim.min((max_dim * aspect).floor()).max(1.0);
    let delta = dx.max(dy);
    let width = (initial.width as f32 + delta)
        .round()
        .max(min_width as f32)
        .clamp(1.0, max_width);
    let height = (width / aspect).round().clamp(1.0, max_dim);
    Size::new(width as u32, height as u32)
}

/// State captured when a resize drag starts.
#[derive(Clone, Debug)]
pub struct ResizeGesture {
    origin: Pos2,
    initial: Size,
    aspect: f32,
    min_width: u32,
    snapshot: Snapshot,
    last_applied: Size,
    last_computed: Size,
}

impl ResizeGesture {
    pub fn begin(origin: Pos2, surface: &RasterSurface, min_width: u32) -> Self {
        let initial = surface.size();
        Self {
            origin,
            initial,
            aspect: initial.aspect_ratio(),
            min_width,
            snapshot: Snapshot::capture(surface),
            last_applied: initial,
            last_computed: initial,
        }
    }

    pub fn initial(&self) -> Size {
        self.initial
    }

    /// The pre-gesture raster every redraw scales from.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn last_computed(&self) -> Size {
        self.last_computed
    }

    pub fn last_applied(&self) -> Size {
        self.last_applied
    }

    /// Track the pointer. Returns the size to redraw at when it moved more
    /// than one pixel away from the last applied size.
    pub fn update(&mut self, pointer: Pos2) -> Option<Size> {
        let d = pointer - self.origin;
        let size = constrained_size(self.initial, self.aspect, d.x, d.y, self.min_width);
        self.last_computed = size;
        let dw = size.width.abs_diff(self.last_applied.width);
        let dh = size.height.abs_diff(self.last_applied.height);
        (dw > 1 || dh > 1).then_some(size)
    }

    pub fn mark_applied(&mut self, size: Size) {
        self.last_applied = size;
    }
}

/// Rebuild `surface` at `size`: cleared, then `background` scaled to fill,
/// then `content` scaled on top.
pub fn recomposite(
    surface: &mut RasterSurface,
    size: Size,
    background: Option<&RgbaImage>,
    content: &RgbaImage,
    interp: Interpolation,
) {
    let filter = interp.to_filter();
    surface.reallocate(size);
    if let Some(bg) = background {
        surface.draw_scaled(bg, filter);
    }
    surface.draw_scaled(content, filter);
}
