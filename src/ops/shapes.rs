use egui::{Color32, Pos2, Rect, pos2, vec2};
use image::Rgba;
use rayon::prelude::*;

use crate::canvas::RasterSurface;

#[cfg(test)]
#[path = "shapes_test.rs"]
mod shapes_test;

/// Half-angle between the arrow shaft and each side of the head.
pub const ARROW_HEAD_HALF_ANGLE: f32 = std::f32::consts::FRAC_PI_6;
/// Head leg length as a multiple of the stroke width.
pub const ARROW_HEAD_LENGTH_FACTOR: f32 = 4.0;

/// Shapes drawn by dragging from a start point to the current pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Line,
    Arrow,
    Rect,
    Ellipse,
}

impl ShapeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ShapeKind::Line => "Line",
            ShapeKind::Arrow => "Arrow",
            ShapeKind::Rect => "Rectangle",
            ShapeKind::Ellipse => "Ellipse",
        }
    }
}

/// Colour and width shared by pen strokes and shape outlines.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    pub color: Color32,
    pub width: f32,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: Color32::BLACK,
            width: 2.0,
        }
    }
}

impl StrokeStyle {
    fn rgba(&self) -> Rgba<u8> {
        Rgba(self.color.to_srgba_unmultiplied())
    }

    fn half_width(&self) -> f32 {
        self.width.max(0.0) * 0.5
    }
}

// ============================================================================
// SDF functions: return signed distance (negative = inside)
// ============================================================================

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// SDF for an ellipse centred at origin (approximation).
#[inline]
fn sdf_ellipse(px: f32, py: f32, rx: f32, ry: f32) -> f32 {
    let nx = px / rx;
    let ny = py / ry;
    let len = (nx * nx + ny * ny).sqrt();
    if len < 1e-8 {
        return -rx.min(ry);
    }
    // Gradient length of the implicit function, used to rescale to pixels
    let scale = (rx * rx * ny * ny + ry * ry * nx * nx).sqrt() / (rx * ry * len);
    (len - 1.0) / scale
}

/// Unsigned distance to the segment a→b. Collapses to point distance when
/// the segment has no length.
#[inline]
fn sdf_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq < 1e-12 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

/// Signed distance to a convex polygon (either winding).
fn sdf_convex_polygon(verts: &[Pos2], px: f32, py: f32) -> f32 {
    let n = verts.len();
    let mut d = (px - verts[0].x) * (px - verts[0].x) + (py - verts[0].y) * (py - verts[0].y);
    let mut s: f32 = 1.0;
    let mut j = n - 1;
    for i in 0..n {
        let ex = verts[j].x - verts[i].x;
        let ey = verts[j].y - verts[i].y;
        let wx = px - verts[i].x;
        let wy = py - verts[i].y;
        let e_sq = ex * ex + ey * ey;
        let t = if e_sq < 1e-12 {
            0.0
        } else {
            ((wx * ex + wy * ey) / e_sq).clamp(0.0, 1.0)
        };
        let bx = wx - ex * t;
        let by = wy - ey * t;
        d = d.min(bx * bx + by * by);
        // Crossing test
        let c1 = py >= verts[i].y;
        let c2 = py < verts[j].y;
        let c3 = ex * wy > ey * wx;
        if (c1 && c2 && c3) || (!c1 && !c2 && !c3) {
            s = -s;
        }
        j = i;
    }
    s * d.sqrt()
}

/// Smoothstep between edge0 and edge1.
#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

// ============================================================================
// Coverage rasterizer
// ============================================================================

/// Evaluate `sdf` at every pixel centre inside `bounds` (clamped to the
/// surface) and composite `color` with anti-aliased coverage.
///
/// Returns `true` when any surface pixel changed.
fn fill_sdf<F>(surface: &mut RasterSurface, bounds: Rect, color: Rgba<u8>, sdf: F) -> bool
where
    F: Fn(f32, f32) -> f32 + Sync,
{
    let x0 = (bounds.min.x.floor() as i32).max(0);
    let y0 = (bounds.min.y.floor() as i32).max(0);
    let x1 = (bounds.max.x.ceil() as i32).min(surface.width() as i32);
    let y1 = (bounds.max.y.ceil() as i32).min(surface.height() as i32);
    if x1 <= x0 || y1 <= y0 {
        return false;
    }
    let buf_w = (x1 - x0) as u32;
    let buf_h = (y1 - y0) as u32;

    let mut coverage = vec![0.0f32; buf_w as usize * buf_h as usize];
    coverage
        .par_chunks_mut(buf_w as usize)
        .enumerate()
        .for_each(|(row, cov_row)| {
            let py = (y0 + row as i32) as f32 + 0.5;
            for (col, c) in cov_row.iter_mut().enumerate() {
                let px = (x0 + col as i32) as f32 + 0.5;
                let cov = smoothstep(0.5, -0.5, sdf(px, py));
                if cov > 0.001 {
                    *c = cov;
                }
            }
        });

    surface.composite_coverage(x0, y0, buf_w, buf_h, &coverage, color)
}

/// Padded bounding rectangle around a set of points.
fn padded_bounds(points: &[Pos2], pad: f32) -> Rect {
    Rect::from_points(points).expand(pad + 1.0)
}

// ============================================================================
// Public drawing entry points
// ============================================================================

/// Paint a round-capped segment `from → to`. A zero-length segment paints a
/// round dot.
pub fn draw_segment(surface: &mut RasterSurface, from: Pos2, to: Pos2, style: &StrokeStyle) -> bool {
    let hw = style.half_width();
    if hw <= 0.0 {
        return false;
    }
    let bounds = padded_bounds(&[from, to], hw);
    fill_sdf(surface, bounds, style.rgba(), |px, py| {
        sdf_line_segment(px, py, from.x, from.y, to.x, to.y) - hw
    })
}

/// Paint the outline of the axis-aligned rectangle spanning `a` and `b`.
pub fn draw_rect_outline(surface: &mut RasterSurface, a: Pos2, b: Pos2, style: &StrokeStyle) -> bool {
    let hw = style.half_width();
    let rect = Rect::from_two_pos(a, b);
    if hw <= 0.0 || (rect.width() < 1e-3 && rect.height() < 1e-3) {
        return false;
    }
    let c = rect.center();
    let (hx, hy) = (rect.width() * 0.5, rect.height() * 0.5);
    fill_sdf(surface, rect.expand(hw + 1.0), style.rgba(), |px, py| {
        sdf_box(px - c.x, py - c.y, hx, hy).abs() - hw
    })
}

/// Centre and radii of the ellipse inscribed in the box spanning `a` and `b`.
pub fn ellipse_params(a: Pos2, b: Pos2) -> (Pos2, f32, f32) {
    let center = pos2((a.x + b.x) * 0.5, (a.y + b.y) * 0.5);
    let rx = (b.x - a.x).abs() * 0.5;
    let ry = (b.y - a.y).abs() * 0.5;
    (center, rx, ry)
}

/// Paint the outline of the ellipse inscribed in the box spanning `a` and `b`.
pub fn draw_ellipse_outline(
    surface: &mut RasterSurface,
    a: Pos2,
    b: Pos2,
    style: &StrokeStyle,
) -> bool {
    let hw = style.half_width();
    if hw <= 0.0 {
        return false;
    }
    let (c, rx, ry) = ellipse_params(a, b);
    match (rx < 1e-3, ry < 1e-3) {
        (true, true) => false,
        // Flat ellipse degenerates into a line across its long axis
        (true, false) => draw_segment(surface, pos2(c.x, c.y - ry), pos2(c.x, c.y + ry), style),
        (false, true) => draw_segment(surface, pos2(c.x - rx, c.y), pos2(c.x + rx, c.y), style),
        (false, false) => {
            let bounds = Rect::from_center_size(c, vec2(rx * 2.0, ry * 2.0)).expand(hw + 1.0);
            fill_sdf(surface, bounds, style.rgba(), |px, py| {
                sdf_ellipse(px - c.x, py - c.y, rx, ry).abs() - hw
            })
        }
    }
}

/// Triangle vertices of an arrow head for the shaft `from → to`: the apex sits
/// on `to`, each leg is `4 × width` long at 30° either side of the shaft.
///
/// Returns `None` for a zero-length shaft, which has no direction.
pub fn arrow_head(from: Pos2, to: Pos2, width: f32) -> Option<[Pos2; 3]> {
    let dir = to - from;
    let len = dir.length();
    if len < 1e-3 {
        return None;
    }
    let back = -dir / len;
    let leg = ARROW_HEAD_LENGTH_FACTOR * width.max(0.0);
    let (sin, cos) = ARROW_HEAD_HALF_ANGLE.sin_cos();
    let left = vec2(back.x * cos - back.y * sin, back.x * sin + back.y * cos);
    let right = vec2(back.x * cos + back.y * sin, -back.x * sin + back.y * cos);
    Some([to, to + left * leg, to + right * leg])
}

/// Paint an arrow: shaft stroked at the style width plus a filled head
/// outlined at half the width.
pub fn draw_arrow(surface: &mut RasterSurface, from: Pos2, to: Pos2, style: &StrokeStyle) -> bool {
    let hw = style.half_width();
    if hw <= 0.0 {
        return false;
    }
    let Some(head) = arrow_head(from, to, style.width) else {
        return draw_segment(surface, from, to, style);
    };
    let head_outline = hw * 0.5;
    let bounds = padded_bounds(&[from, to, head[1], head[2]], hw);
    fill_sdf(surface, bounds, style.rgba(), |px, py| {
        let shaft = sdf_line_segment(px, py, from.x, from.y, to.x, to.y) - hw;
        let tri = sdf_convex_polygon(&head, px, py);
        let outline = tri.abs() - head_outline;
        shaft.min(tri).min(outline)
    })
}

/// Paint `kind` spanning `start → end`.
pub fn draw_shape(
    surface: &mut RasterSurface,
    kind: ShapeKind,
    start: Pos2,
    end: Pos2,
    style: &StrokeStyle,
) -> bool {
    match kind {
        ShapeKind::Line => draw_segment(surface, start, end, style),
        ShapeKind::Arrow => draw_arrow(surface, start, end, style),
        ShapeKind::Rect => draw_rect_outline(surface, start, end, style),
        ShapeKind::Ellipse => draw_ellipse_outline(surface, start, end, style),
    }
}
