use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};
use egui::{Color32, Pos2, Vec2, vec2};
use std::collections::HashMap;

use crate::canvas::RasterSurface;

#[cfg(test)]
#[path = "text_test.rs"]
mod text_test;

/// Cache for rasterized glyph pixel data. Key: (GlyphId, font_size_bits).
/// Value: (pixels as (u32, u32, f32), bounds_min_x_at_origin_zero, bounds_min_y_at_origin_zero).
pub type GlyphPixelCache = HashMap<(GlyphId, u32), (Vec<(u32, u32, f32)>, f32, f32)>;

/// Entries kept before the glyph cache is dropped. Font-size drags cache a
/// fresh set of glyphs per size.
const GLYPH_CACHE_LIMIT: usize = 2048;

/// Horizontal advance of a block glyph, as a fraction of the font size.
const BLOCK_ADVANCE: f32 = 0.6;
/// Block glyph ascent, as a fraction of the font size.
const BLOCK_ASCENT: f32 = 0.8;

/// Where glyph shapes come from.
enum Face {
    Font(FontArc),
    /// Built-in face drawing every visible character as a solid box. Used
    /// when no system font can be loaded, and by tests.
    Blocks,
}

/// Result of rasterizing a text run.
pub struct RasterizedText {
    pub buf: Vec<u8>,
    pub buf_w: u32,
    pub buf_h: u32,
    pub off_x: i32,
    pub off_y: i32,
}

impl RasterizedText {
    fn empty() -> Self {
        Self {
            buf: Vec::new(),
            buf_w: 0,
            buf_h: 0,
            off_x: 0,
            off_y: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buf_w == 0 || self.buf_h == 0
    }
}

/// Vertical metrics for one font size.
#[derive(Clone, Copy, Debug)]
struct LineMetrics {
    ascent: f32,
    line_height: f32,
}

/// Lays out and rasterizes multi-line text with a single face.
pub struct TextRenderer {
    face: Face,
    glyph_cache: GlyphPixelCache,
    coverage_buf: Vec<f32>,
}

impl TextRenderer {
    pub fn from_font(font: FontArc) -> Self {
        Self {
            face: Face::Font(font),
            glyph_cache: HashMap::new(),
            coverage_buf: Vec::new(),
        }
    }

    pub fn blocks() -> Self {
        Self {
            face: Face::Blocks,
            glyph_cache: HashMap::new(),
            coverage_buf: Vec::new(),
        }
    }

    /// Resolve `family` through the system font source, falling back to any
    /// sans-serif face and finally to block glyphs. An empty family selects
    /// block glyphs directly.
    pub fn system(family: &str) -> Self {
        if family.trim().is_empty() {
            return Self::blocks();
        }
        if let Some(font) = load_system_font(family, 400, false) {
            log::debug!("Loaded system font '{family}'");
            return Self::from_font(font);
        }
        if let Some(font) = load_sans_serif() {
            log::info!("Font '{family}' not found, using default sans-serif");
            return Self::from_font(font);
        }
        log::warn!("No system fonts available, text renders as block glyphs");
        Self::blocks()
    }

    pub fn is_blocks(&self) -> bool {
        matches!(self.face, Face::Blocks)
    }

    pub fn clear_glyph_cache(&mut self) {
        self.glyph_cache.clear();
    }

    pub fn cached_glyphs(&self) -> usize {
        self.glyph_cache.len()
    }

    fn metrics(&self, font_size: f32) -> LineMetrics {
        match &self.face {
            Face::Font(font) => {
                let scaled = font.as_scaled(font_size);
                LineMetrics {
                    ascent: scaled.ascent(),
                    line_height: scaled.height(),
                }
            }
            Face::Blocks => LineMetrics {
                ascent: font_size * BLOCK_ASCENT,
                line_height: font_size,
            },
        }
    }

    fn line_width(&self, line: &str, font_size: f32) -> f32 {
        match &self.face {
            Face::Font(font) => layout_line(font, line, font_size)
                .last()
                .map_or(0.0, |&(id, x)| x + font.as_scaled(font_size).h_advance(id)),
            Face::Blocks => line.chars().count() as f32 * font_size * BLOCK_ADVANCE,
        }
    }

    /// Size of the box `text` occupies when drawn with its top-left at the
    /// origin. Lines are separated by `'\n'`.
    pub fn measure(&self, text: &str, font_size: f32) -> Vec2 {
        let metrics = self.metrics(font_size);
        let mut width = 0.0f32;
        let mut lines = 0;
        for line in text.split('\n') {
            width = width.max(self.line_width(line, font_size));
            lines += 1;
        }
        vec2(width, lines as f32 * metrics.line_height)
    }

    /// Rasterize `text` with its top-left corner at `top_left` (canvas
    /// coordinates) into an RGBA buffer clipped to the canvas.
    pub fn rasterize(
        &mut self,
        text: &str,
        font_size: f32,
        top_left: Pos2,
        color: Color32,
        canvas_w: u32,
        canvas_h: u32,
    ) -> RasterizedText {
        if font_size <= 0.0 || text.trim().is_empty() {
            return RasterizedText::empty();
        }
        let metrics = self.metrics(font_size);
        let extent = self.measure(text, font_size);

        // Pad for glyph overhang
        let pad = (font_size * 0.25).ceil() + 2.0;
        let x0 = ((top_left.x - pad).floor() as i32).max(0);
        let y0 = ((top_left.y - pad).floor() as i32).max(0);
        let x1 = ((top_left.x + extent.x + pad).ceil() as i32).min(canvas_w as i32);
        let y1 = ((top_left.y + extent.y + pad).ceil() as i32).min(canvas_h as i32);
        if x1 <= x0 || y1 <= y0 {
            return RasterizedText::empty();
        }
        let buf_w = (x1 - x0) as u32;
        let buf_h = (y1 - y0) as u32;

        let needed = buf_w as usize * buf_h as usize;
        if self.glyph_cache.len() > GLYPH_CACHE_LIMIT {
            self.glyph_cache.clear();
        }
        let mut coverage = std::mem::take(&mut self.coverage_buf);
        coverage.clear();
        coverage.resize(needed, 0.0);

        for (line_idx, line) in text.split('\n').enumerate() {
            let baseline = point(
                top_left.x,
                top_left.y + metrics.ascent + line_idx as f32 * metrics.line_height,
            );
            let clip = Clip {
                x0,
                y0,
                w: buf_w,
                h: buf_h,
            };
            match &self.face {
                Face::Font(font) => rasterize_font_line(
                    font,
                    line,
                    font_size,
                    baseline,
                    clip,
                    &mut coverage,
                    &mut self.glyph_cache,
                ),
                Face::Blocks => rasterize_block_line(line, font_size, baseline, clip, &mut coverage),
            }
        }

        let [r, g, b, a] = color.to_srgba_unmultiplied();
        let mut buf = vec![0u8; needed * 4];
        for (i, &cov) in coverage.iter().enumerate() {
            if cov > 0.001 {
                let idx = i * 4;
                buf[idx] = r;
                buf[idx + 1] = g;
                buf[idx + 2] = b;
                buf[idx + 3] = (a as f32 * cov).round().min(255.0) as u8;
            }
        }
        self.coverage_buf = coverage;

        RasterizedText {
            buf,
            buf_w,
            buf_h,
            off_x: x0,
            off_y: y0,
        }
    }

    /// Rasterize `text` and composite it onto `surface`.
    /// Returns `true` when any pixel changed.
    pub fn draw(
        &mut self,
        surface: &mut RasterSurface,
        text: &str,
        font_size: f32,
        top_left: Pos2,
        color: Color32,
    ) -> bool {
        let (w, h) = (surface.width(), surface.height());
        let raster = self.rasterize(text, font_size, top_left, color, w, h);
        if raster.is_empty() {
            return false;
        }
        surface.blit_rgba(raster.off_x, raster.off_y, raster.buf_w, raster.buf_h, &raster.buf)
    }
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let face = match self.face {
            Face::Font(_) => "font",
            Face::Blocks => "blocks",
        };
        f.debug_struct("TextRenderer").field("face", &face).finish()
    }
}

/// Destination window of a coverage buffer in canvas coordinates.
#[derive(Clone, Copy)]
struct Clip {
    x0: i32,
    y0: i32,
    w: u32,
    h: u32,
}

impl Clip {
    #[inline]
    fn index(&self, cx: i32, cy: i32) -> Option<usize> {
        let ix = cx - self.x0;
        let iy = cy - self.y0;
        if ix >= 0 && iy >= 0 && (ix as u32) < self.w && (iy as u32) < self.h {
            Some(iy as usize * self.w as usize + ix as usize)
        } else {
            None
        }
    }
}

/// Glyph ids and pen x positions for one line, starting at x = 0.
fn layout_line(font: &FontArc, line: &str, font_size: f32) -> Vec<(GlyphId, f32)> {
    let scaled = font.as_scaled(font_size);
    let mut glyphs = Vec::with_capacity(line.len());
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;
    for ch in line.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }
    glyphs
}

fn rasterize_font_line(
    font: &FontArc,
    line: &str,
    font_size: f32,
    baseline: ab_glyph::Point,
    clip: Clip,
    coverage: &mut [f32],
    glyph_cache: &mut GlyphPixelCache,
) {
    let font_size_key = font_size.to_bits();
    for (glyph_id, gx) in layout_line(font, line, font_size) {
        let cache_key = (glyph_id, font_size_key);
        // Glyphs are cached at the origin and shifted into place
        let (pixels, base_bx, base_by) = glyph_cache.entry(cache_key).or_insert_with(|| {
            let base_glyph = glyph_id.with_scale_and_position(font_size, point(0.0, 0.0));
            let mut px_list = Vec::new();
            match font.outline_glyph(base_glyph) {
                Some(outlined) => {
                    let b = outlined.px_bounds();
                    outlined.draw(|px, py, cov| px_list.push((px, py, cov)));
                    (px_list, b.min.x, b.min.y)
                }
                None => (px_list, 0.0, 0.0),
            }
        });

        let bx = *base_bx + baseline.x + gx.round();
        let by = *base_by + baseline.y;
        for &(px, py, cov) in pixels.iter() {
            let cx = (px as f32 + bx).round() as i32;
            let cy = (py as f32 + by).round() as i32;
            if let Some(idx) = clip.index(cx, cy) {
                coverage[idx] = coverage[idx].max(cov);
            }
        }
    }
}

fn rasterize_block_line(
    line: &str,
    font_size: f32,
    baseline: ab_glyph::Point,
    clip: Clip,
    coverage: &mut [f32],
) {
    let advance = font_size * BLOCK_ADVANCE;
    let inset = font_size * 0.05;
    let top = baseline.y - font_size * 0.7;
    for (i, ch) in line.chars().enumerate() {
        if ch.is_whitespace() {
            continue;
        }
        let left = baseline.x + i as f32 * advance + inset;
        let right = left + advance - 2.0 * inset;
        let (ix0, ix1) = (left.round() as i32, right.round() as i32);
        let (iy0, iy1) = (top.round() as i32, baseline.y.round() as i32);
        for cy in iy0..iy1 {
            for cx in ix0..ix1 {
                if let Some(idx) = clip.index(cx, cy) {
                    coverage[idx] = 1.0;
                }
            }
        }
    }
}

// ============================================================================
// System fonts
// ============================================================================

/// Load a font by family name, weight, and style from the system.
/// `weight` is a CSS-style weight value (100=Thin, 400=Regular, 700=Bold, etc.)
/// Returns None if the font cannot be found.
pub fn load_system_font(family: &str, weight: u16, italic: bool) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    select_font(&[FamilyName::Title(family.to_string())], weight, italic)
}

fn load_sans_serif() -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    select_font(&[FamilyName::SansSerif], 400, false)
}

fn select_font(
    families: &[font_kit::family_name::FamilyName],
    weight: u16,
    italic: bool,
) -> Option<FontArc> {
    use font_kit::properties::{Properties, Style, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight(weight as f32);
    if italic {
        props.style = Style::Italic;
    }

    let handle = SystemSource::new().select_best_match(families, &props).ok()?;
    let font_data = handle.load().ok()?;
    let bytes: Vec<u8> = (*font_data.copy_font_data()?).clone();
    FontArc::try_from_vec(bytes).ok()
}

/// Enumerate system font families, sorted and deduplicated.
pub fn enumerate_system_fonts() -> Vec<String> {
    match font_kit::source::SystemSource::new().all_families() {
        Ok(mut families) => {
            families.sort();
            families.dedup();
            families
        }
        Err(e) => {
            log::warn!("Font enumeration failed: {e}");
            Vec::new()
        }
    }
}
