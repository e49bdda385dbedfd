use super::*;
use crate::canvas::Size;
use egui::pos2;

#[test]
fn empty_family_selects_block_glyphs() {
    assert!(TextRenderer::system("").is_blocks());
}

#[test]
fn block_measure_counts_chars_and_lines() {
    let r = TextRenderer::blocks();
    let size = r.measure("abcd\nab", 20.0);
    assert_eq!(size, vec2(48.0, 40.0));
}

#[test]
fn whitespace_only_text_rasterizes_to_nothing() {
    let mut r = TextRenderer::blocks();
    let out = r.rasterize("   ", 20.0, pos2(10.0, 10.0), Color32::BLACK, 100, 100);
    assert!(out.is_empty());
}

#[test]
fn block_glyphs_land_below_top_left() {
    let mut surface = RasterSurface::new(Size::new(200, 100));
    let mut r = TextRenderer::blocks();
    assert!(r.draw(&mut surface, "hi", 20.0, pos2(100.0, 50.0), Color32::BLACK));
    // First glyph box spans x 101..111, y 52..66
    assert_eq!(surface.pixel(105, 60).map(|p| p[3]), Some(255));
    assert_eq!(surface.pixel(105, 45).map(|p| p[3]), Some(0));
    assert_eq!(surface.pixel(95, 60).map(|p| p[3]), Some(0));
}

#[test]
fn text_outside_canvas_is_clipped_away() {
    let mut r = TextRenderer::blocks();
    let out = r.rasterize("hi", 20.0, pos2(500.0, 500.0), Color32::BLACK, 100, 100);
    assert!(out.is_empty());
}

#[test]
fn rasterized_buffer_uses_requested_colour() {
    let mut r = TextRenderer::blocks();
    let red = Color32::from_rgb(200, 10, 10);
    let out = r.rasterize("x", 20.0, pos2(10.0, 10.0), red, 100, 100);
    assert!(!out.is_empty());
    let opaque = out
        .buf
        .chunks_exact(4)
        .find(|px| px[3] == 255)
        .map(|px| [px[0], px[1], px[2]]);
    assert_eq!(opaque, Some([200, 10, 10]));
}

#[test]
fn glyph_cache_stays_bounded_across_sizes() {
    let Some(font) = load_sans_serif() else {
        return;
    };
    let mut r = TextRenderer::from_font(font);
    for size in 12..=400 {
        r.rasterize("abcdefghij", size as f32, pos2(0.0, 0.0), Color32::BLACK, 4000, 1000);
        assert!(r.cached_glyphs() <= GLYPH_CACHE_LIMIT + 10);
    }
    assert!(r.cached_glyphs() > 0);
    r.clear_glyph_cache();
    assert_eq!(r.cached_glyphs(), 0);
}
