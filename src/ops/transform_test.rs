use super::*;
use egui::pos2;
use image::Rgba;

#[test]
fn wider_delta_drives_resize() {
    let s = constrained_size(Size::new(800, 400), 2.0, 50.0, 10.0, 200);
    assert_eq!(s, Size::new(850, 425));
}

#[test]
fn vertical_delta_wins_when_larger() {
    let s = constrained_size(Size::new(800, 400), 2.0, 5.0, 100.0, 200);
    assert_eq!(s, Size::new(900, 450));
}

#[test]
fn shrink_stops_at_min_width() {
    let s = constrained_size(Size::new(800, 400), 2.0, -1000.0, -1000.0, 200);
    assert_eq!(s, Size::new(200, 100));
}

#[test]
fn huge_drag_caps_width_and_keeps_aspect() {
    let wide = constrained_size(Size::new(800, 400), 2.0, 20_000.0, 0.0, 200);
    assert_eq!(wide, Size::new(MAX_CANVAS_DIM, MAX_CANVAS_DIM / 2));

    // Tall surfaces hit the height limit first.
    let tall = constrained_size(Size::new(400, 800), 0.5, 0.0, 50_000.0, 200);
    assert_eq!(tall, Size::new(MAX_CANVAS_DIM / 2, MAX_CANVAS_DIM));
}

#[test]
fn aspect_ratio_holds_within_rounding() {
    let initial = Size::new(640, 360);
    let aspect = initial.aspect_ratio();
    for d in [-300.0f32, -41.0, -7.0, 0.0, 3.0, 17.0, 123.0, 999.0] {
        let s = constrained_size(initial, aspect, d, d * 0.5, 100);
        let expected_h = s.width as f32 / aspect;
        assert!((s.height as f32 - expected_h).abs() <= 0.5, "{s} for delta {d}");
    }
}

#[test]
fn update_throttles_sub_pixel_moves() {
    let surface = RasterSurface::new(Size::new(100, 50));
    let mut g = ResizeGesture::begin(pos2(100.0, 50.0), &surface, 20);
    assert_eq!(g.update(pos2(101.0, 50.0)), None);
    assert_eq!(g.last_computed(), Size::new(101, 51));

    let next = g.update(pos2(110.0, 50.0));
    assert_eq!(next, Some(Size::new(110, 55)));
    g.mark_applied(Size::new(110, 55));
    assert_eq!(g.update(pos2(111.0, 50.0)), None);
    assert_eq!(g.last_applied(), Size::new(110, 55));
}

#[test]
fn handle_zone_is_bottom_right_square() {
    let size = Size::new(800, 400);
    assert!(in_resize_handle(pos2(795.0, 395.0), size, 16.0));
    assert!(!in_resize_handle(pos2(700.0, 395.0), size, 16.0));
    assert!(!in_resize_handle(pos2(795.0, 300.0), size, 16.0));
    assert!(!in_resize_handle(pos2(810.0, 395.0), size, 16.0));
}

#[test]
fn recomposite_layers_content_over_background() {
    let mut surface = RasterSurface::new(Size::new(4, 4));
    let bg = RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255]));
    let mut content = RgbaImage::new(4, 4);
    content.put_pixel(0, 0, Rgba([255, 0, 0, 255]));

    recomposite(&mut surface, Size::new(8, 8), Some(&bg), &content, Interpolation::Nearest);

    assert_eq!(surface.size(), Size::new(8, 8));
    assert_eq!(surface.pixel(0, 0), Some(Rgba([255, 0, 0, 255])));
    assert_eq!(surface.pixel(7, 7), Some(Rgba([0, 255, 0, 255])));
}

#[test]
fn interpolation_parses_lowercase() {
    let i: Interpolation = serde_json::from_str("\"lanczos3\"").unwrap();
    assert_eq!(i, Interpolation::Lanczos3);
}
