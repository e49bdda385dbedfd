use super::*;
use crate::canvas::Size;
use egui::pos2;
use image::{Rgba, RgbaImage};

fn props() -> ToolProperties {
    ToolProperties {
        color: Color32::from_rgb(0, 0, 255),
        width: 4.0,
        font_size: 18.0,
    }
}

#[test]
fn tool_names_round_trip() {
    for tool in Tool::all() {
        assert_eq!(Tool::from_name(tool.name()), Some(*tool));
    }
    assert_eq!(Tool::from_name(" Rectangle "), Some(Tool::Rect));
    assert_eq!(Tool::from_name("brush"), None);
}

#[test]
fn kind_carries_only_relevant_parameters() {
    let p = props();
    assert_eq!(p.kind_for(Tool::Eraser), ToolKind::Eraser { width: 4.0 });
    assert_eq!(
        p.kind_for(Tool::Text),
        ToolKind::Text {
            color: p.color,
            font_size: 18.0
        }
    );
    for tool in Tool::all() {
        assert_eq!(p.kind_for(*tool).tool(), *tool);
    }
}

#[test]
fn pen_paints_only_on_update() {
    let mut surface = RasterSurface::new(Size::new(100, 100));
    let mut stroke = Stroke::begin(props().kind_for(Tool::Pen), pos2(10.0, 10.0));
    assert!(surface.is_blank());
    assert!(!stroke.did_paint);

    stroke.update(pos2(50.0, 50.0), &mut surface, None);
    assert!(stroke.did_paint);
    assert_eq!(stroke.last, pos2(10.0, 10.0));
    assert_eq!(surface.pixel(30, 30), Some(Rgba([0, 0, 255, 255])));
}

#[test]
fn eraser_radius_is_twice_width() {
    let mut surface = RasterSurface::from_image(RgbaImage::from_pixel(40, 40, Rgba([9, 9, 9, 255])));
    let mut stroke = Stroke::begin(props().kind_for(Tool::Eraser), pos2(20.0, 20.0));
    stroke.update(pos2(20.0, 20.0), &mut surface, None);
    assert!(stroke.did_paint);
    // 7.5px away: inside radius 8
    assert_eq!(surface.pixel(27, 19).map(|p| p[3]), Some(0));
    // 9.5px away: outside
    assert_eq!(surface.pixel(29, 19).map(|p| p[3]), Some(255));
}

#[test]
fn eraser_on_blank_surface_does_not_paint() {
    let mut surface = RasterSurface::new(Size::new(40, 40));
    let mut stroke = Stroke::begin(props().kind_for(Tool::Eraser), pos2(20.0, 20.0));
    stroke.update(pos2(22.0, 20.0), &mut surface, None);
    assert!(!stroke.did_paint);
}

#[test]
fn shape_preview_shows_only_latest_outline() {
    let mut surface = RasterSurface::new(Size::new(100, 100));
    let baseline = Snapshot::capture(&surface);
    let mut stroke = Stroke::begin(props().kind_for(Tool::Line), pos2(10.0, 10.0));

    stroke.update(pos2(90.0, 10.0), &mut surface, Some(&baseline));
    assert!(surface.pixel(50, 10).map_or(false, |p| p[3] > 0));

    stroke.update(pos2(10.0, 90.0), &mut surface, Some(&baseline));
    assert_eq!(surface.pixel(50, 10).map(|p| p[3]), Some(0));
    assert!(surface.pixel(10, 50).map_or(false, |p| p[3] > 0));

    stroke.finish(&mut surface, Some(&baseline));
    assert!(stroke.did_paint);
    assert!(surface.pixel(10, 50).map_or(false, |p| p[3] > 0));
}
