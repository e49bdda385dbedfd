use super::*;
use egui::pos2;

fn typed(overlay: &mut TextOverlay, at: Pos2, text: &str) -> Uuid {
    overlay.begin_pending(at, Color32::BLACK, 20.0);
    overlay.insert_text(text);
    assert!(overlay.confirm());
    overlay.elements().last().map(|e| e.id).unwrap()
}

#[test]
fn confirm_appends_trimmed_text() {
    let mut overlay = TextOverlay::new();
    typed(&mut overlay, pos2(10.0, 10.0), "  hello ");
    assert_eq!(overlay.len(), 1);
    assert_eq!(overlay.elements()[0].text, "hello");
    assert!(overlay.pending().is_none());
}

#[test]
fn blank_entry_is_discarded_on_confirm() {
    let mut overlay = TextOverlay::new();
    overlay.begin_pending(pos2(0.0, 0.0), Color32::BLACK, 20.0);
    overlay.insert_text("   ");
    assert!(!overlay.confirm());
    assert!(overlay.is_empty());
}

#[test]
fn cancel_discards_new_entry() {
    let mut overlay = TextOverlay::new();
    overlay.begin_pending(pos2(0.0, 0.0), Color32::BLACK, 20.0);
    overlay.insert_text("draft");
    overlay.cancel();
    assert!(overlay.is_empty());
}

#[test]
fn backspace_removes_last_char() {
    let mut overlay = TextOverlay::new();
    overlay.begin_pending(pos2(0.0, 0.0), Color32::BLACK, 20.0);
    overlay.insert_text("hix");
    overlay.backspace();
    assert_eq!(overlay.pending().map(|p| p.text.as_str()), Some("hi"));
}

#[test]
fn opening_new_entry_confirms_previous() {
    let mut overlay = TextOverlay::new();
    overlay.begin_pending(pos2(0.0, 0.0), Color32::BLACK, 20.0);
    overlay.insert_text("one");
    overlay.begin_pending(pos2(50.0, 50.0), Color32::BLACK, 20.0);
    assert_eq!(overlay.len(), 1);
    assert!(overlay.is_typing());
}

#[test]
fn hit_test_prefers_topmost() {
    let renderer = TextRenderer::blocks();
    let mut overlay = TextOverlay::new();
    let _below = typed(&mut overlay, pos2(10.0, 10.0), "aaaa");
    let above = typed(&mut overlay, pos2(20.0, 15.0), "bbbb");
    assert_eq!(overlay.hit_test(pos2(25.0, 20.0), &renderer), Some(above));
    assert_eq!(overlay.hit_test(pos2(500.0, 500.0), &renderer), None);
}

#[test]
fn edit_to_empty_removes_element() {
    let mut overlay = TextOverlay::new();
    let id = typed(&mut overlay, pos2(10.0, 10.0), "bye");
    assert!(overlay.enter_edit(id));
    assert!(overlay.get(id).is_some_and(|e| e.is_editing));
    overlay.backspace();
    overlay.backspace();
    overlay.backspace();
    assert!(overlay.confirm());
    assert_eq!(overlay.len(), 0);
}

#[test]
fn cancelled_edit_keeps_original_text() {
    let mut overlay = TextOverlay::new();
    let id = typed(&mut overlay, pos2(10.0, 10.0), "keep");
    overlay.enter_edit(id);
    overlay.insert_text(" more");
    overlay.cancel();
    let e = overlay.get(id).unwrap();
    assert_eq!(e.text, "keep");
    assert!(!e.is_editing);
}

#[test]
fn edit_commits_trimmed_text() {
    let mut overlay = TextOverlay::new();
    let id = typed(&mut overlay, pos2(10.0, 10.0), "a");
    overlay.enter_edit(id);
    overlay.insert_text("b  ");
    overlay.confirm();
    assert_eq!(overlay.get(id).map(|e| e.text.as_str()), Some("ab"));
}

#[test]
fn drag_keeps_grab_offset() {
    let mut overlay = TextOverlay::new();
    let id = typed(&mut overlay, pos2(10.0, 10.0), "drag");
    assert!(overlay.begin_drag(id, pos2(15.0, 12.0)));
    assert!(overlay.manipulate(pos2(115.0, 62.0)));
    overlay.end_manipulation();
    let e = overlay.get(id).unwrap();
    assert_eq!(e.position, pos2(110.0, 60.0));
    assert!(e.is_selected);
    assert!(!overlay.manipulate(pos2(0.0, 0.0)));
}

#[test]
fn font_resize_is_twice_vertical_distance_with_floor() {
    let mut overlay = TextOverlay::new();
    let id = typed(&mut overlay, pos2(10.0, 100.0), "size");
    overlay.begin_font_resize(id);
    overlay.manipulate(pos2(40.0, 130.0));
    assert_eq!(overlay.get(id).map(|e| e.font_size), Some(60.0));
    overlay.manipulate(pos2(40.0, 96.0));
    assert_eq!(overlay.get(id).map(|e| e.font_size), Some(MIN_FONT_SIZE));
    overlay.manipulate(pos2(40.0, 80.0));
    assert_eq!(overlay.get(id).map(|e| e.font_size), Some(40.0));
}

#[test]
fn font_handle_only_hits_selected_element() {
    let renderer = TextRenderer::blocks();
    let mut overlay = TextOverlay::new();
    let id = typed(&mut overlay, pos2(0.0, 0.0), "ab");
    // Block face: 2 × 12 wide, 20 tall
    let corner = pos2(24.0, 20.0);
    assert_eq!(overlay.hit_font_handle(corner, &renderer), None);
    overlay.select(id);
    assert_eq!(overlay.hit_font_handle(corner, &renderer), Some(id));
}

#[test]
fn take_for_flatten_confirms_pending_and_empties() {
    let mut overlay = TextOverlay::new();
    typed(&mut overlay, pos2(0.0, 0.0), "first");
    overlay.begin_pending(pos2(30.0, 30.0), Color32::BLACK, 20.0);
    overlay.insert_text("second");
    let taken = overlay.take_for_flatten();
    assert_eq!(taken.len(), 2);
    assert_eq!(taken[1].text, "second");
    assert!(overlay.is_empty());
}
