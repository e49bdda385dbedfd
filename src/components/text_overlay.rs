use egui::{Color32, Pos2, Rect, Vec2, vec2};
use uuid::Uuid;

use crate::ops::text::TextRenderer;

#[cfg(test)]
#[path = "text_overlay_test.rs"]
mod text_overlay_test;

/// Smallest font size reachable through the size handle.
pub const MIN_FONT_SIZE: f32 = 12.0;
/// Side length of the square font-size handle.
pub const FONT_HANDLE_SIZE: f32 = 10.0;

/// A positioned, still-editable piece of text floating above the raster.
#[derive(Clone, Debug, PartialEq)]
pub struct TextElement {
    pub id: Uuid,
    /// Top-left corner in canvas coordinates.
    pub position: Pos2,
    pub text: String,
    pub font_size: f32,
    pub color: Color32,
    pub is_editing: bool,
    pub is_selected: bool,
}

impl TextElement {
    pub fn bounds(&self, renderer: &TextRenderer) -> Rect {
        Rect::from_min_size(self.position, renderer.measure(&self.text, self.font_size))
    }

    /// The size handle sits centred on the bottom-right corner.
    pub fn font_handle_rect(&self, renderer: &TextRenderer) -> Rect {
        Rect::from_center_size(
            self.bounds(renderer).right_bottom(),
            Vec2::splat(FONT_HANDLE_SIZE),
        )
    }
}

/// Text being typed, either a new entry or an edit of an existing element.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingText {
    pub position: Pos2,
    pub text: String,
    pub font_size: f32,
    pub color: Color32,
    /// Element being edited, `None` for a fresh entry.
    pub editing: Option<Uuid>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Gesture {
    Idle,
    Dragging { id: Uuid, grab: Vec2 },
    ResizingFont { id: Uuid },
}

/// Ordered collection of text elements plus the entry being typed.
#[derive(Clone, Debug)]
pub struct TextOverlay {
    elements: Vec<TextElement>,
    pending: Option<PendingText>,
    gesture: Gesture,
}

impl Default for TextOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl TextOverlay {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            pending: None,
            gesture: Gesture::Idle,
        }
    }

    pub fn elements(&self) -> &[TextElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.pending.is_none()
    }

    pub fn pending(&self) -> Option<&PendingText> {
        self.pending.as_ref()
    }

    pub fn is_typing(&self) -> bool {
        self.pending.is_some()
    }

    pub fn get(&self, id: Uuid) -> Option<&TextElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    fn get_mut(&mut self, id: Uuid) -> Option<&mut TextElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    pub fn selected(&self) -> Option<&TextElement> {
        self.elements.iter().find(|e| e.is_selected)
    }

    // ---- hit testing --------------------------------------------------------

    /// Topmost element whose box contains `pos`.
    pub fn hit_test(&self, pos: Pos2, renderer: &TextRenderer) -> Option<Uuid> {
        self.elements
            .iter()
            .rev()
            .find(|e| e.bounds(renderer).contains(pos))
            .map(|e| e.id)
    }

    /// Selected element whose font-size handle contains `pos`.
    pub fn hit_font_handle(&self, pos: Pos2, renderer: &TextRenderer) -> Option<Uuid> {
        self.elements
            .iter()
            .rev()
            .filter(|e| e.is_selected)
            .find(|e| e.font_handle_rect(renderer).contains(pos))
            .map(|e| e.id)
    }

    // ---- selection ----------------------------------------------------------

    pub fn select(&mut self, id: Uuid) {
        for e in &mut self.elements {
            e.is_selected = e.id == id;
        }
    }

    pub fn deselect_all(&mut self) {
        for e in &mut self.elements {
            e.is_selected = false;
        }
    }

    // ---- typing -------------------------------------------------------------

    /// Open a fresh entry at `position`. An entry already open is confirmed
    /// first.
    pub fn begin_pending(&mut self, position: Pos2, color: Color32, font_size: f32) {
        self.confirm();
        self.deselect_all();
        self.pending = Some(PendingText {
            position,
            text: String::new(),
            font_size,
            color,
            editing: None,
        });
    }

    /// Start editing an existing element in place.
    pub fn enter_edit(&mut self, id: Uuid) -> bool {
        self.confirm();
        let Some(element) = self.get_mut(id) else {
            return false;
        };
        element.is_editing = true;
        let pending = PendingText {
            position: element.position,
            text: element.text.clone(),
            font_size: element.font_size,
            color: element.color,
            editing: Some(id),
        };
        self.pending = Some(pending);
        self.select(id);
        true
    }

    pub fn insert_text(&mut self, text: &str) {
        if let Some(p) = &mut self.pending {
            p.text.push_str(text);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(p) = &mut self.pending {
            p.text.pop();
        }
    }

    /// Close the open entry, keeping its trimmed text.
    ///
    /// A fresh entry with no visible text is dropped; an edited element whose
    /// text became empty is removed. Returns `true` when the element list
    /// changed.
    pub fn confirm(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        let text = pending.text.trim().to_string();
        match pending.editing {
            Some(id) => {
                if text.is_empty() {
                    self.elements.retain(|e| e.id != id);
                    return true;
                }
                match self.get_mut(id) {
                    Some(element) => {
                        element.is_editing = false;
                        let changed = element.text != text;
                        element.text = text;
                        changed
                    }
                    None => false,
                }
            }
            None => {
                if text.is_empty() {
                    return false;
                }
                self.elements.push(TextElement {
                    id: Uuid::new_v4(),
                    position: pending.position,
                    text,
                    font_size: pending.font_size,
                    color: pending.color,
                    is_editing: false,
                    is_selected: false,
                });
                true
            }
        }
    }

    /// Discard the open entry. An edited element keeps its original text.
    pub fn cancel(&mut self) {
        if let Some(PendingText {
            editing: Some(id), ..
        }) = self.pending.take()
        {
            if let Some(element) = self.get_mut(id) {
                element.is_editing = false;
            }
        }
    }

    // ---- direct manipulation ------------------------------------------------

    pub fn begin_drag(&mut self, id: Uuid, pointer: Pos2) -> bool {
        let Some(element) = self.get(id) else {
            return false;
        };
        let grab = pointer - element.position;
        self.select(id);
        self.gesture = Gesture::Dragging { id, grab };
        true
    }

    pub fn begin_font_resize(&mut self, id: Uuid) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.select(id);
        self.gesture = Gesture::ResizingFont { id };
        true
    }

    pub fn is_manipulating(&self) -> bool {
        self.gesture != Gesture::Idle
    }

    /// Apply a pointer move to the active drag or font-size gesture.
    /// Returns `true` when an element changed.
    pub fn manipulate(&mut self, pointer: Pos2) -> bool {
        match self.gesture {
            Gesture::Idle => false,
            Gesture::Dragging { id, grab } => match self.get_mut(id) {
                Some(element) => {
                    element.position = pointer - grab;
                    true
                }
                None => false,
            },
            Gesture::ResizingFont { id } => match self.get_mut(id) {
                Some(element) => {
                    let dy = pointer.y - element.position.y;
                    element.font_size = (2.0 * dy.abs()).max(MIN_FONT_SIZE);
                    true
                }
                None => false,
            },
        }
    }

    pub fn end_manipulation(&mut self) {
        self.gesture = Gesture::Idle;
    }

    // ---- flattening ---------------------------------------------------------

    /// Confirm any open entry, then hand over every element in order and
    /// leave the overlay empty.
    pub fn take_for_flatten(&mut self) -> Vec<TextElement> {
        self.confirm();
        self.gesture = Gesture::Idle;
        std::mem::take(&mut self.elements)
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.pending = None;
        self.gesture = Gesture::Idle;
    }

    /// Placeholder box for an empty entry so the caret has somewhere to sit.
    pub fn pending_bounds(&self, renderer: &TextRenderer) -> Option<Rect> {
        self.pending.as_ref().map(|p| {
            let size = renderer.measure(&p.text, p.font_size);
            Rect::from_min_size(p.position, vec2(size.x.max(p.font_size * 0.5), size.y))
        })
    }
}
