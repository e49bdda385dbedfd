use egui::{Color32, Pos2};
use image::RgbaImage;
use std::sync::mpsc::{self, TryRecvError};

use crate::canvas::{RasterSurface, Size};
use crate::components::history::{HistoryState, Snapshot};
use crate::components::text_overlay::TextOverlay;
use crate::components::tools::{Stroke, Tool, ToolProperties};
use crate::input::{self, CursorHint, Key, Modifiers, Shortcut};
use crate::io::{self, BackgroundLoad, BackgroundReference, CanvasStore, PersistedState, PersistenceAdapter};
use crate::ops::shapes::{self, StrokeStyle};
use crate::ops::text::TextRenderer;
use crate::ops::transform::{self, ResizeGesture};
use crate::settings::EngineSettings;

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Outline colour drawn around the selected text element in the view.
const SELECTION_COLOR: Color32 = Color32::from_rgb(30, 136, 229);

/// Mounted engine state. Every method assumes a live store and surface.
struct EngineCore {
    settings: EngineSettings,
    surface: RasterSurface,
    history: HistoryState,
    tool: Tool,
    props: ToolProperties,
    stroke: Option<Stroke>,
    overlay: TextOverlay,
    text: TextRenderer,
    resize: Option<ResizeGesture>,
    background: Option<BackgroundReference>,
    background_image: Option<RgbaImage>,
    pending_background: Option<mpsc::Receiver<BackgroundLoad>>,
    /// Size a resize redraw should run at on the next frame.
    pending_redraw: Option<Size>,
    adapter: PersistenceAdapter,
    pointer: Option<Pos2>,
    draw_modifier_held: bool,
    needs_repaint: bool,
}

impl EngineCore {
    fn mount(settings: EngineSettings, store: Box<dyn CanvasStore>) -> Self {
        let mut adapter = PersistenceAdapter::new(store);
        let restored = adapter.load(settings.default_size());
        let history = HistoryState::seeded(Snapshot::capture(&restored.surface), settings.max_undo_steps);
        let text = TextRenderer::system(&settings.font_family);
        log::info!(
            "Canvas mounted at {} ({})",
            restored.surface.size(),
            if restored.from_raster { "restored" } else { "fresh" }
        );
        Self {
            props: settings.tool_properties(),
            surface: restored.surface,
            history,
            tool: Tool::default(),
            stroke: None,
            overlay: TextOverlay::new(),
            text,
            resize: None,
            background: restored.background,
            background_image: restored.background_image,
            pending_background: None,
            pending_redraw: None,
            adapter,
            pointer: None,
            draw_modifier_held: false,
            needs_repaint: true,
            settings,
        }
    }

    // --- Persistence ---

    /// Push the surface if it differs from the last recorded state, then
    /// save. Returns `true` when a snapshot was recorded.
    fn record(&mut self) -> bool {
        let changed = !self
            .history
            .current()
            .is_some_and(|top| top.matches(&self.surface));
        if changed && self.history.push(Snapshot::capture(&self.surface)) {
            log::debug!(
                "History: {} undo / {} redo",
                self.history.undo_count(),
                self.history.redo_count()
            );
            self.save();
            true
        } else {
            false
        }
    }

    fn save(&mut self) {
        self.flush_pending_redraw();
        self.adapter.save(&self.surface, self.background.as_ref());
    }

    // --- Strokes ---

    fn begin_stroke(&mut self, pos: Pos2) {
        if self.tool == Tool::Text || !self.surface.contains(pos) {
            return;
        }
        self.commit_stroke();
        self.stroke = Some(Stroke::begin(self.props.kind_for(self.tool), pos));
    }

    fn update_stroke(&mut self, pos: Pos2) {
        if let Some(stroke) = &mut self.stroke {
            stroke.update(pos, &mut self.surface, self.history.current());
            self.needs_repaint = true;
        }
    }

    fn commit_stroke(&mut self) {
        let Some(mut stroke) = self.stroke.take() else {
            return;
        };
        stroke.finish(&mut self.surface, self.history.current());
        self.needs_repaint = true;
        if !self.record() {
            log::trace!("{} stroke left the raster unchanged", stroke.kind.tool());
        }
    }

    // --- Text ---

    fn flatten_text(&mut self) {
        let elements = self.overlay.take_for_flatten();
        if elements.is_empty() {
            return;
        }
        for element in &elements {
            self.text.draw(
                &mut self.surface,
                &element.text,
                element.font_size,
                element.position,
                element.color,
            );
        }
        self.text.clear_glyph_cache();
        log::debug!("Flattened {} text element(s)", elements.len());
        self.needs_repaint = true;
        self.record();
    }

    fn text_pointer_down(&mut self, pos: Pos2) {
        let inside_pending = self
            .overlay
            .pending_bounds(&self.text)
            .is_some_and(|r| r.contains(pos));
        if inside_pending {
            return;
        }
        self.overlay.confirm();
        if let Some(id) = self.overlay.hit_font_handle(pos, &self.text) {
            self.overlay.begin_font_resize(id);
        } else if let Some(id) = self.overlay.hit_test(pos, &self.text) {
            self.overlay.begin_drag(id, pos);
        } else if self.surface.contains(pos) {
            self.overlay
                .begin_pending(pos, self.props.color, self.props.font_size);
        } else {
            self.overlay.deselect_all();
        }
        self.needs_repaint = true;
    }

    fn text_key(&mut self, key: Key, mods: Modifiers) {
        if !self.overlay.is_typing() {
            return;
        }
        match key {
            Key::Char(c) if !mods.command() => self.overlay.insert_text(&c.to_string()),
            Key::Enter if mods.shift => self.overlay.insert_text("\n"),
            Key::Enter => {
                self.overlay.confirm();
            }
            Key::Escape => self.overlay.cancel(),
            Key::Backspace => self.overlay.backspace(),
            _ => return,
        }
        self.needs_repaint = true;
    }

    // --- Resize ---

    fn begin_resize(&mut self, pos: Pos2) {
        self.commit_stroke();
        self.overlay.confirm();
        self.resize = Some(ResizeGesture::begin(pos, &self.surface, self.settings.min_width));
        log::debug!("Resize started at {}", self.surface.size());
    }

    fn update_resize(&mut self, pos: Pos2) {
        if let Some(gesture) = &mut self.resize {
            if let Some(size) = gesture.update(pos) {
                self.pending_redraw = Some(size);
            }
        }
    }

    fn redraw_resize(&mut self, size: Size) {
        let Some(gesture) = &mut self.resize else {
            return;
        };
        transform::recomposite(
            &mut self.surface,
            size,
            self.background_image.as_ref(),
            gesture.snapshot().image(),
            self.settings.resize_filter,
        );
        gesture.mark_applied(size);
        self.needs_repaint = true;
    }

    fn flush_pending_redraw(&mut self) {
        if let Some(size) = self.pending_redraw.take() {
            self.redraw_resize(size);
        }
    }

    fn end_resize(&mut self) {
        if self.resize.is_none() {
            return;
        }
        self.await_background();
        self.pending_redraw = None;
        let Some(gesture) = self.resize.take() else {
            return;
        };
        let size = gesture.last_computed();
        if size == gesture.initial() {
            self.surface.restore(gesture.snapshot().image());
        } else {
            transform::recomposite(
                &mut self.surface,
                size,
                self.background_image.as_ref(),
                gesture.snapshot().image(),
                self.settings.resize_filter,
            );
        }
        log::info!("Canvas resized {} -> {}", gesture.initial(), size);
        self.needs_repaint = true;
        self.record();
    }

    // --- Background ---

    fn set_background(&mut self, reference: &str) {
        match BackgroundReference::parse(reference) {
            None => {
                self.background = None;
                self.background_image = None;
                self.pending_background = None;
                self.save();
            }
            Some(r) => {
                log::debug!("Loading background {r}");
                self.background = Some(r.clone());
                self.pending_background = Some(io::spawn_background_load(r));
            }
        }
    }

    /// Deliver a finished background decode. Held back while a stroke is in
    /// progress so its preview never reaches history.
    fn poll_background(&mut self) {
        if self.stroke.is_some() {
            return;
        }
        let Some(rx) = &self.pending_background else {
            return;
        };
        match rx.try_recv() {
            Ok(load) => {
                self.pending_background = None;
                self.apply_background(load);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                log::warn!("Background loader exited without a result");
                self.pending_background = None;
            }
        }
    }

    fn await_background(&mut self) {
        if let Some(rx) = self.pending_background.take() {
            match rx.recv() {
                Ok(load) => self.apply_background(load),
                Err(_) => log::warn!("Background loader exited without a result"),
            }
        }
    }

    fn apply_background(&mut self, (reference, result): BackgroundLoad) {
        if self.background.as_ref() != Some(&reference) {
            log::debug!("Dropping stale background {reference}");
            return;
        }
        let image = match result {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Background {reference} could not be decoded: {e}");
                return;
            }
        };
        self.background_image = Some(image);
        if self.resize.is_some() {
            // The gesture's redraws pick up the new image.
            if let Some(gesture) = &self.resize {
                self.pending_redraw = Some(gesture.last_computed());
            }
            return;
        }
        let content = self.surface.image().clone();
        let size = self.surface.size();
        transform::recomposite(
            &mut self.surface,
            size,
            self.background_image.as_ref(),
            &content,
            self.settings.resize_filter,
        );
        self.needs_repaint = true;
        if !self.record() {
            self.save();
        }
    }

    // --- Housekeeping ---

    /// End every in-flight gesture so a discrete action sees a settled
    /// surface.
    fn settle(&mut self) {
        self.commit_stroke();
        self.end_resize();
    }

    fn on_frame(&mut self) {
        self.poll_background();
        if self.pending_background.is_some() {
            return;
        }
        self.flush_pending_redraw();
    }
}

// ============================================================================
// DRAWING ENGINE
// ============================================================================

/// The embeddable drawing surface.
///
/// Created unmounted; [`DrawingEngine::mount`] attaches a store and restores
/// state. While unmounted every input handler does nothing.
pub struct DrawingEngine {
    settings: EngineSettings,
    core: Option<EngineCore>,
}

impl Default for DrawingEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl DrawingEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings, core: None }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // --- Lifecycle ---

    pub fn mount(&mut self, store: Box<dyn CanvasStore>) {
        self.unmount();
        self.core = Some(EngineCore::mount(self.settings.clone(), store));
    }

    /// Finish any gesture, flatten text and deliver a pending background,
    /// leaving the surface in the state that would be persisted.
    pub fn flush(&mut self) {
        if let Some(core) = self.core.as_mut() {
            core.settle();
            core.flatten_text();
            core.await_background();
        }
    }

    /// Flush, then write the surface to the store and detach.
    pub fn unmount(&mut self) {
        self.flush();
        let Some(mut core) = self.core.take() else {
            return;
        };
        core.save();
        log::info!("Canvas unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.core.is_some()
    }

    // --- Tools ---

    pub fn tool(&self) -> Tool {
        self.core.as_ref().map_or(Tool::default(), |c| c.tool)
    }

    pub fn select_tool(&mut self, tool: Tool) {
        let Some(core) = self.core.as_mut() else {
            return;
        };
        if core.tool == tool {
            return;
        }
        core.settle();
        if core.tool == Tool::Text {
            core.flatten_text();
        }
        log::debug!("Tool {} -> {}", core.tool, tool);
        core.tool = tool;
        core.needs_repaint = true;
    }

    pub fn properties(&self) -> Option<ToolProperties> {
        self.core.as_ref().map(|c| c.props)
    }

    pub fn set_color(&mut self, color: Color32) {
        if let Some(core) = self.core.as_mut() {
            core.props.color = color;
        }
    }

    pub fn set_width(&mut self, width: f32) {
        if let Some(core) = self.core.as_mut() {
            core.props.width = width.max(0.5);
        }
    }

    pub fn set_font_size(&mut self, font_size: f32) {
        if let Some(core) = self.core.as_mut() {
            core.props.font_size = font_size.max(1.0);
        }
    }

    // --- Pointer ---

    pub fn on_pointer_down(&mut self, pos: Pos2, _mods: Modifiers) {
        let Some(core) = self.core.as_mut() else {
            return;
        };
        core.pointer = Some(pos);
        let zone = core.settings.resize_handle_size;
        if transform::in_resize_handle(pos, core.surface.size(), zone) {
            core.begin_resize(pos);
            return;
        }
        if core.tool == Tool::Text {
            core.text_pointer_down(pos);
        } else {
            core.begin_stroke(pos);
        }
    }

    pub fn on_pointer_move(&mut self, pos: Pos2, _mods: Modifiers) {
        let Some(core) = self.core.as_mut() else {
            return;
        };
        core.pointer = Some(pos);
        if core.resize.is_some() {
            core.update_resize(pos);
        } else if core.overlay.is_manipulating() {
            core.needs_repaint |= core.overlay.manipulate(pos);
        } else {
            core.update_stroke(pos);
        }
    }

    pub fn on_pointer_up(&mut self, pos: Pos2, _mods: Modifiers) {
        let Some(core) = self.core.as_mut() else {
            return;
        };
        core.pointer = Some(pos);
        if core.resize.is_some() {
            core.update_resize(pos);
            core.end_resize();
        } else if core.overlay.is_manipulating() {
            core.overlay.end_manipulation();
            // Font-size drags leave glyphs cached for every size passed through.
            core.text.clear_glyph_cache();
        } else {
            core.commit_stroke();
        }
    }

    /// The pointer left the surface. Strokes are committed; a resize keeps
    /// tracking until the pointer is released.
    pub fn on_pointer_leave(&mut self) {
        let Some(core) = self.core.as_mut() else {
            return;
        };
        core.pointer = None;
        core.commit_stroke();
    }

    pub fn on_double_click(&mut self, pos: Pos2) {
        let Some(core) = self.core.as_mut() else {
            return;
        };
        if core.tool != Tool::Text {
            return;
        }
        if let Some(id) = core.overlay.hit_test(pos, &core.text) {
            core.overlay.end_manipulation();
            core.overlay.enter_edit(id);
            core.needs_repaint = true;
        }
    }

    // --- Keyboard ---

    pub fn on_key_down(&mut self, key: Key, mods: Modifiers) {
        if self.core.is_none() {
            return;
        }
        match input::shortcut(key, mods) {
            Some(Shortcut::Undo) => {
                self.undo();
                return;
            }
            Some(Shortcut::Redo) => {
                self.redo();
                return;
            }
            None => {}
        }
        let Some(core) = self.core.as_mut() else {
            return;
        };
        match key {
            Key::Modifier(m) if m == core.settings.draw_modifier => {
                if core.draw_modifier_held {
                    return;
                }
                core.draw_modifier_held = true;
                if core.stroke.is_none() && core.resize.is_none() {
                    if let Some(pos) = core.pointer {
                        core.begin_stroke(pos);
                    }
                }
            }
            _ if core.tool == Tool::Text => core.text_key(key, mods),
            _ => {}
        }
    }

    pub fn on_key_up(&mut self, key: Key, _mods: Modifiers) {
        let Some(core) = self.core.as_mut() else {
            return;
        };
        if key == Key::Modifier(core.settings.draw_modifier) {
            core.draw_modifier_held = false;
            core.commit_stroke();
        }
    }

    // --- History ---

    /// Step back one raster state. Returns `false` when there is nothing to
    /// undo or the engine is not mounted.
    pub fn undo(&mut self) -> bool {
        self.step_history(HistoryState::undo)
    }

    pub fn redo(&mut self) -> bool {
        self.step_history(HistoryState::redo)
    }

    fn step_history(&mut self, step: fn(&mut HistoryState) -> Option<&Snapshot>) -> bool {
        let Some(core) = self.core.as_mut() else {
            return false;
        };
        core.settle();
        if core.tool == Tool::Text {
            core.flatten_text();
        }
        let Some(snapshot) = step(&mut core.history) else {
            return false;
        };
        core.surface.restore(snapshot.image());
        core.needs_repaint = true;
        core.save();
        true
    }

    pub fn can_undo(&self) -> bool {
        self.core.as_ref().is_some_and(|c| c.history.can_undo())
    }

    pub fn can_redo(&self) -> bool {
        self.core.as_ref().is_some_and(|c| c.history.can_redo())
    }

    /// Wipe drawing and text, keeping the background.
    pub fn clear_all(&mut self) {
        let Some(core) = self.core.as_mut() else {
            return;
        };
        core.settle();
        core.overlay.clear();
        core.surface.clear();
        if let Some(bg) = &core.background_image {
            core.surface
                .draw_scaled(bg, core.settings.resize_filter.to_filter());
        }
        core.needs_repaint = true;
        core.record();
    }

    // --- Resize ---

    pub fn begin_resize(&mut self, pos: Pos2) {
        if let Some(core) = self.core.as_mut() {
            core.begin_resize(pos);
        }
    }

    pub fn update_resize(&mut self, pos: Pos2) {
        if let Some(core) = self.core.as_mut() {
            core.update_resize(pos);
        }
    }

    pub fn end_resize(&mut self) {
        if let Some(core) = self.core.as_mut() {
            core.end_resize();
        }
    }

    pub fn is_resizing(&self) -> bool {
        self.core.as_ref().is_some_and(|c| c.resize.is_some())
    }

    // --- Background ---

    /// Replace the background image. An empty reference removes it. The
    /// image decodes off-thread and is layered in on a later frame.
    pub fn set_background(&mut self, reference: &str) {
        if let Some(core) = self.core.as_mut() {
            core.set_background(reference);
        }
    }

    pub fn background(&self) -> Option<&BackgroundReference> {
        self.core.as_ref().and_then(|c| c.background.as_ref())
    }

    pub fn is_background_loading(&self) -> bool {
        self.core.as_ref().is_some_and(|c| c.pending_background.is_some())
    }

    // --- Frame ---

    /// Run deferred work: deliver decoded backgrounds and apply the latest
    /// scheduled resize redraw.
    pub fn on_frame(&mut self) {
        if let Some(core) = self.core.as_mut() {
            core.on_frame();
        }
    }

    /// True once after any change the host should display.
    pub fn take_repaint(&mut self) -> bool {
        self.core
            .as_mut()
            .is_some_and(|c| std::mem::take(&mut c.needs_repaint))
    }

    // --- Queries ---

    pub fn size(&self) -> Option<Size> {
        self.core.as_ref().map(|c| c.surface.size())
    }

    pub fn surface(&self) -> Option<&RasterSurface> {
        self.core.as_ref().map(|c| &c.surface)
    }

    pub fn history(&self) -> Option<&HistoryState> {
        self.core.as_ref().map(|c| &c.history)
    }

    pub fn overlay(&self) -> Option<&TextOverlay> {
        self.core.as_ref().map(|c| &c.overlay)
    }

    /// What a save would write right now.
    pub fn persisted_state(&self) -> Option<PersistedState> {
        let core = self.core.as_ref()?;
        match io::persisted_state(&core.surface, core.background.as_ref()) {
            Ok(state) => Some(state),
            Err(e) => {
                log::error!("Failed to encode canvas: {e}");
                None
            }
        }
    }

    /// The raster with un-flattened text and the selection outline drawn
    /// on top, for display.
    pub fn render_view(&mut self) -> Option<RgbaImage> {
        let core = self.core.as_mut()?;
        let mut view = core.surface.clone();
        let outline = StrokeStyle {
            color: SELECTION_COLOR,
            width: 1.0,
        };
        for element in core.overlay.elements() {
            if !element.is_editing {
                core.text.draw(
                    &mut view,
                    &element.text,
                    element.font_size,
                    element.position,
                    element.color,
                );
            }
            if element.is_selected {
                let rect = element.bounds(&core.text).expand(2.0);
                shapes::draw_rect_outline(&mut view, rect.min, rect.max, &outline);
                let handle = element.font_handle_rect(&core.text);
                shapes::draw_rect_outline(&mut view, handle.min, handle.max, &outline);
            }
        }
        if let Some(pending) = core.overlay.pending() {
            core.text.draw(
                &mut view,
                &pending.text,
                pending.font_size,
                pending.position,
                pending.color,
            );
            if let Some(rect) = core.overlay.pending_bounds(&core.text) {
                let rect = rect.expand(2.0);
                shapes::draw_rect_outline(&mut view, rect.min, rect.max, &outline);
            }
        }
        Some(view.image().clone())
    }

    /// Cursor the host should show with the pointer at `pos`.
    pub fn cursor_at(&self, pos: Pos2) -> CursorHint {
        let Some(core) = self.core.as_ref() else {
            return CursorHint::Default;
        };
        if core.resize.is_some()
            || transform::in_resize_handle(pos, core.surface.size(), core.settings.resize_handle_size)
        {
            return CursorHint::ResizeDiagonal;
        }
        if !core.surface.contains(pos) {
            return CursorHint::Default;
        }
        if core.tool != Tool::Text {
            return CursorHint::Crosshair;
        }
        if core.overlay.hit_font_handle(pos, &core.text).is_some() {
            CursorHint::ResizeVertical
        } else if core.overlay.hit_test(pos, &core.text).is_some() {
            CursorHint::Move
        } else {
            CursorHint::Text
        }
    }
}

impl Drop for DrawingEngine {
    fn drop(&mut self) {
        self.unmount();
    }
}
