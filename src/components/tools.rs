use egui::{Color32, Pos2};

use crate::canvas::RasterSurface;
use crate::components::history::Snapshot;
use crate::ops::shapes::{self, ShapeKind, StrokeStyle};

#[cfg(test)]
#[path = "tools_test.rs"]
mod tools_test;

/// Eraser disc radius as a multiple of the configured width.
pub const ERASER_RADIUS_FACTOR: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    #[default]
    Pen,
    Eraser,
    Line,
    Arrow,
    Rect,
    Ellipse,
    Text,
}

impl Tool {
    pub fn all() -> &'static [Tool] {
        &[
            Tool::Pen,
            Tool::Eraser,
            Tool::Line,
            Tool::Arrow,
            Tool::Rect,
            Tool::Ellipse,
            Tool::Text,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Pen => "pen",
            Tool::Eraser => "eraser",
            Tool::Line => "line",
            Tool::Arrow => "arrow",
            Tool::Rect => "rect",
            Tool::Ellipse => "ellipse",
            Tool::Text => "text",
        }
    }

    pub fn from_name(name: &str) -> Option<Tool> {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "rectangle" => Some(Tool::Rect),
            _ => Tool::all().iter().copied().find(|t| t.name() == name),
        }
    }

    pub fn shape(&self) -> Option<ShapeKind> {
        match self {
            Tool::Line => Some(ShapeKind::Line),
            Tool::Arrow => Some(ShapeKind::Arrow),
            Tool::Rect => Some(ShapeKind::Rect),
            Tool::Ellipse => Some(ShapeKind::Ellipse),
            _ => None,
        }
    }

    pub fn is_shape(&self) -> bool {
        self.shape().is_some()
    }

    /// Tools whose strokes paint as the pointer moves.
    pub fn is_freehand(&self) -> bool {
        matches!(self, Tool::Pen | Tool::Eraser)
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A tool together with only the parameters that tool uses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ToolKind {
    Pen(StrokeStyle),
    Eraser { width: f32 },
    Shape { shape: ShapeKind, style: StrokeStyle },
    Text { color: Color32, font_size: f32 },
}

impl ToolKind {
    pub fn tool(&self) -> Tool {
        match self {
            ToolKind::Pen(_) => Tool::Pen,
            ToolKind::Eraser { .. } => Tool::Eraser,
            ToolKind::Shape { shape, .. } => match shape {
                ShapeKind::Line => Tool::Line,
                ShapeKind::Arrow => Tool::Arrow,
                ShapeKind::Rect => Tool::Rect,
                ShapeKind::Ellipse => Tool::Ellipse,
            },
            ToolKind::Text { .. } => Tool::Text,
        }
    }
}

/// User-adjustable drawing parameters shared across tools.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToolProperties {
    pub color: Color32,
    pub width: f32,
    pub font_size: f32,
}

impl Default for ToolProperties {
    fn default() -> Self {
        Self {
            color: Color32::BLACK,
            width: 2.0,
            font_size: 24.0,
        }
    }
}

impl ToolProperties {
    pub fn style(&self) -> StrokeStyle {
        StrokeStyle {
            color: self.color,
            width: self.width,
        }
    }

    /// Freeze the current properties into the parameters `tool` needs.
    pub fn kind_for(&self, tool: Tool) -> ToolKind {
        match tool {
            Tool::Pen => ToolKind::Pen(self.style()),
            Tool::Eraser => ToolKind::Eraser { width: self.width },
            Tool::Text => ToolKind::Text {
                color: self.color,
                font_size: self.font_size,
            },
            Tool::Line | Tool::Arrow | Tool::Rect | Tool::Ellipse => ToolKind::Shape {
                // is_shape() covers every arm listed here
                shape: tool.shape().unwrap_or(ShapeKind::Line),
                style: self.style(),
            },
        }
    }
}

// ============================================================================
// STROKE: one in-progress gesture
// ============================================================================

/// An in-progress pointer gesture for a raster tool.
///
/// Created on pointer-down, updated per move and consumed on commit. The
/// parameters are frozen at creation so property changes mid-stroke do not
/// affect it.
#[derive(Clone, Debug)]
pub struct Stroke {
    pub kind: ToolKind,
    pub start: Pos2,
    pub current: Pos2,
    pub last: Pos2,
    pub did_paint: bool,
}

impl Stroke {
    pub fn begin(kind: ToolKind, pos: Pos2) -> Self {
        Self {
            kind,
            start: pos,
            current: pos,
            last: pos,
            did_paint: false,
        }
    }

    /// Advance the stroke to `pos` and render its preview into `surface`.
    ///
    /// Shape tools repaint from `baseline` each tick so only the latest
    /// outline is visible.
    pub fn update(&mut self, pos: Pos2, surface: &mut RasterSurface, baseline: Option<&Snapshot>) {
        self.last = self.current;
        self.current = pos;
        match self.kind {
            ToolKind::Pen(style) => {
                shapes::draw_segment(surface, self.last, self.current, &style);
                self.did_paint = true;
            }
            ToolKind::Eraser { width } => {
                if surface.erase_disc(self.current, width * ERASER_RADIUS_FACTOR) {
                    self.did_paint = true;
                }
            }
            ToolKind::Shape { shape, style } => {
                if let Some(base) = baseline {
                    surface.restore(base.image());
                }
                if shapes::draw_shape(surface, shape, self.start, self.current, &style) {
                    self.did_paint = true;
                }
            }
            ToolKind::Text { .. } => {}
        }
    }

    /// Paint the permanent result of the stroke. Only shapes have anything
    /// left to draw; freehand tools painted as they went.
    pub fn finish(&mut self, surface: &mut RasterSurface, baseline: Option<&Snapshot>) {
        if let ToolKind::Shape { shape, style } = self.kind {
            if let Some(base) = baseline {
                surface.restore(base.image());
            }
            self.did_paint = shapes::draw_shape(surface, shape, self.start, self.current, &style);
        }
    }
}
