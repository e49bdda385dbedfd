//! Embeddable freehand drawing canvas.
//!
//! [`DrawingEngine`] owns a raster surface, a bounded undo history, a text
//! overlay and the persistence adapter. Hosts feed it pointer, keyboard and
//! frame events and read back the raster (or [`DrawingEngine::render_view`])
//! to display.

pub mod canvas;
pub mod cli;
pub mod components;
pub mod engine;
pub mod input;
pub mod io;
pub mod logger;
pub mod ops;
pub mod settings;

pub use canvas::{RasterSurface, Size};
pub use components::tools::{Tool, ToolProperties};
pub use engine::DrawingEngine;
pub use input::{CursorHint, Key, ModifierKey, Modifiers};
pub use io::{BackgroundReference, CanvasStore, JsonFileStore, MemoryStore, PersistedState};
pub use settings::EngineSettings;
