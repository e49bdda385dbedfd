use egui::Color32;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::canvas::Size;
use crate::components::history::DEFAULT_MAX_HISTORY;
use crate::components::tools::ToolProperties;
use crate::input::ModifierKey;
use crate::ops::transform::Interpolation;

#[cfg(test)]
#[path = "settings_test.rs"]
mod settings_test;

const SETTINGS_FILENAME: &str = "settings.toml";

const DOCUMENTATION: &str = "\
# sketch-canvas engine settings.
# Delete this file to restore defaults.
";

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("no configuration directory on this platform")]
    NoConfigDir,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Engine configuration, persisted as TOML.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    /// Surface size used when nothing is persisted.
    pub default_width: u32,
    pub default_height: u32,
    /// Narrowest width a resize drag can reach.
    pub min_width: u32,
    pub max_undo_steps: usize,
    /// Straight RGBA.
    pub default_color: [u8; 4],
    pub stroke_width: f32,
    pub font_size: f32,
    /// System font family for text. Empty selects the built-in block face.
    pub font_family: String,
    /// Holding this key with the pointer over the surface starts a stroke.
    pub draw_modifier: ModifierKey,
    /// Side of the square resize zone at the bottom-right corner.
    pub resize_handle_size: f32,
    pub resize_filter: Interpolation,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_width: crate::canvas::DEFAULT_WIDTH,
            default_height: crate::canvas::DEFAULT_HEIGHT,
            min_width: 200,
            max_undo_steps: DEFAULT_MAX_HISTORY,
            default_color: [0, 0, 0, 255],
            stroke_width: 2.0,
            font_size: 24.0,
            font_family: "Arial".to_string(),
            draw_modifier: ModifierKey::Alt,
            resize_handle_size: 16.0,
            resize_filter: Interpolation::Bilinear,
        }
    }
}

impl EngineSettings {
    /// `<config_dir>/sketch-canvas/settings.toml`
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sketch-canvas").join(SETTINGS_FILENAME))
    }

    /// Load from the platform config directory, falling back to defaults.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_or_default(&path),
            None => {
                log::warn!("No config directory, using default settings");
                Self::default()
            }
        }
    }

    /// Load from `path`; a missing or unreadable file yields defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Ignoring settings at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let body = toml::to_string_pretty(self)?;
        std::fs::write(path, DOCUMENTATION.to_owned() + &body)?;
        Ok(())
    }

    pub fn default_size(&self) -> Size {
        Size::new(self.default_width, self.default_height)
    }

    pub fn default_color(&self) -> Color32 {
        let [r, g, b, a] = self.default_color;
        Color32::from_rgba_unmultiplied(r, g, b, a)
    }

    /// Starting tool properties.
    pub fn tool_properties(&self) -> ToolProperties {
        ToolProperties {
            color: self.default_color(),
            width: self.stroke_width.max(0.5),
            font_size: self.font_size.max(1.0),
        }
    }
}
