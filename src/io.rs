use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc;

use crate::canvas::{RasterSurface, Size};

#[cfg(test)]
#[path = "io_test.rs"]
mod io_test;

/// Prefix of every raster written by [`encode_raster`].
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

// ============================================================================
// ERRORS
// ============================================================================

/// Failure turning a stored reference or data URL into pixels.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("not a base64 data URL")]
    NotDataUrl,
    #[error("unsupported image reference: {0}")]
    Unsupported(String),
    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reading or writing persisted state.
#[derive(thiserror::Error, Debug)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

// ============================================================================
// PERSISTED STATE
// ============================================================================

/// The host-visible block properties.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    /// `data:image/png;base64,…` or empty.
    pub canvas_data: String,
    pub width: u32,
    pub height: u32,
    /// Background reference or empty.
    pub background_image: String,
}

impl PersistedState {
    /// Declared dimensions, when both are usable.
    pub fn size(&self) -> Option<Size> {
        (self.width > 0 && self.height > 0).then(|| Size::new(self.width, self.height))
    }

    pub fn background(&self) -> Option<BackgroundReference> {
        BackgroundReference::parse(&self.background_image)
    }
}

/// Identity of an external image layered under the drawing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BackgroundReference {
    DataUrl(String),
    Url(String),
    Path(PathBuf),
}

impl BackgroundReference {
    /// Classify a stored reference. Empty strings mean "no background".
    pub fn parse(reference: &str) -> Option<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
        Some(if lower.starts_with("data:") {
            BackgroundReference::DataUrl(reference.to_string())
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            BackgroundReference::Url(reference.to_string())
        } else {
            let path = reference.strip_prefix("file://").unwrap_or(reference);
            BackgroundReference::Path(PathBuf::from(path))
        })
    }

    /// The string written back to persisted state.
    pub fn as_reference(&self) -> String {
        match self {
            BackgroundReference::DataUrl(s) | BackgroundReference::Url(s) => s.clone(),
            BackgroundReference::Path(p) => p.to_string_lossy().into_owned(),
        }
    }
}

impl std::fmt::Display for BackgroundReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackgroundReference::DataUrl(s) => {
                write!(f, "data URL ({} bytes)", s.len())
            }
            BackgroundReference::Url(s) => f.write_str(s),
            BackgroundReference::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

// ============================================================================
// CODEC
// ============================================================================

/// Encode a raster as a PNG data URL.
pub fn encode_raster(image: &RgbaImage) -> Result<String, image::ImageError> {
    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    let mut out = String::with_capacity(PNG_DATA_URL_PREFIX.len() + png.len() * 4 / 3 + 4);
    out.push_str(PNG_DATA_URL_PREFIX);
    BASE64.encode_string(&png, &mut out);
    Ok(out)
}

/// Decode any `data:<mime>;base64,<payload>` image URL.
pub fn decode_raster(data_url: &str) -> Result<RgbaImage, DecodeError> {
    let rest = data_url
        .trim()
        .strip_prefix("data:")
        .ok_or(DecodeError::NotDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(DecodeError::NotDataUrl)?;
    if !header.ends_with(";base64") {
        return Err(DecodeError::NotDataUrl);
    }
    let bytes = BASE64.decode(payload.trim())?;
    Ok(image::load_from_memory(&bytes)?.into_rgba8())
}

/// Resolve a background reference to pixels. Blocking.
pub fn load_background(reference: &BackgroundReference) -> Result<RgbaImage, DecodeError> {
    match reference {
        BackgroundReference::DataUrl(url) => decode_raster(url),
        BackgroundReference::Path(path) => {
            let bytes = std::fs::read(path)?;
            Ok(image::load_from_memory(&bytes)?.into_rgba8())
        }
        BackgroundReference::Url(url) => Err(DecodeError::Unsupported(url.clone())),
    }
}

/// Outcome delivered by [`spawn_background_load`].
pub type BackgroundLoad = (BackgroundReference, Result<RgbaImage, DecodeError>);

/// Decode `reference` on a worker thread.
pub fn spawn_background_load(reference: BackgroundReference) -> mpsc::Receiver<BackgroundLoad> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let result = load_background(&reference);
        // Receiver dropped means the engine moved on; nothing to report.
        let _ = tx.send((reference, result));
    });
    rx
}

// ============================================================================
// STORES
// ============================================================================

/// Where persisted state lives. Implemented by the host.
pub trait CanvasStore {
    /// Read the initial state. `Ok(None)` when nothing was ever saved.
    fn load(&mut self) -> Result<Option<PersistedState>, PersistError>;
    fn save(&mut self, state: &PersistedState) -> Result<(), PersistError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    state: Option<PersistedState>,
    saves: usize,
}

/// In-memory store. Clones share the same slot, so a caller can keep one
/// handle and give another to the engine.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        let store = Self::default();
        store.inner.borrow_mut().state = Some(state);
        store
    }

    pub fn state(&self) -> Option<PersistedState> {
        self.inner.borrow().state.clone()
    }

    pub fn save_count(&self) -> usize {
        self.inner.borrow().saves
    }
}

impl CanvasStore for MemoryStore {
    fn load(&mut self) -> Result<Option<PersistedState>, PersistError> {
        Ok(self.inner.borrow().state.clone())
    }

    fn save(&mut self, state: &PersistedState) -> Result<(), PersistError> {
        let mut inner = self.inner.borrow_mut();
        inner.state = Some(state.clone());
        inner.saves += 1;
        Ok(())
    }
}

/// JSON file store used by the headless binary.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    load_path: Option<PathBuf>,
    save_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            load_path: Some(path.clone()),
            save_path: path,
        }
    }

    /// Read from `load_path` (if any) but write to `save_path`.
    pub fn split(load_path: Option<PathBuf>, save_path: PathBuf) -> Self {
        Self {
            load_path,
            save_path,
        }
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }
}

impl CanvasStore for JsonFileStore {
    fn load(&mut self) -> Result<Option<PersistedState>, PersistError> {
        let Some(path) = &self.load_path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&mut self, state: &PersistedState) -> Result<(), PersistError> {
        if let Some(parent) = self.save_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.save_path, serde_json::to_string_pretty(state)?)?;
        Ok(())
    }
}

// ============================================================================
// ADAPTER
// ============================================================================

/// What mounting produced.
#[derive(Debug)]
pub struct Restored {
    pub surface: RasterSurface,
    pub background: Option<BackgroundReference>,
    pub background_image: Option<RgbaImage>,
    /// True when the raster came from stored pixels rather than a background
    /// or a blank default.
    pub from_raster: bool,
}

/// Build the persisted form of a surface. A blank surface is stored as an
/// empty `canvas_data`.
pub fn persisted_state(
    surface: &RasterSurface,
    background: Option<&BackgroundReference>,
) -> Result<PersistedState, PersistError> {
    let canvas_data = if surface.is_blank() {
        String::new()
    } else {
        encode_raster(surface.image())?
    };
    Ok(PersistedState {
        canvas_data,
        width: surface.width(),
        height: surface.height(),
        background_image: background.map(BackgroundReference::as_reference).unwrap_or_default(),
    })
}

/// Bridges the engine and a [`CanvasStore`].
pub struct PersistenceAdapter {
    store: Box<dyn CanvasStore>,
}

impl PersistenceAdapter {
    pub fn new(store: Box<dyn CanvasStore>) -> Self {
        Self { store }
    }

    /// Restore the initial surface: stored raster first, else the background
    /// scaled to the stored size, else blank at `default_size`.
    pub fn load(&mut self, default_size: Size) -> Restored {
        let state = match self.store.load() {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                log::warn!("Failed to read persisted canvas state: {e}");
                PersistedState::default()
            }
        };

        let background = state.background();
        let background_image = background.as_ref().and_then(|r| match load_background(r) {
            Ok(img) => Some(img),
            Err(e) => {
                log::warn!("Background {r} could not be decoded: {e}");
                None
            }
        });

        if !state.canvas_data.is_empty() {
            match decode_raster(&state.canvas_data) {
                Ok(raster) => {
                    let size = state
                        .size()
                        .unwrap_or_else(|| Size::new(raster.width(), raster.height()));
                    let surface = if raster.dimensions() == (size.width, size.height) {
                        RasterSurface::from_image(raster)
                    } else {
                        log::warn!(
                            "Stored raster is {}×{}, declared {size}; rescaling",
                            raster.width(),
                            raster.height()
                        );
                        let mut s = RasterSurface::new(size);
                        s.draw_scaled(&raster, image::imageops::FilterType::Triangle);
                        s
                    };
                    log::info!("Restored {} canvas from stored raster", surface.size());
                    return Restored {
                        surface,
                        background,
                        background_image,
                        from_raster: true,
                    };
                }
                Err(e) => log::warn!("Stored raster could not be decoded: {e}"),
            }
        }

        let size = state.size().unwrap_or(default_size);
        let mut surface = RasterSurface::new(size);
        if let Some(bg) = &background_image {
            surface.draw_scaled(bg, image::imageops::FilterType::Triangle);
        }
        Restored {
            surface,
            background,
            background_image,
            from_raster: false,
        }
    }

    /// Write the surface out. Failures are logged and reported as `false`.
    pub fn save(&mut self, surface: &RasterSurface, background: Option<&BackgroundReference>) -> bool {
        let result = persisted_state(surface, background).and_then(|state| self.store.save(&state));
        match result {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to save canvas: {e}");
                false
            }
        }
    }
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter").finish_non_exhaustive()
    }
}
