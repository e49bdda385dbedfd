use super::*;
use image::Rgba;

fn checker() -> RgbaImage {
    RgbaImage::from_fn(6, 4, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

#[test]
fn encoded_raster_is_png_data_url() {
    let url = encode_raster(&checker()).unwrap();
    assert!(url.starts_with(PNG_DATA_URL_PREFIX));
    assert_eq!(decode_raster(&url).unwrap(), checker());
}

#[test]
fn decode_rejects_non_data_urls() {
    assert!(matches!(decode_raster("hello"), Err(DecodeError::NotDataUrl)));
    assert!(matches!(
        decode_raster("data:image/png,rawbytes"),
        Err(DecodeError::NotDataUrl)
    ));
    assert!(matches!(
        decode_raster("data:image/png;base64,@@@"),
        Err(DecodeError::Base64(_))
    ));
}

#[test]
fn persisted_state_uses_camel_case_keys() {
    let state = PersistedState {
        canvas_data: String::new(),
        width: 800,
        height: 400,
        background_image: "bg.png".into(),
    };
    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["canvasData"], "");
    assert_eq!(json["backgroundImage"], "bg.png");
    assert_eq!(json["width"], 800);
}

#[test]
fn missing_fields_default() {
    let state: PersistedState = serde_json::from_str(r#"{"width": 10}"#).unwrap();
    assert_eq!(state.width, 10);
    assert_eq!(state.size(), None);
    assert!(state.background().is_none());
}

#[test]
fn background_reference_classification() {
    assert_eq!(BackgroundReference::parse("  "), None);
    assert!(matches!(
        BackgroundReference::parse("data:image/png;base64,AAAA"),
        Some(BackgroundReference::DataUrl(_))
    ));
    assert!(matches!(
        BackgroundReference::parse("HTTPS://example.com/a.png"),
        Some(BackgroundReference::Url(_))
    ));
    assert_eq!(
        BackgroundReference::parse("file:///tmp/a.png"),
        Some(BackgroundReference::Path(PathBuf::from("/tmp/a.png")))
    );
}

#[test]
fn remote_backgrounds_are_unsupported() {
    let r = BackgroundReference::Url("https://example.com/a.png".into());
    assert!(matches!(load_background(&r), Err(DecodeError::Unsupported(_))));
}

#[test]
fn background_decodes_on_worker_thread() {
    let url = encode_raster(&checker()).unwrap();
    let rx = spawn_background_load(BackgroundReference::DataUrl(url));
    let (_, result) = rx.recv().unwrap();
    assert_eq!(result.unwrap().dimensions(), (6, 4));
}

#[test]
fn adapter_defaults_to_blank_surface() {
    let mut adapter = PersistenceAdapter::new(Box::new(MemoryStore::new()));
    let restored = adapter.load(Size::new(800, 400));
    assert_eq!(restored.surface.size(), Size::new(800, 400));
    assert!(restored.surface.is_blank());
    assert!(!restored.from_raster);
}

#[test]
fn adapter_prefers_stored_raster() {
    let state = PersistedState {
        canvas_data: encode_raster(&checker()).unwrap(),
        width: 6,
        height: 4,
        background_image: String::new(),
    };
    let mut adapter = PersistenceAdapter::new(Box::new(MemoryStore::with_state(state)));
    let restored = adapter.load(Size::default());
    assert!(restored.from_raster);
    assert_eq!(restored.surface.image(), &checker());
}

#[test]
fn adapter_lays_background_when_no_raster() {
    let bg = RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255]));
    let state = PersistedState {
        canvas_data: String::new(),
        width: 10,
        height: 10,
        background_image: encode_raster(&bg).unwrap(),
    };
    let mut adapter = PersistenceAdapter::new(Box::new(MemoryStore::with_state(state)));
    let restored = adapter.load(Size::default());
    assert!(!restored.from_raster);
    assert!(restored.background.is_some());
    assert_eq!(restored.surface.size(), Size::new(10, 10));
    assert_eq!(restored.surface.pixel(9, 9), Some(Rgba([0, 255, 0, 255])));
}

#[test]
fn corrupt_raster_falls_back_to_declared_size() {
    let state = PersistedState {
        canvas_data: "data:image/png;base64,AAAA".into(),
        width: 30,
        height: 20,
        background_image: String::new(),
    };
    let mut adapter = PersistenceAdapter::new(Box::new(MemoryStore::with_state(state)));
    let restored = adapter.load(Size::default());
    assert_eq!(restored.surface.size(), Size::new(30, 20));
    assert!(restored.surface.is_blank());
}

#[test]
fn save_writes_through_shared_memory_store() {
    let store = MemoryStore::new();
    let mut adapter = PersistenceAdapter::new(Box::new(store.clone()));
    let surface = RasterSurface::from_image(checker());
    let bg = BackgroundReference::Path(PathBuf::from("bg.png"));
    assert!(adapter.save(&surface, Some(&bg)));
    assert_eq!(store.save_count(), 1);
    let saved = store.state().unwrap();
    assert_eq!((saved.width, saved.height), (6, 4));
    assert_eq!(saved.background_image, "bg.png");
    assert_eq!(decode_raster(&saved.canvas_data).unwrap(), checker());
}

#[test]
fn json_file_store_round_trip() {
    let path = std::env::temp_dir().join(format!("sketch-canvas-{}.json", uuid::Uuid::new_v4()));
    let mut store = JsonFileStore::new(&path);
    assert!(store.load().unwrap().is_none());
    let state = PersistedState {
        canvas_data: String::new(),
        width: 3,
        height: 2,
        background_image: String::new(),
    };
    store.save(&state).unwrap();
    assert_eq!(store.load().unwrap(), Some(state));
    let _ = std::fs::remove_file(path);
}

#[test]
fn blank_surface_is_persisted_without_raster() {
    let surface = RasterSurface::new(Size::new(6, 4));
    let state = persisted_state(&surface, None).unwrap();
    assert_eq!(state.canvas_data, "");
    assert_eq!(state.size(), Some(Size::new(6, 4)));
}
