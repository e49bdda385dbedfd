use egui::pos2;
use sketch_canvas::{
    DrawingEngine, EngineSettings, JsonFileStore, MemoryStore, Modifiers, Size, Tool,
};

fn settings() -> EngineSettings {
    EngineSettings {
        font_family: String::new(),
        ..EngineSettings::default()
    }
}

fn stroke(engine: &mut DrawingEngine, from: (f32, f32), to: (f32, f32)) {
    engine.on_pointer_down(pos2(from.0, from.1), Modifiers::NONE);
    engine.on_pointer_move(pos2(to.0, to.1), Modifiers::NONE);
    engine.on_pointer_up(pos2(to.0, to.1), Modifiers::NONE);
}

#[test]
fn drawing_survives_remount() {
    let store = MemoryStore::new();

    let mut engine = DrawingEngine::new(settings());
    engine.mount(Box::new(store.clone()));
    stroke(&mut engine, (20.0, 20.0), (120.0, 20.0));
    let drawn = engine.surface().unwrap().image().clone();
    engine.unmount();

    let saved = store.state().unwrap();
    assert_eq!((saved.width, saved.height), (800, 400));

    let mut remounted = DrawingEngine::new(settings());
    remounted.mount(Box::new(store.clone()));
    assert_eq!(remounted.size(), Some(Size::new(800, 400)));
    assert_eq!(remounted.surface().unwrap().image(), &drawn);
    // A restored canvas starts with a single undo entry.
    assert!(!remounted.can_undo());
}

#[test]
fn text_is_flattened_before_unmount_saves() {
    let store = MemoryStore::new();
    let mut engine = DrawingEngine::new(settings());
    engine.mount(Box::new(store.clone()));
    engine.select_tool(Tool::Text);
    engine.on_pointer_down(pos2(100.0, 100.0), Modifiers::NONE);
    engine.on_pointer_up(pos2(100.0, 100.0), Modifiers::NONE);
    for c in "hi".chars() {
        engine.on_key_down(sketch_canvas::Key::Char(c), Modifiers::NONE);
    }
    engine.unmount();

    let mut remounted = DrawingEngine::new(settings());
    remounted.mount(Box::new(store));
    assert!(!remounted.surface().unwrap().is_blank());
}

#[test]
fn json_file_store_round_trips_through_disk() {
    let dir = std::env::temp_dir().join(format!("sketch-canvas-it-{}", uuid::Uuid::new_v4()));
    let path = dir.join("canvas.json");

    let mut engine = DrawingEngine::new(settings());
    engine.mount(Box::new(JsonFileStore::new(&path)));
    stroke(&mut engine, (10.0, 300.0), (300.0, 300.0));
    let drawn = engine.surface().unwrap().image().clone();
    engine.unmount();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"canvasData\": \"data:image/png;base64,"));

    let mut remounted = DrawingEngine::new(settings());
    remounted.mount(Box::new(JsonFileStore::new(&path)));
    assert_eq!(remounted.surface().unwrap().image(), &drawn);
    remounted.unmount();

    let _ = std::fs::remove_dir_all(dir);
}
