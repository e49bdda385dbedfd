use super::*;
use crate::io::MemoryStore;

fn mounted() -> DrawingEngine {
    let settings = EngineSettings {
        font_family: String::new(),
        ..EngineSettings::default()
    };
    let mut engine = DrawingEngine::new(settings);
    engine.mount(Box::new(MemoryStore::new()));
    engine
}

fn alpha(engine: &DrawingEngine, x: u32, y: u32) -> u8 {
    engine.surface().and_then(|s| s.pixel(x, y)).map_or(0, |p| p[3])
}

#[test]
fn hex_colors_parse_with_and_without_alpha() {
    assert_eq!(parse_hex_color("#ff0000"), Some(Color32::RED));
    assert_eq!(
        parse_hex_color("00ff0080"),
        Some(Color32::from_rgba_unmultiplied(0, 255, 0, 128))
    );
    assert_eq!(parse_hex_color("#fff"), None);
    assert_eq!(parse_hex_color("#gg0000"), None);
}

#[test]
fn script_skips_comments_and_blank_lines() {
    let script = "# setup\n\ntool eraser\nwidth 6\n  # indented comment\nundo\n";
    assert_eq!(
        parse_script(script).unwrap(),
        vec![Command::Tool(Tool::Eraser), Command::Width(6.0), Command::Undo]
    );
}

#[test]
fn pointer_commands_carry_modifiers() {
    let cmds = parse_script("down 10 20 shift+alt\nmove 3.5 4").unwrap();
    assert_eq!(
        cmds[0],
        Command::Down(
            pos2(10.0, 20.0),
            Modifiers { shift: true, alt: true, ..Modifiers::NONE }
        )
    );
    assert_eq!(cmds[1], Command::Move(pos2(3.5, 4.0), Modifiers::NONE));
}

#[test]
fn type_keeps_inner_spaces() {
    let cmds = parse_script("type hello  world").unwrap();
    assert_eq!(cmds, vec![Command::Type("hello  world".to_string())]);
}

#[test]
fn modifier_key_holds_itself() {
    let cmds = parse_script("key alt").unwrap();
    assert_eq!(
        cmds,
        vec![Command::KeyDown(
            Key::Modifier(ModifierKey::Alt),
            Modifiers { alt: true, ..Modifiers::NONE }
        )]
    );
}

#[test]
fn errors_report_line_numbers() {
    assert_eq!(
        parse_script("tool pen\nscribble 1 2"),
        Err(ScriptError::UnknownCommand {
            line: 2,
            command: "scribble".to_string()
        })
    );
    assert!(matches!(
        parse_script("\n\ndown 10"),
        Err(ScriptError::BadArgument { line: 3, .. })
    ));
    assert!(matches!(
        parse_script("tool brush"),
        Err(ScriptError::BadArgument { line: 1, .. })
    ));
    assert!(matches!(
        parse_script("move 1 2 hyper"),
        Err(ScriptError::BadArgument { line: 1, .. })
    ));
}

#[test]
fn replay_draws_and_undoes() {
    let mut engine = mounted();
    let cmds = parse_script("color #ff0000\nwidth 4\ndown 10 10\nmove 60 10\nup 60 10").unwrap();
    replay(&mut engine, &cmds, false);
    assert_eq!(alpha(&engine, 35, 10), 255);
    assert!(engine.can_undo());

    replay(&mut engine, &parse_script("key z ctrl").unwrap(), false);
    assert!(engine.surface().unwrap().is_blank());
    assert!(engine.can_redo());
}

#[test]
fn replay_resize_follows_aspect_ratio() {
    let mut engine = mounted();
    replay(&mut engine, &parse_script("resize 50 10").unwrap(), false);
    assert_eq!(engine.size(), Some(crate::canvas::Size::new(850, 425)));
}

#[test]
fn replay_text_flattens_on_tool_change() {
    let mut engine = mounted();
    let script = "tool text\ndown 100 100\nup 100 100\ntype hi\nkey enter\ntool pen";
    replay(&mut engine, &parse_script(script).unwrap(), false);
    assert!(engine.overlay().unwrap().is_empty());
    assert!(!engine.surface().unwrap().is_blank());
}

#[test]
fn flush_after_replay_lands_unconfirmed_text() {
    let mut engine = mounted();
    let script = "tool text\ndown 100 100\nup 100 100\ntype hi";
    replay(&mut engine, &parse_script(script).unwrap(), false);
    assert!(engine.surface().unwrap().is_blank());
    engine.flush();
    assert!(engine.overlay().unwrap().is_empty());
    assert_eq!(alpha(&engine, 105, 110), 255);
}
