use super::*;

fn ctrl() -> Modifiers {
    Modifiers {
        ctrl: true,
        ..Modifiers::NONE
    }
}

#[test]
fn ctrl_z_undoes() {
    assert_eq!(shortcut(Key::Char('z'), ctrl()), Some(Shortcut::Undo));
}

#[test]
fn meta_shift_z_redoes() {
    let mods = Modifiers {
        meta: true,
        shift: true,
        ..Modifiers::NONE
    };
    assert_eq!(shortcut(Key::Char('Z'), mods), Some(Shortcut::Redo));
}

#[test]
fn ctrl_y_redoes() {
    assert_eq!(shortcut(Key::Char('y'), ctrl()), Some(Shortcut::Redo));
}

#[test]
fn plain_z_is_not_a_shortcut() {
    assert_eq!(shortcut(Key::Char('z'), Modifiers::NONE), None);
    assert_eq!(shortcut(Key::Enter, ctrl()), None);
}

#[test]
fn key_names_parse() {
    assert_eq!(Key::from_name("Enter"), Some(Key::Enter));
    assert_eq!(Key::from_name("esc"), Some(Key::Escape));
    assert_eq!(Key::from_name("alt"), Some(Key::Modifier(ModifierKey::Alt)));
    assert_eq!(Key::from_name("Q"), Some(Key::Char('Q')));
    assert_eq!(Key::from_name("nope"), None);
}

#[test]
fn modifier_key_deserializes_lowercase() {
    let k: ModifierKey = serde_json::from_str("\"meta\"").unwrap();
    assert_eq!(k, ModifierKey::Meta);
    assert!(Modifiers { meta: true, ..Modifiers::NONE }.is_held(k));
}
