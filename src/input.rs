use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

/// Modifier key state accompanying an input event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Ctrl on most platforms, Cmd on macOS. Either counts.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }

    pub fn is_held(&self, key: ModifierKey) -> bool {
        match key {
            ModifierKey::Shift => self.shift,
            ModifierKey::Ctrl => self.ctrl,
            ModifierKey::Alt => self.alt,
            ModifierKey::Meta => self.meta,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKey {
    Shift,
    Ctrl,
    Alt,
    Meta,
}

impl ModifierKey {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "shift" => Some(ModifierKey::Shift),
            "ctrl" | "control" => Some(ModifierKey::Ctrl),
            "alt" | "option" => Some(ModifierKey::Alt),
            "meta" | "cmd" | "super" => Some(ModifierKey::Meta),
            _ => None,
        }
    }
}

/// Keys the engine reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Modifier(ModifierKey),
}

impl Key {
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        match lower.as_str() {
            "enter" | "return" => Some(Key::Enter),
            "escape" | "esc" => Some(Key::Escape),
            "backspace" => Some(Key::Backspace),
            _ => ModifierKey::from_name(&lower).map(Key::Modifier).or_else(|| {
                let mut chars = name.trim().chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Key::Char(c)),
                    _ => None,
                }
            }),
        }
    }
}

/// Keyboard shortcuts handled regardless of the active tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shortcut {
    Undo,
    Redo,
}

/// Map a key press to a history shortcut: Cmd+Z undo, Cmd+Shift+Z or
/// Ctrl+Y redo.
pub fn shortcut(key: Key, mods: Modifiers) -> Option<Shortcut> {
    if !mods.command() {
        return None;
    }
    match key {
        Key::Char(c) if c.eq_ignore_ascii_case(&'z') => Some(if mods.shift {
            Shortcut::Redo
        } else {
            Shortcut::Undo
        }),
        Key::Char(c) if c.eq_ignore_ascii_case(&'y') && mods.ctrl && !mods.shift => {
            Some(Shortcut::Redo)
        }
        _ => None,
    }
}

/// Pointer cursor the host should show over a position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CursorHint {
    #[default]
    Default,
    Crosshair,
    Text,
    Move,
    ResizeDiagonal,
    ResizeVertical,
}
