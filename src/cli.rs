// ============================================================================
// sketch-canvas CLI: headless replay of canvas input scripts
// ============================================================================
//
// Usage examples:
//   sketch-canvas --state canvas.json --script strokes.txt
//   sketch-canvas -s canvas.json -x strokes.txt -o edited.json --export-png out.png
//   sketch-canvas --list-fonts
//
// A script is one command per line; blank lines and `#` comments are skipped:
//
//   tool pen                 color #ff0000          width 4
//   down 10 10               move 50 20             up 50 20
//   font 32                  type hello             key enter
//   key z ctrl               keyup alt              dblclick 12 40
//   resize 50 10             background file.png    undo / redo / clear
//   leave                    frame
//
// Trailing modifier names (shift, ctrl, alt, meta) on pointer and key
// commands are held for that event.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use egui::{Color32, Pos2, pos2};

use crate::engine::DrawingEngine;
use crate::io::JsonFileStore;
use crate::input::{Key, ModifierKey, Modifiers};
use crate::components::tools::Tool;
use crate::ops::text::enumerate_system_fonts;
use crate::settings::EngineSettings;

#[cfg(test)]
#[path = "cli_test.rs"]
mod cli_test;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// sketch-canvas headless replay.
///
/// Loads a persisted canvas, replays recorded input against it and writes the
/// result back.
#[derive(Parser, Debug)]
#[command(
    name = "sketch-canvas",
    version,
    about = "Replay drawing input against a persisted sketch canvas",
    long_about = "Load a canvas state file, replay a line-based input script against it\n\
                  and save the updated state. The raster can also be exported as PNG.\n\n\
                  Example:\n  \
                  sketch-canvas --state canvas.json --script strokes.txt --export-png out.png"
)]
pub struct CliArgs {
    /// Canvas state JSON (canvasData, width, height, backgroundImage).
    /// Missing files start a fresh canvas.
    #[arg(short, long, value_name = "STATE.json", required_unless_present = "list_fonts")]
    pub state: Option<PathBuf>,

    /// Input script to replay. If omitted the canvas is only loaded and re-saved.
    #[arg(short = 'x', long, value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Write the updated state here instead of back to --state.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Also write the final raster as a PNG file.
    #[arg(long, value_name = "FILE.png")]
    pub export_png: Option<PathBuf>,

    /// Engine settings TOML. Defaults to the platform config directory.
    #[arg(long, value_name = "SETTINGS.toml")]
    pub settings: Option<PathBuf>,

    /// Print the system font families usable for text and exit.
    #[arg(long)]
    pub list_fonts: bool,

    /// Debug-level logging and a per-command trace.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Script commands
// ============================================================================

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ScriptError {
    #[error("line {line}: unknown command '{command}'")]
    UnknownCommand { line: usize, command: String },
    #[error("line {line}: {message}")]
    BadArgument { line: usize, message: String },
}

/// One replayable input event.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Tool(Tool),
    Color(Color32),
    Width(f32),
    FontSize(f32),
    Down(Pos2, Modifiers),
    Move(Pos2, Modifiers),
    Up(Pos2, Modifiers),
    Leave,
    DoubleClick(Pos2),
    Type(String),
    KeyDown(Key, Modifiers),
    KeyUp(Key, Modifiers),
    Undo,
    Redo,
    Clear,
    /// Drag the resize handle by `(dx, dy)` from the bottom-right corner.
    Resize(f32, f32),
    Background(String),
    Frame,
}

/// Parse `#rrggbb` or `#rrggbbaa` (the `#` is optional).
pub fn parse_hex_color(text: &str) -> Option<Color32> {
    let hex = text.trim().trim_start_matches('#');
    if !hex.is_ascii() || !(hex.len() == 6 || hex.len() == 8) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let (r, g, b) = (byte(0)?, byte(2)?, byte(4)?);
    let a = if hex.len() == 8 { byte(6)? } else { 255 };
    Some(Color32::from_rgba_unmultiplied(r, g, b, a))
}

fn hold(mods: &mut Modifiers, key: ModifierKey) {
    match key {
        ModifierKey::Shift => mods.shift = true,
        ModifierKey::Ctrl => mods.ctrl = true,
        ModifierKey::Alt => mods.alt = true,
        ModifierKey::Meta => mods.meta = true,
    }
}

fn parse_modifiers(line: usize, names: &[&str]) -> Result<Modifiers, ScriptError> {
    let mut mods = Modifiers::NONE;
    for name in names.iter().flat_map(|n| n.split('+')) {
        let key = ModifierKey::from_name(name).ok_or_else(|| ScriptError::BadArgument {
            line,
            message: format!("unknown modifier '{name}'"),
        })?;
        hold(&mut mods, key);
    }
    Ok(mods)
}

fn parse_number(line: usize, arg: Option<&&str>, what: &str) -> Result<f32, ScriptError> {
    let bad = || ScriptError::BadArgument {
        line,
        message: format!("expected {what}"),
    };
    let value: f32 = arg.ok_or_else(bad)?.parse().map_err(|_| bad())?;
    if value.is_finite() { Ok(value) } else { Err(bad()) }
}

fn parse_point(line: usize, args: &[&str]) -> Result<Pos2, ScriptError> {
    let x = parse_number(line, args.first(), "x coordinate")?;
    let y = parse_number(line, args.get(1), "y coordinate")?;
    Ok(pos2(x, y))
}

fn parse_pointer(line: usize, args: &[&str]) -> Result<(Pos2, Modifiers), ScriptError> {
    let pos = parse_point(line, args)?;
    let mods = parse_modifiers(line, args.get(2..).unwrap_or_default())?;
    Ok((pos, mods))
}

fn parse_key(line: usize, args: &[&str]) -> Result<(Key, Modifiers), ScriptError> {
    let name = args.first().ok_or_else(|| ScriptError::BadArgument {
        line,
        message: "expected a key name".to_string(),
    })?;
    let key = Key::from_name(name).ok_or_else(|| ScriptError::BadArgument {
        line,
        message: format!("unknown key '{name}'"),
    })?;
    let mut mods = parse_modifiers(line, &args[1..])?;
    // A modifier pressed on its own counts as held for its own event.
    if let Key::Modifier(m) = key {
        hold(&mut mods, m);
    }
    Ok((key, mods))
}

/// Parse a whole script. Line numbers in errors are 1-based.
pub fn parse_script(source: &str) -> Result<Vec<Command>, ScriptError> {
    let mut commands = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (word, rest) = trimmed
            .split_once(char::is_whitespace)
            .map(|(w, r)| (w, r.trim()))
            .unwrap_or((trimmed, ""));
        let args: Vec<&str> = rest.split_whitespace().collect();
        let bad = |message: &str| ScriptError::BadArgument {
            line,
            message: message.to_string(),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "tool" => Command::Tool(
                args.first()
                    .and_then(|n| Tool::from_name(n))
                    .ok_or_else(|| bad("unknown tool"))?,
            ),
            "color" | "colour" => Command::Color(
                args.first()
                    .and_then(|c| parse_hex_color(c))
                    .ok_or_else(|| bad("expected #rrggbb or #rrggbbaa"))?,
            ),
            "width" => Command::Width(parse_number(line, args.first(), "a stroke width")?),
            "font" => Command::FontSize(parse_number(line, args.first(), "a font size")?),
            "down" => {
                let (pos, mods) = parse_pointer(line, &args)?;
                Command::Down(pos, mods)
            }
            "move" => {
                let (pos, mods) = parse_pointer(line, &args)?;
                Command::Move(pos, mods)
            }
            "up" => {
                let (pos, mods) = parse_pointer(line, &args)?;
                Command::Up(pos, mods)
            }
            "leave" => Command::Leave,
            "dblclick" => Command::DoubleClick(parse_point(line, &args)?),
            // Everything after the command word, spaces included.
            "type" => Command::Type(rest.to_string()),
            "key" => {
                let (key, mods) = parse_key(line, &args)?;
                Command::KeyDown(key, mods)
            }
            "keyup" => {
                let (key, mods) = parse_key(line, &args)?;
                Command::KeyUp(key, mods)
            }
            "undo" => Command::Undo,
            "redo" => Command::Redo,
            "clear" => Command::Clear,
            "resize" => Command::Resize(
                parse_number(line, args.first(), "dx")?,
                parse_number(line, args.get(1), "dy")?,
            ),
            "background" => Command::Background(rest.to_string()),
            "frame" => Command::Frame,
            other => {
                return Err(ScriptError::UnknownCommand {
                    line,
                    command: other.to_string(),
                });
            }
        };
        commands.push(command);
    }
    Ok(commands)
}

/// Feed `commands` to a mounted engine, running a frame after each one so
/// deferred work lands in order.
pub fn replay(engine: &mut DrawingEngine, commands: &[Command], verbose: bool) {
    for command in commands {
        if verbose {
            log::debug!("replay: {command:?}");
        }
        match command {
            Command::Tool(tool) => engine.select_tool(*tool),
            Command::Color(color) => engine.set_color(*color),
            Command::Width(width) => engine.set_width(*width),
            Command::FontSize(size) => engine.set_font_size(*size),
            Command::Down(pos, mods) => engine.on_pointer_down(*pos, *mods),
            Command::Move(pos, mods) => engine.on_pointer_move(*pos, *mods),
            Command::Up(pos, mods) => engine.on_pointer_up(*pos, *mods),
            Command::Leave => engine.on_pointer_leave(),
            Command::DoubleClick(pos) => engine.on_double_click(*pos),
            Command::Type(text) => {
                for c in text.chars() {
                    engine.on_key_down(Key::Char(c), Modifiers::NONE);
                }
            }
            Command::KeyDown(key, mods) => engine.on_key_down(*key, *mods),
            Command::KeyUp(key, mods) => engine.on_key_up(*key, *mods),
            Command::Undo => {
                engine.undo();
            }
            Command::Redo => {
                engine.redo();
            }
            Command::Clear => engine.clear_all(),
            Command::Resize(dx, dy) => {
                let Some(size) = engine.size() else {
                    continue;
                };
                let corner = pos2(size.width as f32, size.height as f32);
                engine.begin_resize(corner);
                engine.update_resize(corner + egui::vec2(*dx, *dy));
                engine.on_frame();
                engine.end_resize();
            }
            Command::Background(reference) => engine.set_background(reference),
            Command::Frame => {}
        }
        engine.on_frame();
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    if args.list_fonts {
        for family in enumerate_system_fonts() {
            println!("{family}");
        }
        return ExitCode::SUCCESS;
    }

    let Some(state_path) = args.state.clone() else {
        eprintln!("error: --state is required.");
        return ExitCode::FAILURE;
    };

    let commands = match &args.script {
        Some(path) => {
            let source = match std::fs::read_to_string(path) {
                Ok(src) => src,
                Err(e) => {
                    eprintln!("error: could not read script '{}': {}", path.display(), e);
                    return ExitCode::FAILURE;
                }
            };
            match parse_script(&source) {
                Ok(commands) => commands,
                Err(e) => {
                    eprintln!("error: {}: {}", path.display(), e);
                    return ExitCode::FAILURE;
                }
            }
        }
        None => Vec::new(),
    };

    let settings = match &args.settings {
        Some(path) => EngineSettings::load_or_default(path),
        None => EngineSettings::load(),
    };

    let save_path = args.output.clone().unwrap_or_else(|| state_path.clone());
    let store = JsonFileStore::split(Some(state_path), save_path.clone());

    let mut engine = DrawingEngine::new(settings);
    engine.mount(Box::new(store));
    replay(&mut engine, &commands, args.verbose);
    // Pending text must land in the raster before it is exported.
    engine.flush();

    if let Some(png_path) = &args.export_png {
        let exported = engine
            .surface()
            .map(|s| s.image().save_with_format(png_path, image::ImageFormat::Png));
        if let Some(Err(e)) = exported {
            eprintln!("error: could not export '{}': {}", png_path.display(), e);
            engine.unmount();
            return ExitCode::FAILURE;
        }
    }

    if args.verbose {
        if let Some(state) = engine.persisted_state() {
            println!(
                "{}x{} canvas, {} bytes of drawing",
                state.width,
                state.height,
                state.canvas_data.len()
            );
        }
    }

    // Unmounting writes the final state.
    engine.unmount();
    if args.verbose {
        println!("  → {}", save_path.display());
    }
    ExitCode::SUCCESS
}

