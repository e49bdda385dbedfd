//! Session logger for the headless binary.
//!
//! Routes the `log` facade through `env_logger`, mirroring every record to
//! stderr and to a session file in the platform data directory. The file is
//! **truncated at each launch**, so it only holds the most recent session.
//!
//! Log location:
//!   Windows:  `%APPDATA%\sketch-canvas\sketch-canvas.log`
//!   Linux:    `~/.local/share/sketch-canvas/sketch-canvas.log`
//!   macOS:    `~/Library/Application Support/sketch-canvas/sketch-canvas.log`
//!
//! `RUST_LOG` overrides the default level as usual.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::OnceLock;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Returns the path to the current session log file, if one was opened.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Writes each record to stderr and, when available, the session file.
struct SessionSink {
    file: Option<File>,
}

impl Write for SessionSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(file) = &mut self.file {
            // A failing log file must never take the process down.
            let _ = file.write_all(buf);
        }
        io::stderr().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = &mut self.file {
            let _ = file.flush();
        }
        io::stderr().flush()
    }
}

/// Initialise logging. Must be called once, before any logging.
///
/// * Creates (or truncates) the session log file.
/// * Installs a panic hook that records the panic before the default
///   handler runs.
pub fn init(verbose: bool) {
    let file = open_session_file();

    let default_level = if verbose { "debug" } else { "info" };
    let env = env_logger::Env::default().default_filter_or(default_level);
    let result = env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(Box::new(SessionSink { file })))
        .try_init();
    if let Err(e) = result {
        eprintln!("[logger] Logger already initialised: {e}");
        return;
    }

    log::info!(
        "=== sketch-canvas {} session started ===",
        env!("CARGO_PKG_VERSION")
    );
    if let Some(path) = log_path() {
        log::info!("Log file: {}", path.display());
    }

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("PANIC: {info}");
        prev(info);
    }));
}

fn open_session_file() -> Option<File> {
    let path = dirs::data_dir()?
        .join("sketch-canvas")
        .join("sketch-canvas.log");
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
    {
        Ok(f) => {
            let _ = LOG_PATH.set(path);
            Some(f)
        }
        Err(e) => {
            eprintln!("[logger] Failed to open log file {}: {e}", path.display());
            None
        }
    }
}
