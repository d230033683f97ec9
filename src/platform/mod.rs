use std::path::PathBuf;

/// Platform-specific defaults abstracted behind a common interface.
/// Each OS provides its own `NativePlatform` implementation so call sites
/// remain free of `#[cfg]` blocks.
pub trait Platform {
    /// Interpreter argv used by the code tool; the code is appended last.
    fn python_command() -> &'static [&'static str];

    /// Root data directory (config file, image store).
    /// Unix: `~/.crewrun`, Windows: `%APPDATA%\crewrun`.
    fn data_dir() -> PathBuf;
}

/// `CREWRUN_DATA_DIR` wins over the platform default.
fn resolve_data_dir(default: PathBuf) -> PathBuf {
    match std::env::var("CREWRUN_DATA_DIR") {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => default,
    }
}

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::NativePlatform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::NativePlatform;
