use std::path::PathBuf;

use super::{Platform, resolve_data_dir};

pub struct NativePlatform;

impl Platform for NativePlatform {
    fn python_command() -> &'static [&'static str] {
        &["python", "-c"]
    }

    fn data_dir() -> PathBuf {
        resolve_data_dir(
            dirs::config_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("crewrun"),
        )
    }
}
