use std::path::PathBuf;

use super::{Platform, resolve_data_dir};

pub struct NativePlatform;

impl Platform for NativePlatform {
    fn python_command() -> &'static [&'static str] {
        &["python3", "-c"]
    }

    fn data_dir() -> PathBuf {
        resolve_data_dir(
            dirs::home_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(".crewrun"),
        )
    }
}
