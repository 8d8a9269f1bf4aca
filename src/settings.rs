// Persisted user settings (~/.ytdwn.json)

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::downloader::errors::AppError;

const SETTINGS_FILE: &str = ".ytdwn.json";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_path: Option<PathBuf>,
}

fn settings_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SETTINGS_FILE)
}

// A missing or unreadable settings file is an empty settings object.
fn load_from(path: &Path) -> Settings {
    fs::read_to_string(path)
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_default()
}

fn save_to(path: &Path, settings: &Settings) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(settings).map_err(|_| AppError::FileWrite {
        path: path.display().to_string(),
    })?;
    fs::write(path, json).map_err(|_| AppError::FileWrite {
        path: path.display().to_string(),
    })
}

pub fn load() -> Settings {
    load_from(&settings_path())
}

fn save(settings: &Settings) -> Result<(), AppError> {
    save_to(&settings_path(), settings)
}

/// The configured download directory, falling back to the current directory.
pub fn download_dir() -> PathBuf {
    load()
        .download_dir
        .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

pub fn set_download_dir(dir: &Path) -> Result<(), AppError> {
    let resolved = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(dir)
    };
    let mut settings = load();
    settings.download_dir = Some(resolved);
    save(&settings)
}

pub fn reset_download_dir() -> Result<(), AppError> {
    let mut settings = load();
    settings.download_dir = None;
    save(&settings)
}

pub fn cached_binary_path() -> Option<PathBuf> {
    load().binary_path
}

pub fn set_cached_binary_path(path: &Path) -> Result<(), AppError> {
    let mut settings = load();
    settings.binary_path = Some(path.to_path_buf());
    save(&settings)
}

pub fn clear_cached_binary_path() -> Result<(), AppError> {
    let mut settings = load();
    settings.binary_path = None;
    save(&settings)
}
