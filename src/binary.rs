// Locating and preparing the external tools

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config;
use crate::downloader::errors::AppError;
use crate::settings;

const RELEASE_URL: &str = "https://api.github.com/repos/yt-dlp/yt-dlp/releases/latest";
const FALLBACK_BINARY: &str = "yt-dlp";
const SYSTEM_PATHS: [&str; 3] = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

/// Resolves the external tools the pipeline needs. The disk implementation
/// searches caches and well-known locations; tests substitute fixed paths.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn downloader(&self) -> Result<PathBuf, AppError>;
    async fn muxer(&self) -> Option<PathBuf>;
}

pub struct DiskTools;

#[async_trait]
impl ToolProvider for DiskTools {
    async fn downloader(&self) -> Result<PathBuf, AppError> {
        require_downloader()
    }

    async fn muxer(&self) -> Option<PathBuf> {
        find_muxer()
    }
}

/// Release asset names to look for, most specific first.
fn candidate_names() -> Vec<&'static str> {
    if cfg!(target_os = "windows") {
        vec!["yt-dlp.exe"]
    } else if cfg!(target_os = "macos") {
        if cfg!(target_arch = "aarch64") {
            vec!["yt-dlp_macos_arm64", "yt-dlp_macos_aarch64", "yt-dlp_macos"]
        } else {
            vec!["yt-dlp_macos"]
        }
    } else if cfg!(target_arch = "aarch64") {
        vec!["yt-dlp_linux_arm64", "yt-dlp_linux_aarch64", FALLBACK_BINARY]
    } else {
        vec!["yt-dlp_linux", FALLBACK_BINARY]
    }
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path)
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

fn which(name: &str) -> Option<PathBuf> {
    let output = StdCommand::new("which").arg(name).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

/// Finds a runnable downloader: cached settings path first, then prepared
/// binaries under `./bin`, then system locations and `PATH`. A stale cache
/// entry is cleared.
pub fn find_downloader() -> Option<PathBuf> {
    let cached = settings::cached_binary_path();
    if let Some(path) = &cached {
        if is_executable(path) {
            return Some(path.clone());
        }
        debug!(path = %path.display(), "cached binary path is stale");
        let _ = settings::clear_cached_binary_path();
    }

    let bin_dir = config::bin_dir();
    for name in candidate_names() {
        let candidate = bin_dir.join(name);
        if is_executable(&candidate) {
            let _ = settings::set_cached_binary_path(&candidate);
            return Some(candidate);
        }
    }

    for dir in SYSTEM_PATHS {
        let candidate = Path::new(dir).join(FALLBACK_BINARY);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }

    which(FALLBACK_BINARY)
}

pub fn require_downloader() -> Result<PathBuf, AppError> {
    find_downloader().ok_or_else(|| AppError::BinaryNotFound {
        message: "yt-dlp binary not found. Run 'ytdwn prepare' first.".to_string(),
    })
}

/// The muxing tool is optional for plain downloads; its absence only
/// disables `--ffmpeg-location` and clipping.
pub fn find_muxer() -> Option<PathBuf> {
    for dir in SYSTEM_PATHS {
        let candidate = Path::new(dir).join("ffmpeg");
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    which("ffmpeg")
}

fn pick_asset(release: &Release) -> Result<&ReleaseAsset, AppError> {
    let candidates = candidate_names();
    release
        .assets
        .iter()
        .find(|asset| candidates.contains(&asset.name.as_str()))
        .or_else(|| {
            release
                .assets
                .iter()
                .find(|asset| asset.name == FALLBACK_BINARY)
        })
        .ok_or_else(|| AppError::BinaryDownload {
            message: "no suitable release asset for this platform".to_string(),
        })
}

/// Downloads the latest downloader release into `./bin` and caches the
/// resulting path.
pub async fn download_latest() -> Result<PathBuf, AppError> {
    let client = reqwest::Client::builder()
        .user_agent(config::APP_NAME)
        .build()
        .map_err(|e| AppError::BinaryDownload {
            message: e.to_string(),
        })?;

    let release: Release = client
        .get(RELEASE_URL)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| AppError::BinaryDownload {
            message: e.to_string(),
        })?
        .json()
        .await
        .map_err(|e| AppError::BinaryDownload {
            message: e.to_string(),
        })?;

    let asset = pick_asset(&release)?;
    let target = config::bin_dir().join(&asset.name);

    if is_executable(&target) {
        let _ = settings::set_cached_binary_path(&target);
        return Ok(target);
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|_| AppError::DirectoryCreate {
            path: parent.display().to_string(),
        })?;
    }

    debug!(asset = %asset.name, "fetching downloader release asset");
    let bytes = client
        .get(&asset.browser_download_url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| AppError::BinaryDownload {
            message: e.to_string(),
        })?
        .bytes()
        .await
        .map_err(|e| AppError::BinaryDownload {
            message: e.to_string(),
        })?;

    fs::write(&target, &bytes).map_err(|_| AppError::FileWrite {
        path: target.display().to_string(),
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(&target, fs::Permissions::from_mode(0o755)) {
            warn!(path = %target.display(), error = %e, "could not mark binary executable");
        }
    }

    let _ = settings::set_cached_binary_path(&target);
    Ok(target)
}
