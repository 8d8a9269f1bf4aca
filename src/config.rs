// Application-wide constants and path templates

use std::env;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "ytdwn";
pub const APP_TAGLINE: &str = "YouTube to MP3/MP4 • Fast & Simple";

pub const DEFAULT_AUDIO_FORMAT: &str = "mp3";
/// yt-dlp's highest VBR quality.
pub const DEFAULT_AUDIO_QUALITY: &str = "0";

pub const CONCURRENT_FRAGMENTS: &str = "8";

/// Containers that select the audio+video extraction path. Anything else is
/// treated as an audio format and extracted with `-x`.
pub const VIDEO_FORMATS: [&str; 5] = ["mp4", "mkv", "webm", "avi", "mov"];

pub fn is_video_format(format: &str) -> bool {
    let lower = format.to_lowercase();
    VIDEO_FORMATS.contains(&lower.as_str())
}

/// Output template handed to the downloader: title plus native extension
/// inside the download directory.
pub fn output_template(download_dir: &Path) -> String {
    format!("{}/%(title)s.%(ext)s", download_dir.display())
}

/// Directory where prepared downloader binaries live.
pub fn bin_dir() -> PathBuf {
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("bin")
}
