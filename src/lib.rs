// ytdwn - fetch audio/video from a URL via an external downloader,
// with live progress and typed failures

pub mod binary;
pub mod cli;
pub mod config;
pub mod downloader;
pub mod settings;
pub mod timestamp;

pub use downloader::{AppError, DownloadRequest, DownloadResult, Downloader};
pub use timestamp::{ClipRange, Timestamp};
