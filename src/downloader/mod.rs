// Download pipeline: orchestration, output parsing, progress, errors

pub mod clip;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod progress;

pub use errors::AppError;
pub use models::{DownloadRequest, DownloadResult, Phase, ProgressSample};
pub use orchestrator::Downloader;
