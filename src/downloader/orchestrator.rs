// Download orchestration: spawn the downloader, fold its output into a result

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::config;

use super::clip;
use super::errors::{self, AppError};
use super::models::{DownloadRequest, DownloadResult, Phase, ProgressSample};
use super::output::{self, OutputScanner, ScanEvent};
use super::progress::{self, SpeedMeter, Spinner};

/// Fallback result file name when no destination was ever observed in the
/// tool's output. An exit code of 0 without a destination line is still
/// treated as success for compatibility, though it may mask a failure the
/// patterns did not recognize.
const FALLBACK_FILE_NAME: &str = "audio";

const CHUNK_BUF_SIZE: usize = 4096;

/// Runs one download request against resolved tool paths. Owns a single
/// child process at a time: the downloader, then optionally the trimmer.
pub struct Downloader {
    downloader_path: PathBuf,
    muxer_path: Option<PathBuf>,
    download_dir: PathBuf,
}

impl Downloader {
    pub fn new(
        downloader_path: PathBuf,
        muxer_path: Option<PathBuf>,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            downloader_path,
            muxer_path,
            download_dir,
        }
    }

    pub async fn run(&self, request: &DownloadRequest) -> Result<DownloadResult, AppError> {
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|_| AppError::DirectoryCreate {
                path: self.download_dir.display().to_string(),
            })?;

        // A clip request requires the muxer before anything is spawned.
        let trim_tool = match (&request.clip, &self.muxer_path) {
            (Some(_), None) => {
                return Err(AppError::BinaryNotFound {
                    message: "ffmpeg is required for --clip but was not found".to_string(),
                })
            }
            (Some(_), Some(path)) => Some(path.clone()),
            (None, _) => None,
        };

        let result = self.fetch(request).await?;

        match (&request.clip, trim_tool) {
            (Some(range), Some(tool)) => clip::apply(result, range, &tool, request.quiet).await,
            _ => Ok(result),
        }
    }

    /// Argument list for the downloader. A requested clip never reaches the
    /// downloader; the full asset is fetched and cut afterwards.
    pub fn build_args(&self, request: &DownloadRequest) -> Vec<String> {
        let format = request.format.to_lowercase();

        let mut args: Vec<String> = vec![
            request.url.clone(),
            "-o".into(),
            config::output_template(&self.download_dir),
            "--no-playlist".into(),
            "--newline".into(),
            "--progress".into(),
            "--concurrent-fragments".into(),
            config::CONCURRENT_FRAGMENTS.into(),
            "--no-check-certificates".into(),
            "--restrict-filenames".into(),
        ];

        if let Some(muxer) = &self.muxer_path {
            args.push("--ffmpeg-location".into());
            args.push(muxer.display().to_string());
        }

        if config::is_video_format(&format) {
            args.extend([
                "-f".into(),
                "bestvideo+bestaudio/best".into(),
                "--merge-output-format".into(),
                format,
            ]);
        } else {
            args.extend([
                "-f".into(),
                "bestaudio/best".into(),
                "-x".into(),
                "--audio-format".into(),
                format,
                "--audio-quality".into(),
                config::DEFAULT_AUDIO_QUALITY.into(),
                "--prefer-free-formats".into(),
            ]);
        }

        args
    }

    async fn fetch(&self, request: &DownloadRequest) -> Result<DownloadResult, AppError> {
        let args = self.build_args(request);
        debug!(downloader = %self.downloader_path.display(), "spawning downloader");

        let mut child = Command::new(&self.downloader_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::BinaryExecution {
                exit_code: -1,
                message: format!("Failed to start downloader: {}", e),
            })?;

        // Both streams feed one consumer in arrival order; phase and
        // progress signals show up interleaved on either.
        let (tx, mut rx) = mpsc::channel::<String>(64);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, tx.clone()));
        }
        drop(tx);

        let mut spinner = Spinner::start("Getting ready...", request.quiet);
        let mut converting_spinner: Option<Spinner> = None;
        let mut scanner = OutputScanner::new();
        let mut meter = SpeedMeter::new();

        while let Some(chunk) = rx.recv().await {
            match scanner.feed(&chunk) {
                Some(ScanEvent::EnterConverting) => {
                    spinner.stop();
                    if !request.quiet {
                        progress::clear_line();
                    }
                    converting_spinner = Some(Spinner::start("Converting...", request.quiet));
                }
                Some(ScanEvent::Progress(raw)) => {
                    spinner.stop();
                    let speed = match raw.downloaded_bytes() {
                        Some(bytes) => meter.observe(bytes, Instant::now()).map(str::to_string),
                        None => None,
                    };
                    progress::render_bar(
                        "Downloading:",
                        &ProgressSample {
                            percent: raw.percent,
                            speed,
                        },
                        request.quiet,
                    );
                }
                Some(ScanEvent::InitStatus(caption)) => spinner.update(caption),
                None => {}
            }

            // The muxer's own progress line; no total duration is known for
            // the main run, so it only feeds diagnostics here.
            if scanner.phase() == Phase::Converting {
                if let Some(seconds) = output::extract_mux_time(&chunk) {
                    trace!(seconds, "muxer progress");
                }
            }
        }

        let status = child.wait().await.map_err(|e| AppError::BinaryExecution {
            exit_code: -1,
            message: format!("Failed to wait for downloader: {}", e),
        })?;

        spinner.stop();
        if let Some(mut converting) = converting_spinner.take() {
            converting.stop();
        }
        if !request.quiet {
            progress::clear_line();
        }
        scanner.finish();

        let exit_code = status.code().unwrap_or(-1);
        if let Some(err) = errors::classify(scanner.output(), exit_code, &request.url) {
            return Err(err);
        }

        let file_name = match scanner.file_name() {
            Some(name) => name.to_string(),
            None => {
                warn!("no destination observed in output, falling back to \"{FALLBACK_FILE_NAME}\"");
                FALLBACK_FILE_NAME.to_string()
            }
        };

        Ok(DownloadResult {
            file_path: self.download_dir.clone(),
            file_name,
            file_size: scanner.file_size().map(str::to_string),
        })
    }
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, tx: mpsc::Sender<String>) {
    let mut buf = [0u8; CHUNK_BUF_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        }
    }
}
