// Command-line surface and command handlers

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::binary::{self, DiskTools, ToolProvider};
use crate::config;
use crate::downloader::{AppError, DownloadRequest, Downloader};
use crate::settings;
use crate::timestamp::ClipRange;

#[derive(Parser, Debug)]
#[command(
    name = config::APP_NAME,
    version,
    about = config::APP_TAGLINE,
    subcommand_negates_reqs = true
)]
pub struct Cli {
    /// Media URL to download
    #[arg(required = true)]
    pub url: Option<String>,

    /// Output format: an audio format (mp3, m4a, ...) or a video container
    /// (mp4, mkv, webm, avi, mov)
    #[arg(short, long, default_value = config::DEFAULT_AUDIO_FORMAT)]
    pub format: String,

    /// Keep only a sub-range of the media, e.g. 0:30-1:45
    #[arg(short, long)]
    pub clip: Option<String>,

    /// Suppress progress output; print only the final file name
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download the yt-dlp binary if it is not already prepared
    Prepare,
    /// Show, set, or reset the default download directory
    Folder {
        path: Option<PathBuf>,
        /// Reset to the current directory
        #[arg(long)]
        reset: bool,
    },
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Some(Command::Prepare) => prepare().await,
        Some(Command::Folder { path, reset }) => folder(path, reset),
        None => {
            // clap guarantees the URL when no subcommand was given
            let url = cli.url.unwrap_or_default();
            download(url, cli.format, cli.clip, cli.quiet).await
        }
    }
}

async fn download(
    url: String,
    format: String,
    clip: Option<String>,
    quiet: bool,
) -> Result<(), AppError> {
    let clip = clip.as_deref().map(ClipRange::parse).transpose()?;

    let tools = DiskTools;
    let downloader_path = tools.downloader().await?;
    let muxer_path = tools.muxer().await;
    let download_dir = settings::download_dir();

    if !quiet {
        println!("{} • {}", config::APP_NAME, config::APP_TAGLINE);
        println!("URL: {}\n", url);
    }

    let request = DownloadRequest {
        url,
        format,
        clip,
        quiet,
    };
    let engine = Downloader::new(downloader_path, muxer_path, download_dir);
    let result = engine.run(&request).await?;

    if quiet {
        println!("{}", result.file_name);
    } else {
        println!();
        println!("✓ Process done!");
        println!();
        match &result.file_size {
            Some(size) => println!("{} ({})", result.file_name, size),
            None => println!("{}", result.file_name),
        }
    }
    Ok(())
}

async fn prepare() -> Result<(), AppError> {
    if binary::find_downloader().is_some() {
        println!("✓ Ready");
        return Ok(());
    }
    println!("Downloading yt-dlp...");
    binary::download_latest().await?;
    println!("✓ Ready");
    Ok(())
}

fn folder(path: Option<PathBuf>, reset: bool) -> Result<(), AppError> {
    if reset {
        settings::reset_download_dir()?;
        println!("✓ Reset to current directory");
        return Ok(());
    }
    match path {
        Some(dir) => {
            settings::set_download_dir(&dir)?;
            println!("✓ {}", dir.display());
        }
        None => println!("{}", settings::download_dir().display()),
    }
    Ok(())
}
