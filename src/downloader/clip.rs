// Lossless post-download trim via the muxing tool
//
// Runs only after a successful full-range download. The cut is stream-copy
// (no re-encode), so it preserves quality and finishes fast; on success the
// full file is swapped for the trimmed one.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::timestamp::ClipRange;

use super::errors::AppError;
use super::models::{DownloadResult, ProgressSample};
use super::output;
use super::progress::{self, Spinner};

/// `video.mp4` → `video_clip.mp4`; an extensionless name just gets the
/// suffix appended.
pub fn clip_file_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_clip.{}", stem, ext),
        _ => format!("{}_clip", name),
    }
}

/// Trims the downloaded file to the requested range.
///
/// A missing input degrades gracefully: the untouched result is returned
/// and the run stays successful. A trimmer failure fails the whole run,
/// leaving the full file on disk.
pub async fn apply(
    mut result: DownloadResult,
    range: &ClipRange,
    muxer: &Path,
    quiet: bool,
) -> Result<DownloadResult, AppError> {
    let input = result.file_path.join(&result.file_name);
    if !input.exists() {
        warn!(input = %input.display(), "clip input missing, keeping the full download");
        return Ok(result);
    }

    let trimmed_name = clip_file_name(&result.file_name);
    let output_path = result.file_path.join(&trimmed_name);

    let args = [
        "-i".to_string(),
        input.display().to_string(),
        "-ss".to_string(),
        range.start.to_string(),
        "-to".to_string(),
        range.end.to_string(),
        "-c".to_string(),
        "copy".to_string(),
        "-y".to_string(),
        output_path.display().to_string(),
    ];

    debug!(muxer = %muxer.display(), range = %range, "spawning trimmer");
    let mut child = Command::new(muxer)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AppError::BinaryExecution {
            exit_code: -1,
            message: format!("Failed to start trim tool: {}", e),
        })?;

    let (tx, mut rx) = mpsc::channel::<String>(64);
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pump(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pump(stderr, tx.clone()));
    }
    drop(tx);

    // The trimmer reports elapsed media time, not percent; with the clip
    // duration known it converts to a bar, otherwise only the spinner is
    // meaningful.
    let total_seconds = range.duration_seconds();
    let mut spinner = Spinner::start("Converting...", quiet);

    while let Some(chunk) = rx.recv().await {
        if total_seconds == 0 {
            continue;
        }
        if let Some(seconds) = output::extract_mux_time(&chunk) {
            spinner.stop();
            let percent =
                (seconds as f32 / total_seconds as f32 * 100.0).clamp(0.0, 100.0);
            progress::render_bar(
                "Trimming:",
                &ProgressSample {
                    percent,
                    speed: None,
                },
                quiet,
            );
        }
    }

    let status = child.wait().await.map_err(|e| AppError::BinaryExecution {
        exit_code: -1,
        message: format!("Failed to wait for trim tool: {}", e),
    })?;

    spinner.stop();
    if !quiet {
        progress::clear_line();
    }

    if !status.success() {
        let exit_code = status.code().unwrap_or(-1);
        return Err(AppError::BinaryExecution {
            exit_code,
            message: format!("Trim failed with exit code {}", exit_code),
        });
    }

    // Removal of the full file is best-effort.
    if let Err(e) = tokio::fs::remove_file(&input).await {
        debug!(input = %input.display(), error = %e, "could not remove full file");
    }
    result.file_name = trimmed_name;
    result.file_size = None;
    Ok(result)
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, tx: mpsc::Sender<String>) {
    let mut buf = [0u8; 4096];
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn clip_names_insert_suffix_before_extension() {
        assert_eq!(clip_file_name("video.mp4"), "video_clip.mp4");
        assert_eq!(clip_file_name("my.song.mp3"), "my.song_clip.mp3");
        assert_eq!(clip_file_name("audio"), "audio_clip");
    }

    fn result_in(dir: &Path, name: &str) -> DownloadResult {
        DownloadResult {
            file_path: dir.to_path_buf(),
            file_name: name.to_string(),
            file_size: Some("4.00MiB".to_string()),
        }
    }

    fn range() -> ClipRange {
        ClipRange::parse("1:30-2:45").unwrap()
    }

    #[tokio::test]
    async fn missing_input_returns_result_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let original = result_in(dir.path(), "video.mp4");

        let kept = apply(original.clone(), &range(), Path::new("/usr/bin/ffmpeg"), true)
            .await
            .unwrap();
        assert_eq!(kept, original);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_trim_swaps_file_and_drops_size() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("video.mp4");
        std::fs::write(&input, b"full download").unwrap();

        // A trimmer that always succeeds; apply() does not inspect the
        // output file, only the exit status.
        let trimmed = apply(result_in(dir.path(), "video.mp4"), &range(), Path::new("true"), true)
            .await
            .unwrap();

        assert_eq!(trimmed.file_name, "video_clip.mp4");
        assert_eq!(trimmed.file_size, None);
        assert!(!input.exists(), "full file should be removed after a trim");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_trim_fails_the_run_and_keeps_the_original() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("video.mp4");
        std::fs::write(&input, b"full download").unwrap();

        let err = apply(result_in(dir.path(), "video.mp4"), &range(), Path::new("false"), true)
            .await
            .unwrap_err();

        match err {
            AppError::BinaryExecution { exit_code, .. } => assert_eq!(exit_code, 1),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(input.exists(), "full file must survive a failed trim");
    }

    #[tokio::test]
    async fn unspawnable_trimmer_is_an_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("video.mp4");
        std::fs::write(&input, b"full download").unwrap();

        let missing: PathBuf = dir.path().join("no-such-ffmpeg");
        let err = apply(result_in(dir.path(), "video.mp4"), &range(), &missing, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::BinaryExecution { exit_code: -1, .. }
        ));
        assert!(input.exists());
    }
}
