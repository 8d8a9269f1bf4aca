// Phase classification and signal extraction from downloader output
//
// The downloader's text output is unstructured and versioned; every pattern
// here is a contract with that tool, pinned by tests against captured
// sample lines. Chunks arrive as delivered by the pipe and may split a
// logical line anywhere — matching is per-chunk and best-effort, a miss on
// a split boundary is corrected by the next chunk.

use lazy_static::lazy_static;
use regex::Regex;

use super::models::Phase;

lazy_static! {
    static ref PERCENT: Regex = Regex::new(r"(\d+\.?\d*)%").unwrap();
    static ref TOTAL_SIZE: Regex =
        Regex::new(r"(?i)of\s+~?\s*([\d.]+\s*[KMG]?i?B)").unwrap();
    static ref DESTINATION: Regex =
        Regex::new(r"(?m)\[(?:ExtractAudio|Merger)\].*?Destination:\s*(.+)$").unwrap();
    static ref DOWNLOAD_DEST: Regex =
        Regex::new(r"(?m)\[download\]\s+Destination:\s*(.+)$").unwrap();
    static ref MERGING_INTO: Regex = Regex::new(r#"Merging formats into "(.+?)""#).unwrap();
    static ref FILE_SIZE: Regex = Regex::new(r"(?i)~?([\d.]+\s*[KMG]i?B)\b").unwrap();
    static ref BARE_UNIT: Regex = Regex::new(r"([KMG])B\b").unwrap();
    static ref SIZE_PARTS: Regex = Regex::new(r"(?i)^([\d.]+)\s*([KMG])?i?B$").unwrap();
    static ref MUX_TIME: Regex =
        Regex::new(r"time=(\d+):(\d{2}):(\d{2})(?:\.\d+)?").unwrap();
}

/// Raw progress signals pulled from one chunk, before smoothing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProgress {
    pub percent: f32,
    pub total_size: Option<String>,
}

impl RawProgress {
    /// Approximate downloaded byte count, derived from percent and the
    /// reported total size.
    pub fn downloaded_bytes(&self) -> Option<u64> {
        let total = self.total_size.as_deref().and_then(parse_size_bytes)?;
        Some((f64::from(self.percent) / 100.0 * total as f64) as u64)
    }
}

/// What one chunk meant for the run, beyond state updates.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// Media muxing/extraction started; downloading is over.
    EnterConverting,
    /// A percent strictly above everything rendered so far.
    Progress(RawProgress),
    /// Caption update for the init spinner.
    InitStatus(&'static str),
}

/// Per-run scanner: owns the phase machine, the monotonic percent gate,
/// best-effort filename/size capture, and the accumulated output buffer
/// used for post-mortem classification.
#[derive(Debug)]
pub struct OutputScanner {
    phase: Phase,
    last_percent: f32,
    file_name: Option<String>,
    file_size: Option<String>,
    output: String,
}

impl OutputScanner {
    pub fn new() -> Self {
        Self {
            phase: Phase::Init,
            last_percent: 0.0,
            file_name: None,
            file_size: None,
            output: String::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn file_size(&self) -> Option<&str> {
        self.file_size.as_deref()
    }

    /// Consumes one delivered chunk. Extraction never blocks phase
    /// progression; transition rules run in fixed order.
    pub fn feed(&mut self, chunk: &str) -> Option<ScanEvent> {
        self.output.push_str(chunk);

        if let Some(name) = extract_file_name(chunk) {
            self.file_name = Some(name);
        }
        if let Some(size) = extract_file_size(chunk) {
            self.file_size = Some(size);
        }

        if self.phase < Phase::Converting && is_converting_marker(chunk) {
            self.phase = Phase::Converting;
            return Some(ScanEvent::EnterConverting);
        }

        if self.phase < Phase::Converting {
            if let Some(progress) = parse_progress(chunk) {
                if progress.percent > self.last_percent {
                    self.last_percent = progress.percent;
                    self.phase = Phase::Downloading;
                    return Some(ScanEvent::Progress(progress));
                }
            }
        }

        if self.phase == Phase::Init {
            if let Some(status) = detect_init_status(chunk) {
                return Some(ScanEvent::InitStatus(status));
            }
        }

        None
    }

    pub fn finish(&mut self) {
        self.phase = Phase::Done;
    }
}

impl Default for OutputScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn is_converting_marker(text: &str) -> bool {
    text.contains("[ExtractAudio]")
        || text.contains("[Merger]")
        || text.contains("Merging formats into")
}

fn parse_progress(text: &str) -> Option<RawProgress> {
    let percent = PERCENT
        .captures(text)?
        .get(1)?
        .as_str()
        .parse::<f32>()
        .ok()?;
    let total_size = TOTAL_SIZE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string());
    Some(RawProgress {
        percent,
        total_size,
    })
}

fn detect_init_status(text: &str) -> Option<&'static str> {
    if text.contains("Extracting URL") {
        return Some("Extracting...");
    }
    if text.contains("Downloading webpage") {
        return Some("Fetching info...");
    }
    if text.contains("Downloading") && !text.contains('%') {
        return Some("Preparing...");
    }
    None
}

/// Last path segment of a `Destination:` or `Merging formats into` line.
fn extract_file_name(text: &str) -> Option<String> {
    let captures = DESTINATION
        .captures(text)
        .or_else(|| DOWNLOAD_DEST.captures(text))
        .or_else(|| MERGING_INTO.captures(text))?;
    let full_path = captures.get(1)?.as_str().trim();
    let name = full_path.rsplit('/').next().unwrap_or(full_path);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Size token near a download-progress line, e.g. `~ 310.04MiB`.
fn extract_file_size(text: &str) -> Option<String> {
    if !text.contains("[download]") {
        return None;
    }
    FILE_SIZE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| normalize_size_unit(m.as_str().trim()))
}

/// A bare `KB/MB/GB` is displayed as its binary-suffixed counterpart.
pub fn normalize_size_unit(size: &str) -> String {
    BARE_UNIT.replace_all(size, "${1}iB").into_owned()
}

/// `"343.72MiB"` → bytes. K/M/G multipliers are 1024-based regardless of
/// the `i` suffix.
pub fn parse_size_bytes(size: &str) -> Option<u64> {
    let caps = SIZE_PARTS.captures(size.trim())?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_uppercase()) {
        Some(unit) if unit == "K" => 1024.0,
        Some(unit) if unit == "M" => 1024.0 * 1024.0,
        Some(unit) if unit == "G" => 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    };
    Some((value * multiplier) as u64)
}

/// Elapsed media seconds from a muxer progress line
/// (`frame=… time=HH:MM:SS.cc …`).
pub fn extract_mux_time(text: &str) -> Option<u64> {
    let caps = MUX_TIME.captures(text)?;
    let hours: u64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: u64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: u64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600 + minutes * 60 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_moves_init_to_downloading() {
        let mut scanner = OutputScanner::new();
        let event = scanner.feed("[download]  10.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59");
        assert!(matches!(event, Some(ScanEvent::Progress(_))));
        assert_eq!(scanner.phase(), Phase::Downloading);
    }

    #[test]
    fn lower_percents_are_dropped() {
        let mut scanner = OutputScanner::new();
        let rendered: Vec<f32> = ["[download] 10%", "[download] 5%", "[download] 20%"]
            .iter()
            .filter_map(|chunk| match scanner.feed(chunk) {
                Some(ScanEvent::Progress(p)) => Some(p.percent),
                _ => None,
            })
            .collect();
        assert_eq!(rendered, vec![10.0, 20.0]);
    }

    #[test]
    fn converting_is_terminal_for_progress() {
        let mut scanner = OutputScanner::new();
        scanner.feed("[download] 42.0% of 4.00MiB");
        let event = scanner.feed("[ExtractAudio] Destination: /tmp/music/My_Song.mp3");
        assert_eq!(event, Some(ScanEvent::EnterConverting));
        assert_eq!(scanner.phase(), Phase::Converting);

        // Late percents must not resurrect the downloading phase.
        assert_eq!(scanner.feed("[download] 90.0% of 4.00MiB"), None);
        assert_eq!(scanner.phase(), Phase::Converting);
    }

    #[test]
    fn converting_marker_fires_only_once() {
        let mut scanner = OutputScanner::new();
        assert_eq!(
            scanner.feed("[Merger] Merging formats into \"/tmp/v.mp4\""),
            Some(ScanEvent::EnterConverting)
        );
        assert_eq!(scanner.feed("[Merger] still merging"), None);
    }

    #[test]
    fn destination_lines_yield_file_names() {
        let mut scanner = OutputScanner::new();
        scanner.feed("[download] Destination: /tmp/music/My_Song.webm\n");
        assert_eq!(scanner.file_name(), Some("My_Song.webm"));

        scanner.feed("[ExtractAudio] Destination: /tmp/music/My_Song.mp3\n");
        assert_eq!(scanner.file_name(), Some("My_Song.mp3"));
    }

    #[test]
    fn merging_line_yields_file_name() {
        let mut scanner = OutputScanner::new();
        scanner.feed("[Merger] Merging formats into \"/tmp/videos/My Video.mp4\"\n");
        assert_eq!(scanner.file_name(), Some("My Video.mp4"));
    }

    #[test]
    fn size_is_captured_near_download_lines() {
        let mut scanner = OutputScanner::new();
        scanner.feed("[download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59\n");
        assert_eq!(scanner.file_size(), Some("310.04MiB"));

        // Non-download chunks never contribute a size.
        let mut other = OutputScanner::new();
        other.feed("frame= 100 size= 2048KiB time=00:00:10.00\n");
        assert_eq!(other.file_size(), None);
    }

    #[test]
    fn bare_units_display_as_binary() {
        assert_eq!(normalize_size_unit("310.04MB"), "310.04MiB");
        assert_eq!(normalize_size_unit("310.04MiB"), "310.04MiB");
        assert_eq!(normalize_size_unit("1.5GB"), "1.5GiB");
    }

    #[test]
    fn size_tokens_parse_to_bytes() {
        assert_eq!(parse_size_bytes("4.00MiB"), Some(4 * 1024 * 1024));
        assert_eq!(parse_size_bytes("2KiB"), Some(2048));
        assert_eq!(parse_size_bytes("2KB"), Some(2048));
        assert_eq!(parse_size_bytes("512B"), Some(512));
        assert_eq!(parse_size_bytes("garbage"), None);
    }

    #[test]
    fn downloaded_bytes_follow_percent() {
        let progress = RawProgress {
            percent: 50.0,
            total_size: Some("4.00MiB".to_string()),
        };
        assert_eq!(progress.downloaded_bytes(), Some(2 * 1024 * 1024));
    }

    #[test]
    fn init_status_captions() {
        let mut scanner = OutputScanner::new();
        assert_eq!(
            scanner.feed("[youtube] Extracting URL: https://youtu.be/x"),
            Some(ScanEvent::InitStatus("Extracting..."))
        );
        assert_eq!(
            scanner.feed("[youtube] x: Downloading webpage"),
            Some(ScanEvent::InitStatus("Fetching info..."))
        );
        assert_eq!(
            scanner.feed("[youtube] x: Downloading tv client config"),
            Some(ScanEvent::InitStatus("Preparing..."))
        );
    }

    #[test]
    fn init_captions_stop_after_init() {
        let mut scanner = OutputScanner::new();
        scanner.feed("[download] 10% of 1.00MiB");
        assert_eq!(scanner.feed("[youtube] x: Downloading webpage"), None);
    }

    #[test]
    fn mux_time_lines_parse() {
        let line = "frame=  120 fps= 30 q=-1.0 size=    1024KiB time=00:00:45.12 bitrate= 186.2kbits/s speed=30x";
        assert_eq!(extract_mux_time(line), Some(45));
        assert_eq!(extract_mux_time("frame= 120 fps=30"), None);
        assert_eq!(extract_mux_time("time=01:02:03.99"), Some(3723));
    }

    #[test]
    fn accumulates_output_for_post_mortem() {
        let mut scanner = OutputScanner::new();
        scanner.feed("ERROR: Sign in ");
        scanner.feed("to confirm your age\n");
        assert!(scanner.output().contains("Sign in to confirm your age"));
    }
}
