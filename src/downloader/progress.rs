// Single-line terminal progress: spinners, bar, throughput smoothing
//
// Exactly one renderer (init spinner, download bar, or convert spinner)
// owns the progress line at any instant; callers stop the previous one
// before starting the next, and every stop clears the line.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use super::models::ProgressSample;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_INTERVAL: Duration = Duration::from_millis(80);
const PROGRESS_BAR_WIDTH: usize = 12;
const LINE_CLEAR_WIDTH: usize = 60;
const SPEED_SAMPLE_WINDOW: Duration = Duration::from_millis(500);

pub fn clear_line() {
    print!("\r{}\r", " ".repeat(LINE_CLEAR_WIDTH));
    let _ = io::stdout().flush();
}

/// Interval-driven spinner on the shared progress line. Stopping (or
/// dropping) the handle ends the animation and clears the line; a quiet
/// spinner never draws anything.
pub struct Spinner {
    message: Arc<Mutex<String>>,
    stopped: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    pub fn start(initial: &str, quiet: bool) -> Self {
        let message = Arc::new(Mutex::new(initial.to_string()));
        let stopped = Arc::new(AtomicBool::new(false));

        if quiet {
            return Self {
                message,
                stopped,
                handle: None,
            };
        }

        let task_message = Arc::clone(&message);
        let task_stopped = Arc::clone(&stopped);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SPINNER_INTERVAL);
            let mut frame = 0usize;
            loop {
                ticker.tick().await;
                if task_stopped.load(Ordering::Relaxed) {
                    break;
                }
                let caption = task_message
                    .lock()
                    .map(|m| m.clone())
                    .unwrap_or_default();
                print!(
                    "\r{} {}",
                    SPINNER_FRAMES[frame % SPINNER_FRAMES.len()],
                    caption
                );
                let _ = io::stdout().flush();
                frame += 1;
            }
        });

        Self {
            message,
            stopped,
            handle: Some(handle),
        }
    }

    pub fn update(&self, caption: &str) {
        if let Ok(mut message) = self.message.lock() {
            *message = caption.to_string();
        }
    }

    /// Idempotent.
    pub fn stop(&mut self) {
        if self.stopped.swap(true, Ordering::Relaxed) {
            return;
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
            clear_line();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Redraws the fixed-width bar in place. Percent is clamped; the caller
/// guarantees monotonicity within a phase.
pub fn render_bar(label: &str, sample: &ProgressSample, quiet: bool) {
    if quiet {
        return;
    }
    let percent = sample.percent.clamp(0.0, 100.0);
    let filled = ((percent / 100.0) * PROGRESS_BAR_WIDTH as f32).round() as usize;
    let filled = filled.min(PROGRESS_BAR_WIDTH);
    let bar = format!(
        "{}{}",
        "█".repeat(filled),
        "░".repeat(PROGRESS_BAR_WIDTH - filled)
    );
    let speed = sample
        .speed
        .as_deref()
        .map(|s| format!(" {}", s))
        .unwrap_or_default();
    print!("\r{} {} {:>3.0}%{}   ", label, bar, percent, speed);
    let _ = io::stdout().flush();
}

/// Throughput smoothing over byte-count observations. A new label is only
/// computed once more than the sample window has elapsed; in between, the
/// previous label is reused.
#[derive(Debug, Default)]
pub struct SpeedMeter {
    last_bytes: Option<u64>,
    last_at: Option<Instant>,
    label: Option<String>,
}

impl SpeedMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, bytes: u64, at: Instant) -> Option<&str> {
        match (self.last_bytes, self.last_at) {
            (Some(previous), Some(t0)) => {
                let elapsed = at.saturating_duration_since(t0);
                if elapsed > SPEED_SAMPLE_WINDOW && bytes >= previous {
                    let bytes_per_sec = (bytes - previous) as f64 / elapsed.as_secs_f64();
                    self.label = Some(format_speed(bytes_per_sec));
                    self.last_bytes = Some(bytes);
                    self.last_at = Some(at);
                }
            }
            _ => {
                self.last_bytes = Some(bytes);
                self.last_at = Some(at);
            }
        }
        self.label.as_deref()
    }
}

pub fn format_speed(bytes_per_sec: f64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes_per_sec >= MIB {
        format!("{:.2}MiB/s", bytes_per_sec / MIB)
    } else if bytes_per_sec >= KIB {
        format!("{:.2}KiB/s", bytes_per_sec / KIB)
    } else {
        format!("{}B/s", bytes_per_sec.round() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_formats_at_binary_thresholds() {
        assert_eq!(format_speed(2_097_152.0), "2.00MiB/s");
        assert_eq!(format_speed(2_048.0), "2.00KiB/s");
        assert_eq!(format_speed(500.0), "500B/s");
        assert_eq!(format_speed(1023.0), "1023B/s");
        assert_eq!(format_speed(1_258_291.2), "1.20MiB/s");
    }

    #[test]
    fn meter_computes_after_sample_window() {
        let mut meter = SpeedMeter::new();
        let t0 = Instant::now();

        // First observation only primes the meter.
        assert_eq!(meter.observe(0, t0), None);

        let label = meter
            .observe(2_097_152, t0 + Duration::from_millis(1000))
            .map(str::to_string);
        assert_eq!(label.as_deref(), Some("2.00MiB/s"));
    }

    #[test]
    fn meter_reuses_label_inside_window() {
        let mut meter = SpeedMeter::new();
        let t0 = Instant::now();
        meter.observe(0, t0);
        meter.observe(2_048, t0 + Duration::from_millis(1000));

        // 200 ms later: no recompute, cached label comes back.
        let label = meter
            .observe(1_000_000, t0 + Duration::from_millis(1200))
            .map(str::to_string);
        assert_eq!(label.as_deref(), Some("2.00KiB/s"));
    }

    #[test]
    fn meter_ignores_byte_count_regressions() {
        let mut meter = SpeedMeter::new();
        let t0 = Instant::now();
        meter.observe(4_096, t0);
        let label = meter
            .observe(1_024, t0 + Duration::from_millis(1000))
            .map(str::to_string);
        assert_eq!(label, None);
    }

    #[tokio::test]
    async fn quiet_spinner_is_inert() {
        let mut spinner = Spinner::start("Getting ready...", true);
        spinner.update("still quiet");
        spinner.stop();
        spinner.stop();
    }
}
