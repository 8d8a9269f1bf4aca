// Error types and output classification for the download pipeline

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

/// One variant per failed run. Variants carry enough structure for the
/// presentation layer to build a message without re-reading raw output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Video removed, private, or otherwise gone.
    VideoNotFound { url: String },

    /// The downloader rejected the URL outright.
    InvalidUrl { url: String },

    /// Age-gated content that needs an authenticated session.
    AgeRestricted { url: String },

    /// Network-level failure reported in the tool's output.
    Connection { message: String },

    /// The external tool failed to start or exited unexpectedly.
    /// `exit_code` is -1 when the process never produced a verdict
    /// (spawn failure or signal kill).
    BinaryExecution { exit_code: i32, message: String },

    /// A required external binary could not be located.
    BinaryNotFound { message: String },

    /// Fetching the downloader binary itself failed.
    BinaryDownload { message: String },

    DirectoryCreate { path: String },

    FileWrite { path: String },

    TimestampParse { input: String, message: String },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VideoNotFound { .. } => write!(f, "Video not found or private"),
            Self::InvalidUrl { .. } => write!(f, "Invalid URL format"),
            Self::AgeRestricted { .. } => {
                write!(f, "Age-restricted video (login required)")
            }
            Self::Connection { message } => write!(f, "{}", message),
            Self::BinaryExecution { message, .. } => write!(f, "{}", message),
            Self::BinaryNotFound { message } => write!(f, "{}", message),
            Self::BinaryDownload { message } => {
                write!(f, "Failed to download yt-dlp binary: {}", message)
            }
            Self::DirectoryCreate { path } => {
                write!(f, "Failed to create directory {}", path)
            }
            Self::FileWrite { path } => write!(f, "Failed to write {}", path),
            Self::TimestampParse { message, .. } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for AppError {}

// Failure phrase families scraped from the downloader's output. These are a
// versioned contract with the external tool; the tests below pin them
// against captured sample lines.
lazy_static! {
    static ref AGE_RESTRICTED: Regex = Regex::new(
        r"(?i)age[- ]?restrict|age[- ]?gate|sign in to confirm your age|confirm your age"
    )
    .unwrap();
    static ref CONNECTION: Regex =
        Regex::new(r"(?i)\b(network|connection)\s+(error|failed|refused)").unwrap();
    static ref NOT_FOUND: Regex = Regex::new(r"(?i)video unavailable|private video").unwrap();
}

/// Maps accumulated output text to an error, independent of exit code.
/// Textual evidence wins even when paired with a clean-looking exit.
pub fn classify_output(output: &str, url: &str) -> Option<AppError> {
    if AGE_RESTRICTED.is_match(output) {
        return Some(AppError::AgeRestricted {
            url: url.to_string(),
        });
    }
    if CONNECTION.is_match(output) {
        return Some(AppError::Connection {
            message: "Connection error, try again".to_string(),
        });
    }
    if NOT_FOUND.is_match(output) {
        return Some(AppError::VideoNotFound {
            url: url.to_string(),
        });
    }
    None
}

/// Fallback mapping for a nonzero exit with no recognizable output phrase.
pub fn classify_exit(exit_code: i32, url: &str) -> AppError {
    match exit_code {
        1 => AppError::VideoNotFound {
            url: url.to_string(),
        },
        2 => AppError::InvalidUrl {
            url: url.to_string(),
        },
        code => AppError::BinaryExecution {
            exit_code: code,
            message: format!("Download failed with exit code {}", code),
        },
    }
}

/// Full terminal classification: output text first, then exit code.
/// Returns `None` exactly when the run is a success.
pub fn classify(output: &str, exit_code: i32, url: &str) -> Option<AppError> {
    if let Some(err) = classify_output(output, url) {
        return Some(err);
    }
    if exit_code == 0 {
        return None;
    }
    Some(classify_exit(exit_code, url))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[test]
    fn age_restriction_wins_over_clean_exit() {
        let output = "ERROR: Sign in to confirm your age. This video may be inappropriate.";
        assert_eq!(
            classify(output, 0, URL),
            Some(AppError::AgeRestricted {
                url: URL.to_string()
            })
        );
    }

    #[test]
    fn age_gate_variants_match() {
        for sample in [
            "this video is age-restricted",
            "Age gate detected",
            "Please confirm your age to continue",
        ] {
            assert!(classify_output(sample, URL).is_some(), "missed: {sample}");
        }
    }

    #[test]
    fn connection_failures_match() {
        let output = "ERROR: Unable to download webpage: Network error: Connection refused";
        assert_eq!(
            classify_output(output, URL),
            Some(AppError::Connection {
                message: "Connection error, try again".to_string()
            })
        );
    }

    #[test]
    fn unavailable_and_private_map_to_not_found() {
        let unavailable = "ERROR: [youtube] dQw4w9WgXcQ: Video unavailable";
        let private =
            "ERROR: [youtube] dQw4w9WgXcQ: Private video. Sign in if you've been granted access";
        assert!(matches!(
            classify_output(unavailable, URL),
            Some(AppError::VideoNotFound { .. })
        ));
        assert!(matches!(
            classify_output(private, URL),
            Some(AppError::VideoNotFound { .. })
        ));
    }

    #[test]
    fn clean_exit_with_no_phrase_is_success() {
        assert_eq!(classify("[download] 100% of 3.5MiB", 0, URL), None);
    }

    #[test]
    fn exit_codes_map_when_text_is_silent() {
        assert!(matches!(
            classify("no recognizable phrase here", 1, URL),
            Some(AppError::VideoNotFound { .. })
        ));
        assert!(matches!(
            classify("no recognizable phrase here", 2, URL),
            Some(AppError::InvalidUrl { .. })
        ));
        assert_eq!(
            classify("no recognizable phrase here", 101, URL),
            Some(AppError::BinaryExecution {
                exit_code: 101,
                message: "Download failed with exit code 101".to_string()
            })
        );
    }

    #[test]
    fn age_phrase_beats_unexpected_exit_code() {
        let output = "WARNING: something\nERROR: age-restricted content";
        assert!(matches!(
            classify(output, 101, URL),
            Some(AppError::AgeRestricted { .. })
        ));
    }
}
