// Media-offset timestamps and clip ranges

use std::fmt;

use crate::downloader::errors::AppError;

const TIME_FORMAT_ERROR: &str =
    "Invalid time format. Use MM:SS or HH:MM:SS (e.g. 0:02 or 01:23:45).";
const RANGE_FORMAT_ERROR: &str =
    "Range must be in 'start-end' format (e.g. 0:02-23:10).";
const RANGE_ORDER_ERROR: &str = "Clip start must be before clip end.";

/// A normalized `HH:MM:SS` media offset. Components are not bounds-checked
/// beyond being numeric; `90:00` is ninety minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    hours: u32,
    minutes: u32,
    seconds: u32,
}

impl Timestamp {
    /// Parses `MM:SS` or `HH:MM:SS`; components need not be zero-padded.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let invalid = || AppError::TimestampParse {
            input: raw.to_string(),
            message: TIME_FORMAT_ERROR.to_string(),
        };

        let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(invalid());
        }

        let (h, m, s) = if parts.len() == 2 {
            ("0", parts[0], parts[1])
        } else {
            (parts[0], parts[1], parts[2])
        };

        let component = |part: &str| part.parse::<u32>().map_err(|_| invalid());
        Ok(Self {
            hours: component(h)?,
            minutes: component(m)?,
            seconds: component(s)?,
        })
    }

    pub fn total_seconds(&self) -> u64 {
        u64::from(self.hours) * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds
        )
    }
}

/// A requested sub-interval of the source media. `start < end` holds for
/// every constructed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl ClipRange {
    /// Parses a `start-end` range and validates ordering.
    pub fn parse(range: &str) -> Result<Self, AppError> {
        let invalid = |message: &str| AppError::TimestampParse {
            input: range.to_string(),
            message: message.to_string(),
        };

        let parts: Vec<&str> = range.split('-').map(str::trim).collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(invalid(RANGE_FORMAT_ERROR));
        }

        let start = Timestamp::parse(parts[0])?;
        let end = Timestamp::parse(parts[1])?;
        if start.total_seconds() >= end.total_seconds() {
            return Err(invalid(RANGE_ORDER_ERROR));
        }

        Ok(Self { start, end })
    }

    pub fn duration_seconds(&self) -> u64 {
        self.end.total_seconds() - self.start.total_seconds()
    }
}

impl fmt::Display for ClipRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
