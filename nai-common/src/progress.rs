//! Job progress tracking and ETA formatting
//!
//! Pipeline jobs (scan, rename, build, ...) stream `progress` and `result`
//! messages. The types here accumulate them for display and turn a
//! processed/total/elapsed triple into a remaining-time estimate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shown whenever no meaningful estimate exists yet.
pub const ETA_UNKNOWN: &str = "00:00:00";

/// Running counters of a pipeline job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub processed: u64,
    pub total: u64,
    pub errors: u64,
    pub skipped: u64,
    /// When the job was dispatched
    pub started_at: DateTime<Utc>,
}

impl JobProgress {
    pub fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            processed: 0,
            total: 0,
            errors: 0,
            skipped: 0,
            started_at,
        }
    }

    /// Completed fraction in percent, 0 when the total is unknown.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.processed.min(self.total) as f64 / self.total as f64) * 100.0
    }
}

/// Status reported by the worker for a single `result` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultStatus {
    Ok,
    Unknown,
    Conflict,
    Error,
    Skip,
}

impl ResultStatus {
    /// Parse the worker's status text; unrecognized text maps to `Unknown`.
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_uppercase().as_str() {
            "OK" => ResultStatus::Ok,
            "CONFLICT" => ResultStatus::Conflict,
            "ERROR" => ResultStatus::Error,
            "SKIP" => ResultStatus::Skip,
            _ => ResultStatus::Unknown,
        }
    }
}

/// Per-status counts of a job's results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub ok: u64,
    pub unknown: u64,
    pub conflict: u64,
    pub error: u64,
    pub skipped: u64,
}

impl JobStats {
    pub fn record(&mut self, status: ResultStatus) {
        match status {
            ResultStatus::Ok => self.ok += 1,
            ResultStatus::Unknown => self.unknown += 1,
            ResultStatus::Conflict => self.conflict += 1,
            ResultStatus::Error => self.error += 1,
            ResultStatus::Skip => self.skipped += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.ok + self.unknown + self.conflict + self.error + self.skipped
    }
}

/// Estimate the remaining time of a job as `HH:MM:SS`, using the wall clock.
pub fn format_eta(progress: &JobProgress) -> String {
    format_eta_at(progress, Utc::now())
}

/// Estimate the remaining time of a job as `HH:MM:SS` as seen at `now`.
///
/// Degenerates to [`ETA_UNKNOWN`] when nothing was processed yet, the total is
/// unknown, or the clock reports no elapsed time. Hours are not wrapped into
/// days.
pub fn format_eta_at(progress: &JobProgress, now: DateTime<Utc>) -> String {
    if progress.total == 0 || progress.processed == 0 {
        return ETA_UNKNOWN.to_string();
    }
    let elapsed = (now - progress.started_at).num_milliseconds() as f64 / 1000.0;
    if elapsed <= 0.0 {
        return ETA_UNKNOWN.to_string();
    }
    let rate = progress.processed as f64 / elapsed;
    if !rate.is_finite() || rate <= 0.0 {
        return ETA_UNKNOWN.to_string();
    }
    let remaining = progress.total.saturating_sub(progress.processed) as f64;
    let seconds = (remaining / rate).round() as u64;
    format_hms(seconds)
}

/// Zero-padded `HH:MM:SS`; the hour field grows past two digits if needed.
pub fn format_hms(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn progress(processed: u64, total: u64, elapsed_ms: i64, now: DateTime<Utc>) -> JobProgress {
        JobProgress {
            processed,
            total,
            errors: 0,
            skipped: 0,
            started_at: now - Duration::milliseconds(elapsed_ms),
        }
    }

    #[test]
    fn test_eta_nothing_processed() {
        let now = Utc::now();
        assert_eq!(format_eta_at(&progress(0, 100, 5000, now), now), "00:00:00");
    }

    #[test]
    fn test_eta_unknown_total() {
        let now = Utc::now();
        assert_eq!(format_eta_at(&progress(10, 0, 5000, now), now), "00:00:00");
    }

    #[test]
    fn test_eta_clock_skew() {
        let now = Utc::now();
        // Started "in the future"
        assert_eq!(format_eta_at(&progress(10, 100, -5000, now), now), "00:00:00");
        assert_eq!(format_eta_at(&progress(10, 100, 0, now), now), "00:00:00");
    }

    #[test]
    fn test_eta_half_done() {
        let now = Utc::now();
        // 50 items in 50s -> 1/s, 50 remaining -> 50s
        assert_eq!(format_eta_at(&progress(50, 100, 50_000, now), now), "00:00:50");
    }

    #[test]
    fn test_eta_rounds() {
        let now = Utc::now();
        // 3 items in 10s, 7 remaining -> 23.33s
        assert_eq!(format_eta_at(&progress(3, 10, 10_000, now), now), "00:00:23");
    }

    #[test]
    fn test_eta_processed_beyond_total() {
        let now = Utc::now();
        assert_eq!(format_eta_at(&progress(120, 100, 10_000, now), now), "00:00:00");
    }

    #[test]
    fn test_eta_wall_clock() {
        let started = Utc::now() - Duration::seconds(50);
        let eta = format_eta(&JobProgress {
            processed: 50,
            total: 100,
            errors: 0,
            skipped: 0,
            started_at: started,
        });
        // Allow for test scheduling delay
        assert!(eta == "00:00:50" || eta == "00:00:51", "unexpected eta {eta}");
    }

    #[test]
    fn test_format_hms_unbounded_hours() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(3661), "01:01:01");
        assert_eq!(format_hms(100 * 3600 + 59), "100:00:59");
    }

    #[test]
    fn test_percent() {
        let now = Utc::now();
        assert_eq!(progress(0, 0, 0, now).percent(), 0.0);
        assert_eq!(progress(25, 100, 0, now).percent(), 25.0);
        assert_eq!(progress(150, 100, 0, now).percent(), 100.0);
    }

    #[test]
    fn test_result_status_parse_and_stats() {
        let mut stats = JobStats::default();
        for text in ["OK", "ok", "CONFLICT", "ERROR", "SKIP", "weird"] {
            stats.record(ResultStatus::parse(text));
        }
        assert_eq!(stats.ok, 2);
        assert_eq!(stats.conflict, 1);
        assert_eq!(stats.error, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.unknown, 1);
        assert_eq!(stats.total(), 6);
    }
}
