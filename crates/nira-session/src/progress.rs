//! Normalization of raw engine load progress for display.

use nira_engine::RawProgress;
use serde::{Deserialize, Serialize};

/// Stage text used when the engine sends none
pub const DEFAULT_STAGE_MESSAGE: &str = "Downloading model…";

/// A display-ready progress line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Percent complete, 0-100
    pub percent: u8,
    pub message: String,
}

/// Turns heterogeneous notifications into a bar that never moves backward
/// within one load.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    last_percent: u8,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new load; the bar may start again from zero.
    pub fn begin_load(&mut self) {
        self.last_percent = 0;
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }

    pub fn normalize(&mut self, raw: &RawProgress) -> Progress {
        let reported = raw
            .fraction
            .filter(|f| !f.is_nan())
            .map(|f| (f * 100.0).round().clamp(0.0, 100.0) as u8);

        // Late or out-of-order notifications hold the bar where it is
        let percent = reported.map_or(self.last_percent, |p| p.max(self.last_percent));
        self.last_percent = percent;

        Progress {
            percent,
            message: raw
                .stage_text
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_STAGE_MESSAGE.to_string()),
        }
    }

    /// Report the load as finished at 100 %.
    pub fn finish(&mut self, message: impl Into<String>) -> Progress {
        self.last_percent = 100;
        Progress {
            percent: 100,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_rounds_and_clamps() {
        let mut r = ProgressReporter::new();
        assert_eq!(r.normalize(&RawProgress::fraction(0.123)).percent, 12);
        assert_eq!(r.normalize(&RawProgress::fraction(0.125)).percent, 13);
        assert_eq!(r.normalize(&RawProgress::fraction(1.7)).percent, 100);

        let mut r = ProgressReporter::new();
        assert_eq!(r.normalize(&RawProgress::fraction(-0.5)).percent, 0);
    }

    #[test]
    fn test_missing_fraction_keeps_last_percent() {
        let mut r = ProgressReporter::new();
        r.normalize(&RawProgress::fraction(0.4));
        let p = r.normalize(&RawProgress::stage("verifying sha256 digest"));
        assert_eq!(p.percent, 40);
        assert_eq!(p.message, "verifying sha256 digest");
    }

    #[test]
    fn test_default_message() {
        let mut r = ProgressReporter::new();
        assert_eq!(r.normalize(&RawProgress::fraction(0.1)).message, DEFAULT_STAGE_MESSAGE);
        assert_eq!(
            r.normalize(&RawProgress::default().with_stage("   ")).message,
            DEFAULT_STAGE_MESSAGE
        );
    }

    #[test]
    fn test_nan_is_treated_as_missing() {
        let mut r = ProgressReporter::new();
        r.normalize(&RawProgress::fraction(0.3));
        assert_eq!(r.normalize(&RawProgress::fraction(f64::NAN)).percent, 30);
    }

    #[test]
    fn test_monotonic_over_arbitrary_sequence() {
        let inputs = [
            RawProgress::fraction(0.2),
            RawProgress::stage("pulling manifest"),
            RawProgress::fraction(0.1),
            RawProgress::fraction(0.55),
            RawProgress::default(),
            RawProgress::fraction(0.0),
            RawProgress::fraction(0.9).with_stage("pulling layer"),
            RawProgress::fraction(f64::INFINITY),
            RawProgress::fraction(0.5),
        ];
        let mut r = ProgressReporter::new();
        let mut last = 0u8;
        for raw in &inputs {
            let p = r.normalize(raw);
            assert!(p.percent >= last, "{} regressed below {}", p.percent, last);
            assert!(p.percent <= 100);
            last = p.percent;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn test_begin_load_resets() {
        let mut r = ProgressReporter::new();
        r.finish("done");
        assert_eq!(r.last_percent(), 100);
        r.begin_load();
        assert_eq!(r.normalize(&RawProgress::fraction(0.05)).percent, 5);
    }
}
