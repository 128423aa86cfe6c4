//! Multi-trial statistics for one candidate.

use crate::base::{NetError, ProbeStatus};

/// Accumulates per-trial outcomes; trials for one candidate run
/// sequentially, so no interior synchronization is needed.
#[derive(Debug, Default)]
pub struct TrialRecorder {
    samples: Vec<f64>,
    timeouts: u32,
    errors: u32,
}

/// Aggregated view of a finished trial set.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSummary {
    pub status: ProbeStatus,
    /// Arithmetic mean of successful-trial RTTs.
    pub latency_ms: Option<f64>,
    /// Population standard deviation of successful-trial RTTs.
    pub jitter_ms: Option<f64>,
    /// successful trials / total trials.
    pub stability: f64,
    pub trials: u32,
}

impl TrialRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, rtt_ms: f64) {
        self.samples.push(rtt_ms);
    }

    pub fn record_failure(&mut self, err: &NetError) {
        if err.is_timeout() {
            self.timeouts += 1;
        } else {
            self.errors += 1;
        }
    }

    pub fn successes(&self) -> u32 {
        self.samples.len() as u32
    }

    pub fn total(&self) -> u32 {
        self.successes() + self.timeouts + self.errors
    }

    /// Reduces the recorded trials. `Reachable` whenever any trial
    /// succeeded; otherwise `Timeout` if any trial timed out (timeout
    /// takes precedence over generic errors), else `Error`.
    pub fn summarize(self) -> TrialSummary {
        let trials = self.total();
        let successes = self.samples.len();

        if successes == 0 {
            let status = if self.timeouts > 0 {
                ProbeStatus::Timeout
            } else {
                ProbeStatus::Error
            };
            return TrialSummary {
                status,
                latency_ms: None,
                jitter_ms: None,
                stability: 0.0,
                trials,
            };
        }

        let mean = self.samples.iter().sum::<f64>() / successes as f64;
        let variance = self
            .samples
            .iter()
            .map(|s| (s - mean).powi(2))
            .sum::<f64>()
            / successes as f64;

        TrialSummary {
            status: ProbeStatus::Reachable,
            latency_ms: Some(mean),
            jitter_ms: Some(variance.sqrt()),
            stability: successes as f64 / trials as f64,
            trials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_successes() {
        let mut rec = TrialRecorder::new();
        for rtt in [10.0, 10.0, 12.0] {
            rec.record_success(rtt);
        }
        let summary = rec.summarize();
        assert_eq!(summary.status, ProbeStatus::Reachable);
        let latency = summary.latency_ms.unwrap();
        assert!((latency - 10.666).abs() < 0.01);
        assert_eq!(summary.stability, 1.0);
        assert_eq!(summary.trials, 3);
        assert!(summary.jitter_ms.unwrap() > 0.0);
    }

    #[test]
    fn partial_success_keeps_reachable() {
        let mut rec = TrialRecorder::new();
        rec.record_success(20.0);
        rec.record_failure(&NetError::ConnectionTimedOut);
        rec.record_failure(&NetError::ConnectionRefused);
        let summary = rec.summarize();
        assert_eq!(summary.status, ProbeStatus::Reachable);
        assert!((summary.stability - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.jitter_ms, Some(0.0));
    }

    #[test]
    fn timeout_takes_precedence_over_error() {
        let mut rec = TrialRecorder::new();
        rec.record_failure(&NetError::ConnectionRefused);
        rec.record_failure(&NetError::ConnectionTimedOut);
        rec.record_failure(&NetError::ConnectionReset);
        let summary = rec.summarize();
        assert_eq!(summary.status, ProbeStatus::Timeout);
        assert_eq!(summary.latency_ms, None);
        assert_eq!(summary.stability, 0.0);
    }

    #[test]
    fn pure_errors_report_error() {
        let mut rec = TrialRecorder::new();
        rec.record_failure(&NetError::ConnectionRefused);
        rec.record_failure(&NetError::ConnectionRefused);
        assert_eq!(rec.summarize().status, ProbeStatus::Error);
    }
}
