//! Probe configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How TLS verification failures affect a candidate that is reachable
/// over TCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsVerifyMode {
    /// No TLS handshake is attempted.
    Off,
    /// Handshake failure is recorded as a caveat; the candidate stays
    /// reachable. Selection still prefers verified candidates.
    #[default]
    Lenient,
    /// Handshake failure marks the candidate as failed.
    Strict,
}

/// TLS/SNI verification options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsOptions {
    pub mode: TlsVerifyMode,
    pub handshake_timeout: Duration,
    /// Verify the certificate name matches the SNI hostname.
    pub verify_hostname: bool,
    /// When several domains share an address, try up to this many of
    /// them as SNI; any match passes.
    pub try_hosts_limit: usize,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            mode: TlsVerifyMode::default(),
            handshake_timeout: Duration::from_millis(2500),
            verify_hostname: true,
            try_hosts_limit: 3,
        }
    }
}

/// Whole-candidate retry. After all trials of a candidate fail, the
/// trial set may be re-run a bounded number of times with backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeRetry {
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl Default for ProbeRetry {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl ProbeRetry {
    /// Delay before retry number `retry` (zero-based), doubling each
    /// time and capped at 3 s.
    pub fn delay_for(&self, retry: usize) -> Duration {
        let exp = retry.min(8) as u32;
        self.base_delay
            .saturating_mul(1 << exp)
            .min(Duration::from_secs(3))
    }
}

/// Configuration for one probe session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// TCP port probed on every candidate.
    pub port: u16,
    /// Trials per candidate.
    pub trials: u32,
    /// Timeout for a single connect attempt.
    pub attempt_timeout: Duration,
    /// Pause between trials of one candidate, spreading load.
    pub trial_interval: Duration,
    pub tls: TlsOptions,
    /// Issue an ICMP echo when every TCP trial fails; distinguishes a
    /// filtered port from a dead host.
    pub icmp_fallback: bool,
    pub icmp_timeout: Duration,
    /// Concurrent candidates in flight.
    pub concurrency: usize,
    /// Completed results are batched and flushed to the sink on this
    /// interval.
    pub flush_interval: Duration,
    pub retry: ProbeRetry,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            port: 443,
            trials: 3,
            attempt_timeout: Duration::from_secs(2),
            trial_interval: Duration::from_millis(20),
            tls: TlsOptions::default(),
            icmp_fallback: true,
            icmp_timeout: Duration::from_secs(2),
            concurrency: 60,
            flush_interval: Duration::from_millis(300),
            retry: ProbeRetry::default(),
        }
    }
}
