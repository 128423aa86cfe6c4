//! Concurrent Probe Engine Module
//!
//! Reachability and latency measurement over a bounded worker pool,
//! with pause/resume/cancel control and throttled batch delivery.

mod config;
mod engine;
mod stats;
mod strategy;

pub use config::{ProbeConfig, ProbeRetry, TlsOptions, TlsVerifyMode};
pub use engine::{EngineState, ProbeEngine, ProbeHandle, ResultSink};
pub use stats::{TrialRecorder, TrialSummary};
pub use strategy::{icmp_echo, tcp_connect_rtt, tls_sni_verify, tls_sni_verify_any};
