//! Core data model shared by every stage of the pipeline.
//!
//! A [`Candidate`] is an (address, domain) pair awaiting measurement,
//! produced by the remote fetch or DNS resolution stage. Probing turns
//! each candidate into an immutable [`ProbeResult`]; the selection layer
//! reduces results to a [`Selection`] handed to the hosts-file store.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::base::neterror::NetError;

/// A validated host name, used as the grouping key for results.
///
/// Validation follows the hosts-format rules: ASCII letters, digits,
/// dots and hyphens only, at least one dot, no empty labels. The stored
/// form is lowercased so that lookups are case-insensitive.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain {
    host: Box<str>,
}

impl Domain {
    /// Parses and validates a host name.
    pub fn parse(host: &str) -> Result<Self, NetError> {
        let trimmed = host.trim();
        if trimmed.is_empty() || !trimmed.contains('.') {
            return Err(NetError::InvalidDomain(host.to_string()));
        }
        let valid_chars = trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        if !valid_chars {
            return Err(NetError::InvalidDomain(host.to_string()));
        }
        // No empty labels: rejects "a..b", ".a", "a."
        if trimmed.split('.').any(str::is_empty) {
            return Err(NetError::InvalidDomain(host.to_string()));
        }
        Ok(Self {
            host: trimmed.to_ascii_lowercase().into(),
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.host
    }
}

impl TryFrom<String> for Domain {
    type Error = NetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Domain::parse(&value)
    }
}

impl From<Domain> for String {
    fn from(value: Domain) -> Self {
        value.host.into()
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.host, f)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

/// Address-family filter threaded through parsing and resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddrFamily {
    #[default]
    Any,
    V4Only,
    V6Only,
}

impl AddrFamily {
    pub fn accepts(&self, addr: IpAddr) -> bool {
        match self {
            AddrFamily::Any => true,
            AddrFamily::V4Only => addr.is_ipv4(),
            AddrFamily::V6Only => addr.is_ipv6(),
        }
    }
}

/// An (address, domain) pair awaiting measurement.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct Candidate {
    pub addr: IpAddr,
    pub domain: Domain,
}

impl Candidate {
    pub fn new(addr: IpAddr, domain: Domain) -> Self {
        Self { addr, domain }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.addr, self.domain)
    }
}

/// Terminal status of one probed candidate.
///
/// `Timeout` means no trial produced any response; `Error` means a
/// non-timeout failure such as connection refused. When a batch mixes
/// both, timeout wins: it is the more actionable signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Reachable,
    Timeout,
    Error,
}

/// Outcome of measuring one candidate. Immutable once produced;
/// re-probing yields a new result, never an in-place mutation.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub candidate: Candidate,
    pub status: ProbeStatus,
    /// Mean of successful-trial round-trip times. Only present when
    /// `status == Reachable`.
    pub latency_ms: Option<f64>,
    /// Standard deviation across successful trials.
    pub jitter_ms: Option<f64>,
    /// Fraction of trials that succeeded, in `0.0..=1.0`.
    pub stability: f64,
    pub trials: u32,
    /// TCP was blocked but an ICMP echo succeeded: the host is up, the
    /// service port is filtered.
    pub tcp_blocked: bool,
    /// `None` when TLS verification was not attempted.
    pub tls_verified: Option<bool>,
    pub completed_at: OffsetDateTime,
}

impl ProbeResult {
    pub fn is_reachable(&self) -> bool {
        self.status == ProbeStatus::Reachable
    }

    /// A result that never got a trial off the ground (engine cancelled
    /// before this candidate started is simply not reported; this is
    /// for candidates whose every trial failed).
    pub fn unreachable(candidate: Candidate, status: ProbeStatus, trials: u32) -> Self {
        debug_assert!(status != ProbeStatus::Reachable);
        Self {
            candidate,
            status,
            latency_ms: None,
            jitter_ms: None,
            stability: 0.0,
            trials,
            tcp_blocked: false,
            tls_verified: None,
            completed_at: OffsetDateTime::now_utc(),
        }
    }
}

/// A mapping from domain to exactly one chosen address.
///
/// Entries keep insertion order so the managed region is written in a
/// stable, reviewable order. Inserting a domain twice replaces the
/// previous choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    entries: Vec<(Domain, IpAddr)>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, domain: Domain, addr: IpAddr) {
        if let Some(slot) = self.entries.iter_mut().find(|(d, _)| *d == domain) {
            slot.1 = addr;
        } else {
            self.entries.push((domain, addr));
        }
    }

    pub fn get(&self, domain: &Domain) -> Option<IpAddr> {
        self.entries
            .iter()
            .find(|(d, _)| d == domain)
            .map(|(_, a)| *a)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Domain, IpAddr)> {
        self.entries.iter().map(|(d, a)| (d, *a))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Domain, IpAddr)> for Selection {
    fn from_iter<T: IntoIterator<Item = (Domain, IpAddr)>>(iter: T) -> Self {
        let mut sel = Selection::new();
        for (domain, addr) in iter {
            sel.insert(domain, addr);
        }
        sel
    }
}
