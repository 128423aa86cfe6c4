//! smarthosts is an engine for keeping a hosts file pointed at the
//! fastest working addresses for a set of domains.
//!
//! The pipeline has four stages, each usable on its own:
//!
//! - [`fetch`]: download a community-maintained hosts list from a
//!   priority-ordered set of mirrors, with per-source retry and
//!   automatic fallback.
//! - [`dns`]: resolve extra domains through a pluggable [`dns::Resolve`]
//!   implementation with bounded batch concurrency.
//! - [`probe`]: measure every (address, domain) candidate over TCP with
//!   optional TLS/SNI verification and ICMP fallback, under a
//!   pausable, cancellable worker pool.
//! - [`hosts`]: atomically rewrite the marker-delimited managed region
//!   of the system hosts file, with timestamped backups and restore.
//!
//! [`selection`] reduces probe results to one address per domain, and
//! [`config`] persists user settings between runs.

pub mod base;
pub mod config;
pub mod dns;
pub mod fetch;
pub mod hosts;
pub mod probe;
pub mod selection;

pub use base::{
    AddrFamily, Candidate, Domain, FetchError, FlushError, NetError, ProbeResult, ProbeStatus,
    Selection, StoreError,
};
