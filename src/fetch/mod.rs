//! Remote Source Fetch Module
//!
//! Fetch-and-fallback over a priority-ordered source list, plus the
//! hosts-format parser and per-source retry policy.

mod client;
mod parser;
mod retry;
mod source;

pub use client::{
    FetchOutcome, RemoteSourceFetcher, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT,
};
pub use parser::{looks_like_html, parse_hosts_text, DomainFilter};
pub use retry::FetchRetry;
pub use source::{default_sources, FetchMode, RemoteSource};
