//! Line-oriented hosts-format parsing.
//!
//! Remote source documents are plain text, one `<address> <domain>...`
//! per line, `#` starting a comment. Addresses are strictly validated
//! so that stray HTML or junk never turns into records, and an
//! allow-filter keeps only the domains the caller is managing.

use crate::base::{AddrFamily, Candidate, Domain};

/// Domain allow-filter applied before records are returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainFilter {
    /// Keep every syntactically valid record.
    Any,
    /// Keep records whose domain contains the given fragment
    /// (case-insensitive).
    Contains(String),
    /// Keep records whose domain equals one of the suffixes or ends
    /// with `.suffix`.
    SuffixSet(Vec<String>),
}

impl DomainFilter {
    pub fn matches(&self, domain: &Domain) -> bool {
        let host = domain.as_str();
        match self {
            DomainFilter::Any => true,
            DomainFilter::Contains(fragment) => host.contains(&fragment.to_ascii_lowercase()),
            DomainFilter::SuffixSet(suffixes) => suffixes.iter().any(|s| {
                let s = s.to_ascii_lowercase();
                host == s || host.ends_with(&format!(".{s}"))
            }),
        }
    }
}

/// Parses a hosts-format document into deduplicated records.
///
/// One address may be followed by several domains on the same line.
/// Comment lines, blank lines, inline comments, invalid addresses and
/// invalid hostnames are skipped, never errors. Duplicate
/// (address, domain) pairs keep their first occurrence.
pub fn parse_hosts_text(text: &str, family: AddrFamily, filter: &DomainFilter) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = Vec::new();

    for raw in text.lines() {
        let mut line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(pos) = line.find('#') {
            line = line[..pos].trim();
        }
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let Some(addr_token) = parts.next() else {
            continue;
        };
        let Ok(addr) = addr_token.parse::<std::net::IpAddr>() else {
            continue;
        };
        if !family.accepts(addr) {
            continue;
        }

        for host_token in parts {
            let Ok(domain) = Domain::parse(host_token) else {
                continue;
            };
            if !filter.matches(&domain) {
                continue;
            }
            let candidate = Candidate::new(addr, domain);
            if !out.contains(&candidate) {
                out.push(candidate);
            }
        }
    }

    out
}

/// Sniffs whether a body is an HTML document rather than a hosts file.
/// Sources behind misconfigured CDNs sometimes answer 200 with an error
/// page; those must count as failed fetches.
pub fn looks_like_html(body: &str) -> bool {
    let head: String = body.chars().take(500).collect::<String>().to_ascii_lowercase();
    head.contains("<html") || head.contains("<!doctype")
}
