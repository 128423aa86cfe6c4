//! Reduces probe results to one chosen address per domain.

use crate::base::{Domain, ProbeResult, Selection};
use std::net::IpAddr;

/// Picks the best reachable address for every domain.
///
/// Ordering per domain: TLS-verified candidates beat unverified ones,
/// then lower mean latency, then higher stability, then first-probed.
/// Domains with no reachable result are omitted entirely; the caller
/// decides whether to keep an existing entry or drop the domain.
pub fn select_best(results: &[ProbeResult]) -> Selection {
    let mut order: Vec<&Domain> = Vec::new();
    for result in results {
        if !order.contains(&&result.candidate.domain) {
            order.push(&result.candidate.domain);
        }
    }

    let mut selection = Selection::new();
    for domain in order {
        let mut best: Option<&ProbeResult> = None;
        for result in results
            .iter()
            .filter(|r| r.is_reachable() && r.candidate.domain == *domain)
        {
            // Strict improvement only, so full ties keep the
            // first-probed result.
            let better = match best {
                Some(current) => rank(result) < rank(current),
                None => true,
            };
            if better {
                best = Some(result);
            }
        }
        if let Some(best) = best {
            selection.insert(domain.clone(), best.candidate.addr);
        }
    }
    selection
}

/// Sort key; lower is better.
fn rank(result: &ProbeResult) -> (u8, f64, f64) {
    let verified = match result.tls_verified {
        Some(true) => 0,
        _ => 1,
    };
    (
        verified,
        result.latency_ms.unwrap_or(f64::MAX),
        -result.stability,
    )
}

/// Checks that a manually chosen (domain, address) pair exists among
/// the results and was measured reachable.
pub fn validate_manual(results: &[ProbeResult], domain: &Domain, addr: IpAddr) -> bool {
    results
        .iter()
        .any(|r| r.is_reachable() && r.candidate.domain == *domain && r.candidate.addr == addr)
}
