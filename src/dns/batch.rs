//! Bounded-concurrency batch resolution.
//!
//! Resolves a whole set of domains at once, up to a configured number
//! of lookups in flight. Partial failures are non-fatal: a domain whose
//! lookup fails or times out contributes an empty address set, and the
//! batch as a whole never errors.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio::time::timeout;

use super::Resolve;
use crate::base::{AddrFamily, Candidate, Domain};

/// Default number of name lookups in flight.
pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 20;

/// Default per-lookup timeout.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Batch resolver over any [`Resolve`] implementation.
pub struct DomainResolver {
    resolver: Arc<dyn Resolve>,
    concurrency: usize,
    per_lookup_timeout: Duration,
}

impl DomainResolver {
    pub fn new(resolver: Arc<dyn Resolve>) -> Self {
        Self {
            resolver,
            concurrency: DEFAULT_RESOLVE_CONCURRENCY,
            per_lookup_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, per_lookup_timeout: Duration) -> Self {
        self.per_lookup_timeout = per_lookup_timeout;
        self
    }

    /// Resolves every domain to its deduplicated address set.
    ///
    /// The returned map contains an entry for every requested domain;
    /// failed or timed-out lookups map to an empty set. Address order
    /// within a set follows resolver-reported order.
    pub async fn resolve_all(
        &self,
        domains: &[Domain],
        family: AddrFamily,
    ) -> HashMap<Domain, Vec<IpAddr>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut lookups = FuturesUnordered::new();

        for domain in domains {
            let domain = domain.clone();
            let resolver = Arc::clone(&self.resolver);
            let semaphore = Arc::clone(&semaphore);
            let per_lookup_timeout = self.per_lookup_timeout;

            lookups.push(async move {
                // Semaphore is never closed, acquire cannot fail.
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");

                let addrs = match timeout(per_lookup_timeout, resolver.resolve(domain.clone())).await
                {
                    Ok(Ok(addrs)) => {
                        let mut seen = Vec::new();
                        for addr in addrs {
                            if family.accepts(addr) && !seen.contains(&addr) {
                                seen.push(addr);
                            }
                        }
                        seen
                    }
                    Ok(Err(err)) => {
                        tracing::debug!(domain = %domain, error = %err, "lookup failed");
                        Vec::new()
                    }
                    Err(_) => {
                        tracing::debug!(domain = %domain, "lookup timed out");
                        Vec::new()
                    }
                };
                (domain, addrs)
            });
        }

        let mut out: HashMap<Domain, Vec<IpAddr>> = HashMap::with_capacity(domains.len());
        while let Some((domain, addrs)) = lookups.next().await {
            out.insert(domain, addrs);
        }
        out
    }

    /// Flattens a resolution into probe candidates, preserving the
    /// order of the input domain list.
    pub async fn resolve_candidates(
        &self,
        domains: &[Domain],
        family: AddrFamily,
    ) -> Vec<Candidate> {
        let mut resolved = self.resolve_all(domains, family).await;
        let mut candidates = Vec::new();
        for domain in domains {
            if let Some(addrs) = resolved.remove(domain) {
                for addr in addrs {
                    candidates.push(Candidate::new(addr, domain.clone()));
                }
            }
        }
        candidates
    }
}
