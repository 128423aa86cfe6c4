//! Async DNS resolver using hickory-dns.
//!
//! Fully async resolution with system configuration auto-detection and
//! dual-stack (IPv4 + IPv6) lookup. Unlike [`GaiResolver`], no blocking
//! tasks are spawned and results bypass the local hosts file, which
//! makes this the right resolver for discovering *fresh* candidate
//! addresses rather than re-reading an existing override.
//!
//! [`GaiResolver`]: super::GaiResolver

use std::{io, net::IpAddr, sync::Arc, sync::LazyLock};

use hickory_resolver::{
    config::{LookupIpStrategy, ResolverConfig},
    name_server::TokioConnectionProvider,
    TokioResolver,
};

use super::{Addrs, Resolve, Resolving};
use crate::base::{Domain, NetError};

/// Async DNS resolver backed by hickory-dns.
///
/// Lazily initialized on first use and shared across all instances via
/// a static `LazyLock`. Automatically configures itself from system DNS
/// settings, falling back to defaults when that fails.
#[derive(Debug, Clone)]
pub struct HickoryResolver {
    resolver: &'static LazyLock<TokioResolver>,
}

impl HickoryResolver {
    pub fn new() -> Self {
        static RESOLVER: LazyLock<TokioResolver> = LazyLock::new(|| {
            let mut builder = match TokioResolver::builder_tokio() {
                Ok(builder) => {
                    tracing::debug!("Using system DNS configuration");
                    builder
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Failed to read system DNS config, using defaults"
                    );
                    TokioResolver::builder_with_config(
                        ResolverConfig::default(),
                        TokioConnectionProvider::default(),
                    )
                }
            };

            // Candidate discovery wants both families; the engine
            // filters by AddrFamily afterwards.
            builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

            builder.build()
        });

        Self {
            resolver: &RESOLVER,
        }
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolve for HickoryResolver {
    fn resolve(&self, domain: Domain) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            tracing::debug!(domain = %domain, "resolving via hickory-dns");

            let lookup = resolver
                .resolver
                .lookup_ip(domain.as_str())
                .await
                .map_err(|e| {
                    tracing::debug!(domain = %domain, error = %e, "hickory-dns lookup failed");
                    NetError::NameNotResolvedFor {
                        domain: domain.as_str().to_string(),
                        source: Arc::new(io::Error::new(io::ErrorKind::NotFound, e.to_string())),
                    }
                })?;

            let addrs: Vec<IpAddr> = lookup.iter().collect();

            if addrs.is_empty() {
                return Err(NetError::NameNotResolvedFor {
                    domain: domain.as_str().to_string(),
                    source: Arc::new(io::Error::new(
                        io::ErrorKind::NotFound,
                        "No addresses returned",
                    )),
                });
            }

            tracing::debug!(domain = %domain, count = addrs.len(), "hickory-dns resolution complete");
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hickory_resolver_is_clone() {
        let r1 = HickoryResolver::new();
        let r2 = r1.clone();
        // Both should point to the same static resolver
        assert!(std::ptr::eq(r1.resolver, r2.resolver));
    }
}
