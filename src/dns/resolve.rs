//! Core DNS resolution trait and supporting types.

use std::{future::Future, net::IpAddr, pin::Pin, sync::Arc};

use crate::base::{Domain, NetError};

/// Alias for an `Iterator` trait object over resolved addresses.
pub type Addrs = Box<dyn Iterator<Item = IpAddr> + Send>;

/// Alias for the `Future` type returned by a DNS resolver.
pub type Resolving = Pin<Box<dyn Future<Output = Result<Addrs, NetError>> + Send>>;

/// Trait for DNS resolution.
///
/// Implementations must be thread-safe; resolution takes `&self` so a
/// single resolver can serve many concurrent lookups. Returns boxed
/// futures for trait object compatibility.
pub trait Resolve: Send + Sync {
    /// Resolves a domain name to IP addresses.
    fn resolve(&self, domain: Domain) -> Resolving;
}

/// Blanket implementation for Arc-wrapped resolvers.
impl<R: Resolve + ?Sized> Resolve for Arc<R> {
    fn resolve(&self, domain: Domain) -> Resolving {
        (**self).resolve(domain)
    }
}
