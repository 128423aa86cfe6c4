//! DNS Resolution Module
//!
//! Provides pluggable DNS resolution behind the [`Resolve`] trait:
//! - System resolver (getaddrinfo via thread pool)
//! - Async hickory-dns resolver
//! - Bounded-concurrency batch resolution over either
//!
//! Batch resolution never fails as a whole: each domain that cannot be
//! resolved contributes an empty address set.

mod batch;
mod gai;
mod hickory;
mod resolve;

pub use batch::{DomainResolver, DEFAULT_RESOLVE_CONCURRENCY, DEFAULT_RESOLVE_TIMEOUT};
pub use gai::GaiResolver;
pub use hickory::HickoryResolver;
pub use resolve::{Addrs, Resolve, Resolving};
