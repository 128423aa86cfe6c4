//! Core types and error definitions.

pub mod model;
pub mod neterror;

pub use model::{AddrFamily, Candidate, Domain, ProbeResult, ProbeStatus, Selection};
pub use neterror::{FetchError, FlushError, NetError, StoreError};
