//! Hosts File Store Module
//!
//! Marker-delimited managed region, atomic rewrites, timestamped
//! backups and resolver-cache flush.

mod region;
mod store;

pub use region::{
    build_block, locate, parse_entries, replace, Region, RegionDefect, END_MARKER, START_MARKER,
};
pub use store::{flush_resolver_cache, HostsFileStore, HostsSnapshot};
