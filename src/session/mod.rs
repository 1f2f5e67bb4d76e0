// Session record storage
// Prefixed Redis keyspace with server-side expiry and cursor-based enumeration

pub mod cluster;
pub mod redis_store;
pub mod scan;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use cluster::{ClusterPrimary, discover_primaries, parse_cluster_nodes};
pub use redis_store::RedisStore;
pub use scan::{SCAN_START, ScanPage, scan_pages, scan_pages_from};
pub use storage::{LegacySessionStore, SessionStore};
pub use types::{DEFAULT_PREFIX, SessionMap, match_pattern, ttl_seconds};
