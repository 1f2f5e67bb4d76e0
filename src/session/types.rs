// Session keyspace helpers

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Prefix used when the caller does not supply one
pub const DEFAULT_PREFIX: &str = "scs:session:";

/// Token → record mapping returned by enumeration
pub type SessionMap = HashMap<String, Vec<u8>>;

/// Relative time-to-live for `expiry`, in whole seconds (truncated toward zero).
///
/// Truncation means a record can expire up to one second before `expiry`
/// (a +5.9s expiry is written as `EX 5`). An expiry less than one second ahead,
/// or at or before `now`, yields zero or a negative value; callers pass it
/// through unchanged and Redis rejects the write.
pub fn ttl_seconds(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expiry - now).num_seconds()
}

/// Build a `SCAN MATCH` pattern matching every key that starts with `prefix`.
///
/// Glob metacharacters in the prefix are escaped so they match literally.
pub fn match_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}
