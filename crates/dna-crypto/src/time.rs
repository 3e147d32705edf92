//! Monotonic-enough Unix time helpers. Every TTL/expiry calculation in the
//! record codecs and bootstrap cache goes through these two functions so
//! tests can reason about a single source of "now".

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
