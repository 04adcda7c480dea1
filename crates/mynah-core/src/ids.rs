//! Process-wide identifier generation and the guid dedup hash.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Issues process-wide unique, strictly increasing 64-bit identifiers.
///
/// Seeded from the wall clock in nanoseconds at construction, then
/// advanced by exactly one per call. The counter is not persisted: after a
/// restart the fresh clock seed lands far above anything issued before,
/// which is all the uniqueness contract requires.
#[derive(Debug)]
pub struct IdSequence {
    counter: AtomicU64,
}

impl IdSequence {
    /// Seed from the current wall clock.
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::starting_at(nanos)
    }

    /// Seed explicitly. The first call to [`next`](Self::next) returns
    /// `seed + 1`.
    pub fn starting_at(seed: u64) -> Self {
        Self {
            counter: AtomicU64::new(seed),
        }
    }

    /// Return the next identifier.
    ///
    /// Safe under arbitrary concurrency: no two calls ever observe the
    /// same value, and each caller sees a strictly increasing sequence.
    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive the dedup key for a feed entry from its guid.
///
/// The same guid always maps to the same key, across processes and
/// restarts.
pub fn guid_hash(guid: &str) -> i64 {
    let digest = blake3::hash(guid.as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest.as_bytes()[..8]);
    i64::from_le_bytes(buf)
}
