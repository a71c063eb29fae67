//! Compression statistics.
//!
//! Counters use atomics so a compressor shared behind an `Arc` can be
//! observed from another thread while a compression run is in flight.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated during compression.
#[derive(Debug, Default)]
pub struct CompressionStats {
    input_bytes: AtomicU64,
    messages: AtomicU64,
    logtypes: AtomicU64,
    var_dict_entries: AtomicU64,
}

impl CompressionStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add processed input bytes.
    pub fn add_input_bytes(&self, bytes: u64) {
        self.input_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Count one encoded message.
    pub fn add_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one newly interned logtype.
    pub fn add_logtype(&self) {
        self.logtypes.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one newly interned dictionary variable.
    pub fn add_var_dict_entry(&self) {
        self.var_dict_entries.fetch_add(1, Ordering::Relaxed);
    }

    /// Processed input bytes so far.
    pub fn input_bytes(&self) -> u64 {
        self.input_bytes.load(Ordering::Relaxed)
    }

    /// Capture a point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            input_bytes: self.input_bytes.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
            logtypes: self.logtypes.load(Ordering::Relaxed),
            var_dict_entries: self.var_dict_entries.load(Ordering::Relaxed),
        }
    }
}

/// Immutable copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Processed input bytes.
    pub input_bytes: u64,
    /// Encoded messages.
    pub messages: u64,
    /// Distinct logtypes.
    pub logtypes: u64,
    /// Distinct dictionary variables.
    pub var_dict_entries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_snapshot_reflects_counts() {
        let stats = CompressionStats::new();
        stats.add_input_bytes(100);
        stats.add_message();
        stats.add_message();
        stats.add_logtype();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.input_bytes, 100);
        assert_eq!(snapshot.messages, 2);
        assert_eq!(snapshot.logtypes, 1);
        assert_eq!(snapshot.var_dict_entries, 0);
    }

    #[test]
    fn test_concurrent_updates() {
        let stats = Arc::new(CompressionStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        stats.add_input_bytes(1);
                        stats.add_message();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.input_bytes, 400);
        assert_eq!(snapshot.messages, 400);
    }
}
