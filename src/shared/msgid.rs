//! Message ID Generation
//!
//! Time-prefixed unique message ids. The nanosecond wall-clock prefix keeps
//! ids roughly ordered by submission time (range scans and client-side sort
//! rely on comparability, not strict monotonicity); the atomic sequence
//! disambiguates ids minted in the same nanosecond.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Message id generator shared by all sessions on a gateway.
#[derive(Debug, Default)]
pub struct MessageIdGenerator {
    sequence: AtomicU64,
}

impl MessageIdGenerator {
    pub fn new() -> Self {
        Self {
            sequence: AtomicU64::new(0),
        }
    }

    /// Generate a new message id, e.g. `1722578400123456789-0042`.
    pub fn generate(&self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_nanos() as u64;
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
        format!("{}-{:04}", nanos, seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique() {
        let gen = MessageIdGenerator::new();
        let id1 = gen.generate();
        let id2 = gen.generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_time_prefix() {
        let gen = MessageIdGenerator::new();
        let id = gen.generate();
        let prefix: u64 = id
            .split('-')
            .next()
            .and_then(|p| p.parse().ok())
            .expect("id should start with a nanosecond timestamp");
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64;
        assert!(prefix <= now);
        assert!(prefix > now - 1_000_000_000); // within one second
    }

    #[test]
    fn test_sequence_wraps_into_suffix() {
        let gen = MessageIdGenerator::new();
        let ids: Vec<String> = (0..100).map(|_| gen.generate()).collect();
        let unique: std::collections::HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }
}
