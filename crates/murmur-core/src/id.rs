//! Connection identifiers.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

/// Process-unique identifier of one live stream connection.
///
/// Two sessions opened by the same username get distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw id. Only [`ConnectionIds`] hands out ids in production.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Monotonic [`ConnectionId`] generator owned by the server.
///
/// Ids start at 1 and are never reused for the lifetime of the generator.
#[derive(Debug)]
pub struct ConnectionIds {
    next: AtomicU64,
}

impl ConnectionIds {
    /// Create a generator whose first id is `conn-1`.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionIds {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let ids = ConnectionIds::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(b > a);
        assert_eq!(a.to_string(), "conn-1");
    }

    #[test]
    fn concurrent_allocation_never_repeats() {
        let ids = Arc::new(ConnectionIds::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || (0..500).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 8 * 500);
    }
}
