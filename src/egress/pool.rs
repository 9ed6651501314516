//! Round-robin egress selection.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::egress::entry::{EgressEntry, EgressParseError};

/// Static list of egress identities with a rotating cursor.
///
/// The cursor is owned by the pool and only advanced through [`EgressPool::next`].
/// No health is tracked: an entry that failed last time is handed out again on
/// its next turn.
#[derive(Debug, Default)]
pub struct EgressPool {
    entries: Vec<EgressEntry>,
    cursor: AtomicUsize,
}

impl EgressPool {
    pub fn new(entries: Vec<EgressEntry>) -> Self {
        Self {
            entries,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Build a pool from configured descriptors.
    pub fn from_descriptors<S: AsRef<str>>(descriptors: &[S]) -> Result<Self, EgressParseError> {
        let entries = descriptors
            .iter()
            .map(|d| EgressEntry::parse(d.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(entries))
    }

    /// Next entry in cyclic order, or `None` when the pool is empty.
    pub fn next(&self) -> Option<EgressEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.entries.len();
        Some(self.entries[index].clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let pool = EgressPool::from_descriptors(&[
            "10.0.0.1:8080",
            "10.0.0.2:8080",
            "10.0.0.3:8080",
        ])
        .unwrap();

        let picked: Vec<String> = (0..7).map(|_| pool.next().unwrap().proxy_server()).collect();
        assert_eq!(
            picked,
            vec![
                "http://10.0.0.1:8080",
                "http://10.0.0.2:8080",
                "http://10.0.0.3:8080",
                "http://10.0.0.1:8080",
                "http://10.0.0.2:8080",
                "http://10.0.0.3:8080",
                "http://10.0.0.1:8080",
            ]
        );
    }

    #[test]
    fn test_empty_pool_yields_none() {
        let pool = EgressPool::default();
        assert!(pool.next().is_none());
        assert!(pool.next().is_none());
    }

    #[test]
    fn test_concurrent_selection_is_balanced() {
        use std::collections::HashMap;
        use std::sync::Arc;

        let pool = Arc::new(EgressPool::from_descriptors(&["10.0.0.1:1", "10.0.0.2:2"]).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    (0..50).map(|_| pool.next().unwrap().proxy_server()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for server in handle.join().unwrap() {
                *counts.entry(server).or_default() += 1;
            }
        }
        assert_eq!(counts["http://10.0.0.1:1"], 100);
        assert_eq!(counts["http://10.0.0.2:2"], 100);
    }
}
