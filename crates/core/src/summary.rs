//! Operation counters shared by concurrent workers

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Final counts of a mutating operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub added: usize,
    pub deleted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl Summary {
    /// Number of operations performed (or planned, in a dry run)
    pub fn operations(&self) -> usize {
        self.added + self.deleted + self.updated
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} added {} deleted {} updated {} unchanged",
            self.added, self.deleted, self.updated, self.unchanged
        )
    }
}

/// Lock-free counters updated from workers
#[derive(Debug, Default)]
pub struct Tally {
    added: AtomicUsize,
    deleted: AtomicUsize,
    updated: AtomicUsize,
    unchanged: AtomicUsize,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self) {
        self.added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delete(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn deleted_many(&self, n: usize) {
        self.deleted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn update(&self) {
        self.updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_unchanged(&self, n: usize) {
        self.unchanged.store(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Summary {
        Summary {
            added: self.added.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_summary_display() {
        let summary = Summary {
            added: 2,
            deleted: 0,
            updated: 1,
            unchanged: 5,
        };
        assert_eq!(
            summary.to_string(),
            "2 added 0 deleted 1 updated 5 unchanged"
        );
        assert_eq!(summary.operations(), 3);
    }

    #[tokio::test]
    async fn test_tally_counts_from_many_tasks() {
        let tally = Arc::new(Tally::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tally = Arc::clone(&tally);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    tally.add();
                }
                tally.deleted_many(2);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let summary = tally.snapshot();
        assert_eq!(summary.added, 800);
        assert_eq!(summary.deleted, 16);
    }
}
