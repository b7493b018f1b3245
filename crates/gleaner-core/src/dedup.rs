//! Duplicate suppression for incremental mode.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::record::Record;

/// Content-hash set membership test over canonical record serializations.
///
/// Inert unless the job runs in incremental mode. The seen-set lives as
/// long as the job; each job owns its own instance.
#[derive(Clone, Debug)]
pub struct Deduplicator {
    active: bool,
    seen: Arc<Mutex<HashSet<String>>>,
}

impl Deduplicator {
    pub fn new(incremental: bool) -> Self {
        Self {
            active: incremental,
            seen: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True if an identical record was already seen; first occurrences are
    /// registered and return false. Always false when inactive.
    pub fn is_duplicate(&self, record: &Record) -> bool {
        if !self.active {
            return false;
        }
        let hash = record.canonical_hash();
        let mut seen = self.seen.lock().unwrap();
        !seen.insert(hash)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> Record {
        let mut r = Record::new();
        r.insert_text("title", title);
        r.insert_text("price", "9.99");
        r
    }

    #[test]
    fn inactive_dedup_never_flags() {
        let dedup = Deduplicator::new(false);
        let r = record("a");
        assert!(!dedup.is_duplicate(&r));
        assert!(!dedup.is_duplicate(&r));
        assert_eq!(dedup.seen_count(), 0);
    }

    #[test]
    fn repeat_content_flags_on_second_sight() {
        let dedup = Deduplicator::new(true);
        let r = record("a");
        assert!(!dedup.is_duplicate(&r));
        assert!(dedup.is_duplicate(&r));
        assert!(!dedup.is_duplicate(&record("b")));
        assert_eq!(dedup.seen_count(), 2);
    }

    #[test]
    fn key_order_does_not_defeat_dedup() {
        let dedup = Deduplicator::new(true);

        let mut first = Record::new();
        first.insert_text("title", "a");
        first.insert_text("price", "9.99");

        let mut reordered = Record::new();
        reordered.insert_text("price", "9.99");
        reordered.insert_text("title", "a");

        assert!(!dedup.is_duplicate(&first));
        assert!(dedup.is_duplicate(&reordered));
    }
}
