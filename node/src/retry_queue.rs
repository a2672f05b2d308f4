//! In-memory retry schedule for ledger submissions.
//! Holds at most one entry per idempotency key; the dispatch loop feeds
//! it the current time and acts on whatever has come due.

use docket_types::{PayloadHash, Timestamp};
use std::collections::HashMap;

/// Maximum tracked submissions.
const MAX_ENTRIES: usize = 4096;

pub struct RetryQueue {
    /// Payloads awaiting (re)submission, keyed by content hash.
    entries: HashMap<[u8; 32], Entry>,
    max_entries: usize,
    /// Base backoff delay in seconds; failure n waits `base * 2^n`.
    base_delay_secs: u64,
}

struct Entry {
    hash: PayloadHash,
    enqueued_at: Timestamp,
    due_at: Timestamp,
}

impl RetryQueue {
    pub fn new(max_entries: usize, base_delay_secs: u64) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
            base_delay_secs,
        }
    }

    pub fn with_default(base_delay_secs: u64) -> Self {
        Self::new(MAX_ENTRIES, base_delay_secs)
    }

    /// Backoff delay after `failures` failed attempts.
    pub fn delay_for(&self, failures: u32) -> u64 {
        let shift = failures.min(31);
        self.base_delay_secs.saturating_mul(1u64 << shift)
    }

    /// Queue an immediate attempt. A key already queued keeps its
    /// earlier due time.
    pub fn enqueue_now(&mut self, hash: PayloadHash, now: Timestamp) {
        self.insert(hash, now, now);
    }

    /// Schedule a retry after `failures` failed attempts, backing off
    /// exponentially from the base delay.
    pub fn schedule_retry(&mut self, hash: PayloadHash, failures: u32, now: Timestamp) {
        let due_at = now.plus_secs(self.delay_for(failures));
        self.insert(hash, now, due_at);
    }

    /// Queue an attempt at an explicit time (recovery of a persisted
    /// schedule).
    pub fn schedule_at(&mut self, hash: PayloadHash, due_at: Timestamp, now: Timestamp) {
        self.insert(hash, now, due_at);
    }

    fn insert(&mut self, hash: PayloadHash, now: Timestamp, due_at: Timestamp) {
        if let Some(entry) = self.entries.get_mut(hash.as_bytes()) {
            if due_at < entry.due_at {
                entry.due_at = due_at;
            }
            return;
        }
        if self.entries.len() >= self.max_entries {
            // Evict the oldest entry to stay bounded.
            if let Some(oldest) = self
                .entries
                .values()
                .min_by_key(|e| e.enqueued_at)
                .map(|e| e.hash)
            {
                self.entries.remove(oldest.as_bytes());
            }
        }
        self.entries.insert(
            *hash.as_bytes(),
            Entry {
                hash,
                enqueued_at: now,
                due_at,
            },
        );
    }

    /// Remove and return every entry due at `now`.
    pub fn pop_due(&mut self, now: Timestamp) -> Vec<PayloadHash> {
        let due: Vec<PayloadHash> = self
            .entries
            .values()
            .filter(|e| e.due_at <= now)
            .map(|e| e.hash)
            .collect();
        for hash in &due {
            self.entries.remove(hash.as_bytes());
        }
        due
    }

    /// Drop a key outright (record settled or abandoned).
    pub fn remove(&mut self, hash: &PayloadHash) {
        self.entries.remove(hash.as_bytes());
    }

    pub fn contains(&self, hash: &PayloadHash) -> bool {
        self.entries.contains_key(hash.as_bytes())
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

    fn hash(n: u8) -> PayloadHash {
        let mut bytes = [0u8; 32];
        bytes[0] = n;
        PayloadHash::new(bytes)
    }

    #[test]
    fn immediate_entries_come_due_at_once() {
        let mut queue = RetryQueue::with_default(60);
        queue.enqueue_now(hash(1), Timestamp::new(100));
        assert!(queue.contains(&hash(1)));

        let due = queue.pop_due(Timestamp::new(100));
        assert_eq!(due, vec![hash(1)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn backoff_doubles_per_failure() {
        let queue = RetryQueue::with_default(60);
        assert_eq!(queue.delay_for(0), 60);
        assert_eq!(queue.delay_for(1), 120);
        assert_eq!(queue.delay_for(2), 240);
        assert!(queue.delay_for(0) < queue.delay_for(1));
        assert!(queue.delay_for(1) < queue.delay_for(2));
    }

    #[test]
    fn scheduled_retry_is_not_due_early() {
        let mut queue = RetryQueue::with_default(60);
        queue.schedule_retry(hash(1), 1, Timestamp::new(100));

        assert!(queue.pop_due(Timestamp::new(219)).is_empty());
        assert_eq!(queue.pop_due(Timestamp::new(220)), vec![hash(1)]);
    }

    #[test]
    fn one_entry_per_key_keeps_earliest_due_time() {
        let mut queue = RetryQueue::with_default(60);
        queue.enqueue_now(hash(1), Timestamp::new(100));
        queue.schedule_retry(hash(1), 2, Timestamp::new(100));
        assert_eq!(queue.len(), 1);
        // The immediate due time wins over the later retry.
        assert_eq!(queue.pop_due(Timestamp::new(100)), vec![hash(1)]);
    }

    #[test]
    fn later_enqueue_pulls_due_time_forward() {
        let mut queue = RetryQueue::with_default(60);
        queue.schedule_retry(hash(1), 3, Timestamp::new(100));
        queue.enqueue_now(hash(1), Timestamp::new(150));
        assert_eq!(queue.pop_due(Timestamp::new(150)), vec![hash(1)]);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut queue = RetryQueue::new(2, 60);
        queue.enqueue_now(hash(1), Timestamp::new(100));
        queue.enqueue_now(hash(2), Timestamp::new(200));
        queue.enqueue_now(hash(3), Timestamp::new(300));

        assert_eq!(queue.len(), 2);
        assert!(!queue.contains(&hash(1)));
        assert!(queue.contains(&hash(2)));
        assert!(queue.contains(&hash(3)));
    }

    #[test]
    fn remove_settled_key() {
        let mut queue = RetryQueue::with_default(60);
        queue.enqueue_now(hash(1), Timestamp::new(100));
        queue.remove(&hash(1));
        assert!(queue.pop_due(Timestamp::new(1_000)).is_empty());
    }
}
