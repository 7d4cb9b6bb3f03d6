//! Record enrichment
//!
//! Ratings, tags and badge data often arrive after a card is already on
//! screen. That data is kept in a side table keyed by record key instead of
//! being written into caller-owned records, and the keys waiting for it sit
//! in a bounded queue so a long scroll session can't grow it without limit.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::record::RecordKey;

/// Default capacity of the hydration queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 2000;

/// FIFO of keys waiting for hydration. Oldest entries are dropped when full.
#[derive(Debug)]
pub struct EnrichmentQueue {
    queue: VecDeque<RecordKey>,
    queued: HashSet<RecordKey>,
    capacity: usize,
    evicted: u64,
}

impl Default for EnrichmentQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl EnrichmentQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
            capacity: capacity.max(1),
            evicted: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of keys dropped because the queue was full
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Queues a key. Returns false if it was already queued.
    pub fn push(&mut self, key: RecordKey) -> bool {
        if self.queued.contains(&key) {
            return false;
        }
        while self.queue.len() >= self.capacity {
            if let Some(oldest) = self.queue.pop_front() {
                self.queued.remove(&oldest);
                self.evicted += 1;
            }
        }
        self.queued.insert(key.clone());
        self.queue.push_back(key);
        true
    }

    pub fn pop(&mut self) -> Option<RecordKey> {
        let key = self.queue.pop_front()?;
        self.queued.remove(&key);
        Some(key)
    }

    /// Takes up to `max` keys, oldest first
    pub fn take_batch(&mut self, max: usize) -> Vec<RecordKey> {
        let mut batch = Vec::with_capacity(max.min(self.queue.len()));
        while batch.len() < max {
            let Some(key) = self.pop() else { break };
            batch.push(key);
        }
        batch
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.queued.clear();
    }
}

/// Extra fields per record, kept next to the records instead of inside them.
#[derive(Debug, Default)]
pub struct ExtensionTable {
    fields: HashMap<RecordKey, HashMap<String, Value>>,
}

impl ExtensionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &RecordKey, field: &str) -> Option<&Value> {
        self.fields.get(key)?.get(field)
    }

    pub fn fields(&self, key: &RecordKey) -> Option<&HashMap<String, Value>> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: RecordKey, field: impl Into<String>, value: Value) {
        self.fields.entry(key).or_default().insert(field.into(), value);
    }

    /// Merges a set of fields. Returns true if anything changed.
    pub fn merge(&mut self, key: RecordKey, update: HashMap<String, Value>) -> bool {
        let entry = self.fields.entry(key).or_default();
        let mut changed = false;
        for (field, value) in update {
            if entry.get(&field) != Some(&value) {
                entry.insert(field, value);
                changed = true;
            }
        }
        changed
    }

    pub fn remove(&mut self, key: &RecordKey) {
        self.fields.remove(key);
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

/// Table shared with async enrichment tasks
pub type SharedExtensions = Arc<Mutex<ExtensionTable>>;

pub fn create_shared_extensions() -> SharedExtensions {
    Arc::new(Mutex::new(ExtensionTable::new()))
}
