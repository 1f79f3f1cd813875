pub mod score;

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use priority_queue::PriorityQueue;
use tracing::trace;

use site_parser_core::FrontierItem;

/// Heap priority: lower score first, then FIFO by insertion sequence.
/// `PriorityQueue` pops its greatest priority, so the ordering is inverted
/// here instead of at every call site.
#[derive(Debug, Clone, Copy)]
struct Priority {
    score: f64,
    seq: u64,
}

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.score.to_bits() == other.score.to_bits() && self.seq == other.seq
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// URL key for the priority queue (must be Hash + Eq).
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct UrlKey(String);

/// Priority queue of pending fetches. Not synchronised; the engine holds it
/// behind its state mutex together with the seen-set and counters.
#[derive(Default)]
pub struct Frontier {
    queue: PriorityQueue<UrlKey, Priority>,
    items: HashMap<String, FrontierItem>,
    seq: u64,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an item. Callers are expected to have consulted the seen-set
    /// first; a duplicate key would otherwise displace the earlier entry.
    pub fn push(&mut self, item: FrontierItem) {
        let key = item.url.key().to_string();
        let priority = Priority {
            score: item.score,
            seq: self.seq,
        };
        self.seq += 1;
        trace!(url = %item.url, depth = item.depth, score = item.score, "enqueued");
        self.items.insert(key.clone(), item);
        self.queue.push(UrlKey(key), priority);
    }

    /// Strictly in (score, insertion) order.
    pub fn pop(&mut self) -> Option<FrontierItem> {
        let (key, _priority) = self.queue.pop()?;
        self.items.remove(&key.0)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Canonical-URL keys already enqueued or fetched. Updated at enqueue time
/// so a URL can never be queued twice.
#[derive(Default)]
pub struct SeenSet(HashSet<String>);

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the key was new.
    pub fn insert(&mut self, key: &str) -> bool {
        self.0.insert(key.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
