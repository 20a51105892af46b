use std::collections::VecDeque;

use tracing::debug;

/// Least-recently-used cache of inference sessions keyed by model name.
///
/// Entries are ordered from least to most recently used. Eviction is lazy:
/// nothing is dropped until an insertion would exceed the capacity.
pub struct SessionCache<S> {
    capacity: usize,
    entries: VecDeque<(String, S)>,
}

impl<S> SessionCache<S> {
    /// Creates an empty cache. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Checks residency without touching recency.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Returns the session for `name`, promoting it to most recently used.
    pub fn get(&mut self, name: &str) -> Option<&S> {
        let pos = self.position(name)?;
        if pos + 1 != self.entries.len() {
            let entry = self.entries.remove(pos)?;
            self.entries.push_back(entry);
        }
        self.entries.back().map(|(_, session)| session)
    }

    /// Drops the least recently used session and returns it.
    pub fn evict_lru(&mut self) -> Option<(String, S)> {
        let evicted = self.entries.pop_front();
        if let Some((name, _)) = &evicted {
            debug!("Evicted session {}", name);
        }
        evicted
    }

    /// Inserts a session as most recently used, evicting older sessions while
    /// the cache is full. Re-inserting a resident name replaces its session.
    pub fn insert(&mut self, name: String, session: S) -> Vec<(String, S)> {
        let mut evicted = Vec::new();
        if let Some(pos) = self.position(&name) {
            if let Some(old) = self.entries.remove(pos) {
                evicted.push(old);
            }
        }
        while self.is_full() {
            match self.evict_lru() {
                Some(entry) => evicted.push(entry),
                None => break,
            }
        }
        self.entries.push_back((name, session));
        evicted
    }

    /// Removes the session for `name`, if resident.
    pub fn remove(&mut self, name: &str) -> Option<S> {
        let pos = self.position(name)?;
        self.entries.remove(pos).map(|(_, session)| session)
    }

    /// Resident names from least to most recently used.
    pub fn resident_names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }
}
