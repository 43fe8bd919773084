use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::models::question::Question;

#[derive(Debug)]
struct Entry {
    question: Arc<Question>,
    stored_at: Instant,
}

/// Validated questions keyed by id. Entries expire after `ttl`, which is the
/// only invalidation path; `purge_expired` is run by the background sweep.
/// A zero ttl disables caching.
#[derive(Clone, Debug)]
pub struct QuestionCache {
    ttl: Duration,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl QuestionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Question>> {
        self.get_at(id, Instant::now())
    }

    fn get_at(&self, id: &str, now: Instant) -> Option<Arc<Question>> {
        let mut guard = self.entries.lock().expect("question cache mutex poisoned");
        match guard.get(id) {
            Some(entry) if now.duration_since(entry.stored_at) < self.ttl => {
                Some(Arc::clone(&entry.question))
            }
            Some(_) => {
                guard.remove(id);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, question: Arc<Question>) {
        if self.ttl.is_zero() {
            return;
        }
        let mut guard = self.entries.lock().expect("question cache mutex poisoned");
        guard.insert(
            question.id.clone(),
            Entry {
                question,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drops expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.entries.lock().expect("question cache mutex poisoned");
        let before = guard.len();
        guard.retain(|_, entry| now.duration_since(entry.stored_at) < self.ttl);
        before - guard.len()
    }
}
