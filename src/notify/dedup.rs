//! Recently delivered message ids
//!
//! The outgoing consumer checks each message id here before calling
//! Telegram, so a redelivered batch does not repeat messages that already
//! went out.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub struct RecentMessages {
    seen: Mutex<HashMap<Uuid, Instant>>,
    ttl: Duration,
    max_entries: usize,
}

impl RecentMessages {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// True when `id` was recorded within the TTL. Does not record.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.seen
            .lock()
            .get(id)
            .is_some_and(|at| at.elapsed() < self.ttl)
    }

    /// Record a delivered id
    pub fn record(&self, id: Uuid) {
        let mut seen = self.seen.lock();
        seen.insert(id, Instant::now());
        if seen.len() > self.max_entries {
            Self::gc(&mut seen, self.ttl, self.max_entries);
        }
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn gc(seen: &mut HashMap<Uuid, Instant>, ttl: Duration, max_entries: usize) {
        seen.retain(|_, at| at.elapsed() < ttl);

        // Still too big: drop the oldest
        if seen.len() > max_entries {
            let mut entries: Vec<(Uuid, Instant)> = seen.iter().map(|(k, v)| (*k, *v)).collect();
            entries.sort_by_key(|(_, at)| *at);
            let excess = entries.len() - max_entries;
            for (id, _) in entries.into_iter().take(excess) {
                seen.remove(&id);
            }
        }
    }
}
