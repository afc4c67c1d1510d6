use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};

/// Bounded memory of request ids already admitted. The oldest id is evicted
/// once `capacity` is reached.
pub struct RecentRequests {
    capacity: usize,
    inner: Mutex<Seen>,
}

struct Seen {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl RecentRequests {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Seen {
                ids: HashSet::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Returns false when `request_id` was already seen.
    pub fn insert(&self, request_id: &str) -> bool {
        let mut seen = self.inner.lock();
        if seen.ids.contains(request_id) {
            return false;
        }
        if seen.order.len() >= self.capacity {
            if let Some(oldest) = seen.order.pop_front() {
                seen.ids.remove(&oldest);
            }
        }
        seen.ids.insert(request_id.to_string());
        seen.order.push_back(request_id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
