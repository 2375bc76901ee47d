use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
};

use crate::types::TimeMs;

pub type TimeoutId = u64;

/// What a timeout handler wants done with an item whose deadline passed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeoutResult {
    /// Re-arm the item for another full timeout period
    Refresh,
    /// Discard the item
    Delete,
}

pub trait TimeoutHandler<T> {
    fn handle_timeout(&mut self, timeout_id: TimeoutId, item: &T) -> TimeoutResult;
}

impl<T, F: FnMut(TimeoutId, &T) -> TimeoutResult> TimeoutHandler<T> for F {
    fn handle_timeout(&mut self, timeout_id: TimeoutId, item: &T) -> TimeoutResult {
        self(timeout_id, item)
    }
}

struct TimeoutItem<T> {
    user_data: T,
    timeout_ms: TimeMs,
    deadline: TimeMs,
}

/// Maps opaque timeout ids to deadlines.
///
/// Removing an item is O(1): its heap entry is left behind and skipped when
/// it reaches the top, since the id no longer resolves (or resolves to a
/// different deadline after a refresh).
pub struct TimeoutQueue<T> {
    next_id: TimeoutId,
    items: HashMap<TimeoutId, TimeoutItem<T>>,
    deadlines: BinaryHeap<DeadlineContainer>,
}

impl<T> TimeoutQueue<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            items: HashMap::new(),
            deadlines: BinaryHeap::new(),
        }
    }

    /// Registers `user_data` to time out `timeout_ms` after `now`
    pub fn add_item(&mut self, user_data: T, now: TimeMs, timeout_ms: TimeMs) -> TimeoutId {
        let timeout_id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let deadline = now.saturating_add(timeout_ms);
        self.items.insert(
            timeout_id,
            TimeoutItem {
                user_data,
                timeout_ms,
                deadline,
            },
        );
        self.deadlines.push(DeadlineContainer {
            deadline,
            timeout_id,
        });

        timeout_id
    }

    pub fn remove_item(&mut self, timeout_id: TimeoutId) -> Option<T> {
        self.items.remove(&timeout_id).map(|item| item.user_data)
    }

    pub fn retrieve_item(&self, timeout_id: TimeoutId) -> Option<&T> {
        self.items.get(&timeout_id).map(|item| &item.user_data)
    }

    /// Pushes an item's deadline out to a full timeout period from `now`
    pub fn reset_item(&mut self, timeout_id: TimeoutId, now: TimeMs) -> bool {
        let Some(item) = self.items.get_mut(&timeout_id) else {
            return false;
        };
        // a zero period still moves forward, otherwise a refreshing handler would spin
        item.deadline = now.saturating_add(item.timeout_ms.max(1));
        self.deadlines.push(DeadlineContainer {
            deadline: item.deadline,
            timeout_id,
        });
        true
    }

    /// Invokes `handler` for every item whose deadline is at or before `now`,
    /// in deadline order. Items the handler deletes are returned.
    pub fn update_timeouts<H: TimeoutHandler<T>>(&mut self, now: TimeMs, handler: &mut H) -> Vec<T> {
        let mut expired = Vec::new();

        while let Some(top) = self.deadlines.peek() {
            if top.deadline > now {
                break;
            }
            let Some(DeadlineContainer {
                deadline,
                timeout_id,
            }) = self.deadlines.pop()
            else {
                break;
            };

            let Some(item) = self.items.get(&timeout_id) else {
                // removed
                continue;
            };
            if item.deadline != deadline {
                // refreshed, a later heap entry is authoritative
                continue;
            }

            match handler.handle_timeout(timeout_id, &item.user_data) {
                TimeoutResult::Refresh => {
                    // Refresh from the deadline, never from an earlier time, so the heap progresses
                    let base = deadline.max(now);
                    self.reset_item(timeout_id, base);
                }
                TimeoutResult::Delete => {
                    if let Some(item) = self.items.remove(&timeout_id) {
                        expired.push(item.user_data);
                    }
                }
            }
        }

        expired
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.deadlines.clear();
    }
}

impl<T> Default for TimeoutQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Eq, PartialEq)]
struct DeadlineContainer {
    deadline: TimeMs,
    timeout_id: TimeoutId,
}

// Reversed so the BinaryHeap pops the earliest deadline first
impl Ord for DeadlineContainer {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.timeout_id.cmp(&self.timeout_id))
    }
}

impl PartialOrd for DeadlineContainer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
