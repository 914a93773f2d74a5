//! Work queue abstraction.
//!
//! Mirrors the visibility semantics the workers rely on: a received
//! message is invisible until deleted (acknowledged) or released
//! (returned for redelivery). Messages in the same group deliver in
//! FIFO order, and a group with a message in flight delivers nothing
//! further until that message settles.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, PoisonError},
};

/// One received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Receipt handle used to delete or release this delivery
    pub receipt: String,
    /// FIFO ordering group (office or sender)
    pub group_id: String,
    /// Raw job JSON
    pub body: String,
}

/// Queue operations the worker needs.
pub trait WorkQueue: Send + Sync + 'static {
    /// Receive up to `max` visible messages, at most one per group.
    fn receive(&self, max: usize) -> Vec<QueueMessage>;

    /// Acknowledge a delivery; the message is gone.
    fn delete(&self, receipt: &str) -> bool;

    /// Return an in-flight message for redelivery at its group's head.
    fn release(&self, receipt: &str) -> bool;

    /// Visible plus in-flight message count.
    fn depth(&self) -> u64;
}

#[derive(Default)]
struct QueueInner {
    /// Group insertion order, for deterministic receive order
    group_order: Vec<String>,
    groups: HashMap<String, VecDeque<String>>,
    in_flight: HashMap<String, (String, String)>,
    next_receipt: u64,
}

/// In-memory FIFO-per-group queue.
///
/// Backs local runs and tests; deployments substitute a managed queue
/// with the same semantics.
#[derive(Default)]
pub struct InMemoryQueue {
    inner: Mutex<QueueInner>,
}

impl InMemoryQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a job body into `group_id`.
    pub fn push(&self, group_id: &str, body: String) {
        let mut inner = self.lock();
        if !inner.groups.contains_key(group_id) {
            inner.group_order.push(group_id.to_string());
        }
        inner.groups.entry(group_id.to_string()).or_default().push_back(body);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WorkQueue for InMemoryQueue {
    fn receive(&self, max: usize) -> Vec<QueueMessage> {
        let mut inner = self.lock();
        let mut received = Vec::new();

        let groups: Vec<String> = inner.group_order.clone();
        for group_id in groups {
            if received.len() >= max {
                break;
            }
            // A group with an in-flight message stays blocked.
            let blocked =
                inner.in_flight.values().any(|(in_flight_group, _)| *in_flight_group == group_id);
            if blocked {
                continue;
            }
            let Some(body) = inner.groups.get_mut(&group_id).and_then(VecDeque::pop_front) else {
                continue;
            };

            inner.next_receipt += 1;
            let receipt = format!("rcpt-{}", inner.next_receipt);
            inner.in_flight.insert(receipt.clone(), (group_id.clone(), body.clone()));
            received.push(QueueMessage { receipt, group_id, body });
        }
        received
    }

    fn delete(&self, receipt: &str) -> bool {
        self.lock().in_flight.remove(receipt).is_some()
    }

    fn release(&self, receipt: &str) -> bool {
        let mut inner = self.lock();
        let Some((group_id, body)) = inner.in_flight.remove(receipt) else {
            return false;
        };
        inner.groups.entry(group_id).or_default().push_front(body);
        true
    }

    fn depth(&self) -> u64 {
        let inner = self.lock();
        let queued: usize = inner.groups.values().map(VecDeque::len).sum();
        (queued + inner.in_flight.len()) as u64
    }
}
