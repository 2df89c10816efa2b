// Last-request-wins publication of recomputed results.
//
// Every parameter change takes a ticket. A result is only published if its
// ticket is still the newest one issued, so a slow superseded computation
// can never overwrite the result of a later request.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug)]
pub struct LatestSlot<T> {
    issued: AtomicU64,
    published: Mutex<Option<(Ticket, Arc<T>)>>,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self {
            issued: AtomicU64::new(0),
            published: Mutex::new(None),
        }
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Option<(Ticket, Arc<T>)>> {
        self.published.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take a ticket for a new request; supersedes all earlier tickets.
    pub fn issue(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket.0
    }

    /// Publish a result. Returns `false` (and drops the value) when a newer
    /// request has been issued since `ticket` was taken.
    pub fn publish(&self, ticket: Ticket, value: T) -> bool {
        let mut slot = self.guard();
        let newer_published = slot.as_ref().map(|(t, _)| *t >= ticket).unwrap_or(false);
        if !self.is_current(ticket) || newer_published {
            debug!("discarding superseded result for ticket {}", ticket.0);
            return false;
        }
        debug!("publishing result for ticket {}", ticket.0);
        *slot = Some((ticket, Arc::new(value)));
        true
    }

    pub fn latest(&self) -> Option<Arc<T>> {
        self.guard().as_ref().map(|(_, v)| Arc::clone(v))
    }
}

/// Run `compute` on a worker thread and publish through `slot`. The ticket
/// is taken before spawning, so request order decides the winner, not
/// completion order. The handle yields whether the result was published.
pub fn spawn_recompute<T, F>(slot: Arc<LatestSlot<T>>, compute: F) -> JoinHandle<bool>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let ticket = slot.issue();
    thread::spawn(move || {
        let value = compute();
        slot.publish(ticket, value)
    })
}
