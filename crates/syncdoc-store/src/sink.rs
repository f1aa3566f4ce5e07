//! Per-subscription delivery queue.
//!
//! A sink is written by the router and drained by the owning session's
//! send unit. Every offer is non-blocking: content is dropped when the
//! queue is full, a signal is coalesced while one is already pending, and
//! termination always succeeds.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use syncdoc_core::Message;
use tokio::sync::Notify;

/// Something handed from a sink to its session.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    /// A full envelope, forwarded as-is.
    Content(Message),
    /// The document changed; re-read its current value.
    Signal,
    /// The document was deleted; the subscription is over.
    Terminal,
}

/// Result of offering a notification to a sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Offer {
    /// Accepted.
    Delivered,
    /// Content queue was full; the message was discarded.
    Dropped,
    /// A signal was already pending.
    Coalesced,
    /// The sink is terminal and accepts nothing further.
    Closed,
}

#[derive(Default)]
struct SinkState {
    content: VecDeque<Message>,
    signal_pending: bool,
    terminal: bool,
    terminal_taken: bool,
}

/// Bounded delivery queue for one (session, path) subscription.
pub struct SubscriberSink {
    path: String,
    capacity: usize,
    state: Mutex<SinkState>,
    wake: Arc<Notify>,
}

impl SubscriberSink {
    /// Create a sink for `path` holding at most `capacity` content messages
    /// (minimum 1). `wake` is notified whenever something is accepted.
    pub fn new(path: impl Into<String>, capacity: usize, wake: Arc<Notify>) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
            state: Mutex::new(SinkState::default()),
            wake,
        }
    }

    /// Document path this sink is subscribed to.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Maximum queued content messages.
    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Offer a full envelope; dropped if the queue is full.
    pub fn offer_content(&self, message: Message) -> Offer {
        let outcome = {
            let mut state = self.state.lock();
            if state.terminal {
                Offer::Closed
            } else if state.content.len() >= self.capacity {
                Offer::Dropped
            } else {
                state.content.push_back(message);
                Offer::Delivered
            }
        };
        self.wake_if(outcome);
        outcome
    }

    /// Offer a change signal; coalesced with a pending one.
    pub fn offer_signal(&self) -> Offer {
        let outcome = {
            let mut state = self.state.lock();
            if state.terminal {
                Offer::Closed
            } else if state.signal_pending {
                Offer::Coalesced
            } else {
                state.signal_pending = true;
                Offer::Delivered
            }
        };
        self.wake_if(outcome);
        outcome
    }

    /// Mark the sink terminal. Never blocked by a full queue.
    pub fn terminate(&self) -> Offer {
        let outcome = {
            let mut state = self.state.lock();
            if state.terminal {
                Offer::Closed
            } else {
                state.terminal = true;
                state.signal_pending = false;
                Offer::Delivered
            }
        };
        self.wake_if(outcome);
        outcome
    }

    /// Take everything pending: queued content in order, then a signal
    /// (unless terminal), then the terminal marker (once).
    pub fn drain(&self) -> Vec<Delivery> {
        let mut state = self.state.lock();
        let mut out: Vec<Delivery> = state.content.drain(..).map(Delivery::Content).collect();
        if std::mem::take(&mut state.signal_pending) {
            out.push(Delivery::Signal);
        }
        if state.terminal && !state.terminal_taken {
            state.terminal_taken = true;
            out.push(Delivery::Terminal);
        }
        out
    }

    /// Whether the sink has been terminated.
    pub fn is_terminal(&self) -> bool {
        self.state.lock().terminal
    }

    /// Whether a drain would return anything.
    pub fn has_pending(&self) -> bool {
        let state = self.state.lock();
        !state.content.is_empty()
            || state.signal_pending
            || (state.terminal && !state.terminal_taken)
    }

    fn wake_if(&self, outcome: Offer) {
        if outcome == Offer::Delivered {
            self.wake.notify_one();
        }
    }
}

impl std::fmt::Debug for SubscriberSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberSink")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
