//! Subscription management and non-blocking fan-out.

use std::sync::Arc;

use syncdoc_core::Message;
use tracing::{debug, trace};

use crate::documents::{DocumentStore, Fanout};
use crate::error::StoreError;
use crate::sink::{Offer, SubscriberSink};

/// Kind of change being announced to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// Full envelope, best-effort.
    Content(Message),
    /// Payload-free "re-read current state", coalesced.
    Signal,
    /// Document deleted.
    Terminal,
}

impl Notification {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Content(_) => "content",
            Self::Signal => "signal",
            Self::Terminal => "terminal",
        }
    }
}

/// Opaque token binding a path to one subscriber sink.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberHandle {
    path: String,
    id: u64,
}

impl SubscriberHandle {
    /// Path the handle is bound to.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Per-call delivery tally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Offers accepted.
    pub delivered: usize,
    /// Content discarded because a sink was full.
    pub dropped: usize,
    /// Signals merged into an already pending one.
    pub coalesced: usize,
    /// Sinks that were already terminal.
    pub closed: usize,
}

impl DeliveryReport {
    fn record(&mut self, offer: Offer) {
        match offer {
            Offer::Delivered => self.delivered += 1,
            Offer::Dropped => self.dropped += 1,
            Offer::Coalesced => self.coalesced += 1,
            Offer::Closed => self.closed += 1,
        }
    }
}

/// Routes document changes to subscriber sinks.
#[derive(Clone, Debug)]
pub struct NotificationRouter {
    store: Arc<DocumentStore>,
}

impl NotificationRouter {
    /// Router over `store`.
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Attach `sink` to the document at `path`. Never creates the document.
    pub fn subscribe(
        &self,
        path: &str,
        sink: Arc<SubscriberSink>,
    ) -> Result<SubscriberHandle, StoreError> {
        let id = self.store.attach(path, sink)?;
        debug!(path, id, "subscribed");
        Ok(SubscriberHandle {
            path: path.to_owned(),
            id,
        })
    }

    /// Detach a handle. Safe to repeat and safe after the document is gone.
    pub fn unsubscribe(&self, handle: &SubscriberHandle) {
        if self.store.detach(&handle.path, handle.id) {
            debug!(path = %handle.path, id = handle.id, "unsubscribed");
        }
    }

    /// Offer `notification` to every sink in `fanout`, one independent
    /// non-blocking attempt per sink.
    pub fn notify(&self, fanout: &Fanout, notification: &Notification) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for sink in fanout.subscribers() {
            let offer = match notification {
                Notification::Content(message) => sink.offer_content(message.clone()),
                Notification::Signal => sink.offer_signal(),
                Notification::Terminal => sink.terminate(),
            };
            report.record(offer);
        }
        trace!(
            path = fanout.path(),
            kind = notification.kind(),
            delivered = report.delivered,
            dropped = report.dropped,
            coalesced = report.coalesced,
            "fan-out complete"
        );
        report
    }
}
