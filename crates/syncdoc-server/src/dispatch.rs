//! Command dispatch.
//!
//! Shared by WebSocket sessions and REST calls. Each accepted envelope
//! becomes exactly one store or registry operation; rejected envelopes are
//! logged and dropped, never answered.

use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use syncdoc_core::{parse_patch, Command, Message, CLIENT_SOURCE, REQUEST_SOURCE};
use syncdoc_store::{DeliveryReport, DocumentStore, Notification, NotificationRouter, StoreError};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};

use crate::metrics::{
    COMMANDS_IGNORED_TOTAL, COMMANDS_TOTAL, COMMAND_ERRORS_TOTAL, DELIVERIES_DROPPED_TOTAL,
    NOTIFY_MISSES_TOTAL, SIGNALS_COALESCED_TOTAL,
};
use crate::registry::SessionRegistry;
use crate::session::SessionContext;

/// Where an envelope came from.
#[derive(Clone, Copy, Debug)]
pub enum Origin<'a> {
    /// A live session.
    Session(&'a SessionContext),
    /// A one-shot REST call.
    Request,
}

impl Origin<'_> {
    /// Name stamped into forwarded `notify` messages.
    pub fn sender(&self) -> &str {
        match self {
            Self::Session(context) => context.name().as_str(),
            Self::Request => REQUEST_SOURCE,
        }
    }
}

/// What happened to one envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The command ran.
    Applied(Command),
    /// The envelope was dropped before running anything.
    Ignored(&'static str),
    /// The command ran and failed; nothing changed.
    Failed {
        /// Command that failed.
        command: Command,
        /// Short error classification.
        error: &'static str,
    },
}

/// Routes envelopes to the store, the router, and the session registry.
#[derive(Clone, Debug)]
pub struct CommandDispatcher {
    store: Arc<DocumentStore>,
    router: NotificationRouter,
    registry: Arc<SessionRegistry>,
    require_client_source: bool,
}

impl CommandDispatcher {
    /// Dispatcher over shared state.
    pub fn new(
        store: Arc<DocumentStore>,
        router: NotificationRouter,
        registry: Arc<SessionRegistry>,
        require_client_source: bool,
    ) -> Self {
        Self {
            store,
            router,
            registry,
            require_client_source,
        }
    }

    /// Run one envelope and record the outcome.
    pub fn dispatch(&self, origin: Origin<'_>, message: Message) -> DispatchOutcome {
        let outcome = self.route(origin, message);
        match &outcome {
            DispatchOutcome::Applied(command) => {
                counter!(COMMANDS_TOTAL, "command" => command.as_str()).increment(1);
            }
            DispatchOutcome::Ignored(reason) => {
                counter!(COMMANDS_IGNORED_TOTAL, "reason" => *reason).increment(1);
            }
            DispatchOutcome::Failed { command, error } => {
                counter!(
                    COMMAND_ERRORS_TOTAL,
                    "command" => command.as_str(),
                    "error_type" => *error
                )
                .increment(1);
            }
        }
        outcome
    }

    fn route(&self, origin: Origin<'_>, message: Message) -> DispatchOutcome {
        if self.require_client_source && message.source != CLIENT_SOURCE {
            trace!(source = %message.source, "dropping envelope from non-client source");
            return DispatchOutcome::Ignored("source");
        }
        let Some(command) = message.command else {
            trace!(path = %message.path, "dropping envelope without a known command");
            return DispatchOutcome::Ignored("command");
        };
        if !message.has_path() {
            trace!(command = command.as_str(), "dropping envelope without a path");
            return DispatchOutcome::Ignored("path");
        }

        match command {
            Command::Subscribe => self.subscribe(origin, &message.path),
            Command::Publish => self.publish(message),
            Command::Notify => self.notify(origin, message),
            Command::Merge => self.merge(&message.path, &message.payload),
            Command::Patch => self.patch(&message.path, &message.payload),
            Command::Delete => self.delete(&message.path),
        }
    }

    fn subscribe(&self, origin: Origin<'_>, path: &str) -> DispatchOutcome {
        let Origin::Session(context) = origin else {
            debug!(path, "subscribe needs a session, ignoring");
            return DispatchOutcome::Ignored("no_session");
        };
        match context.subscribe(&self.router, path) {
            Ok(true) => DispatchOutcome::Applied(Command::Subscribe),
            Ok(false) => {
                trace!(session = %context.name(), path, "already subscribed");
                DispatchOutcome::Ignored("already_subscribed")
            }
            Err(error) => failed(Command::Subscribe, &error),
        }
    }

    fn publish(&self, message: Message) -> DispatchOutcome {
        let fanout = self.store.publish(&message.path, message.payload.clone());
        record(&self.router.notify(&fanout, &Notification::Content(message)));
        DispatchOutcome::Applied(Command::Publish)
    }

    fn notify(&self, origin: Origin<'_>, message: Message) -> DispatchOutcome {
        let target = message.path.clone();
        let message = message.with_source(origin.sender());

        let Some(queue) = self.registry.lookup(&target) else {
            return notify_miss(&target, "session_not_found");
        };
        match queue.try_send(message) {
            Ok(()) => DispatchOutcome::Applied(Command::Notify),
            Err(TrySendError::Full(_)) => notify_miss(&target, "queue_full"),
            Err(TrySendError::Closed(_)) => notify_miss(&target, "queue_closed"),
        }
    }

    fn merge(&self, path: &str, payload: &Value) -> DispatchOutcome {
        match self.store.merge(path, payload) {
            Ok(fanout) => {
                record(&self.router.notify(&fanout, &Notification::Signal));
                DispatchOutcome::Applied(Command::Merge)
            }
            Err(error) => failed(Command::Merge, &error),
        }
    }

    fn patch(&self, path: &str, payload: &Value) -> DispatchOutcome {
        let applied = parse_patch(payload)
            .map_err(|source| StoreError::Patch {
                path: path.to_owned(),
                source,
            })
            .and_then(|ops| self.store.patch(path, &ops));
        match applied {
            Ok(fanout) => {
                record(&self.router.notify(&fanout, &Notification::Signal));
                DispatchOutcome::Applied(Command::Patch)
            }
            Err(error) => failed(Command::Patch, &error),
        }
    }

    fn delete(&self, path: &str) -> DispatchOutcome {
        match self.store.delete(path) {
            Some(fanout) => {
                record(&self.router.notify(&fanout, &Notification::Terminal));
            }
            None => debug!(path, "delete of missing document"),
        }
        DispatchOutcome::Applied(Command::Delete)
    }
}

fn failed(command: Command, error: &StoreError) -> DispatchOutcome {
    let kind = match error {
        StoreError::Patch { source, .. } => source.error_kind(),
        other => other.error_kind(),
    };
    warn!(command = command.as_str(), error_type = kind, %error, "command failed");
    DispatchOutcome::Failed {
        command,
        error: kind,
    }
}

fn notify_miss(target: &str, reason: &'static str) -> DispatchOutcome {
    warn!(target, reason, "notify not delivered");
    counter!(NOTIFY_MISSES_TOTAL, "reason" => reason).increment(1);
    DispatchOutcome::Failed {
        command: Command::Notify,
        error: reason,
    }
}

fn record(report: &DeliveryReport) {
    if report.dropped > 0 {
        counter!(DELIVERIES_DROPPED_TOTAL).increment(report.dropped as u64);
    }
    if report.coalesced > 0 {
        counter!(SIGNALS_COALESCED_TOTAL).increment(report.coalesced as u64);
    }
}
