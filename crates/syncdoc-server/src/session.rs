//! Connection sessions: open, run, close.
//!
//! A session moves `Opening → Active → Closing → Closed`. While active it runs
//! two units side by side: receive (read, dispatch, repeat) and send (drain the
//! outbound queue and every subscription sink, stamp sequence numbers, write).
//! Whichever unit stops first cancels the other, then the session releases its
//! subscriptions, gives up its name, and closes its queue.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use syncdoc_core::{Message, SessionName};
use syncdoc_store::{
    Delivery, DocumentStore, NotificationRouter, StoreError, SubscriberHandle, SubscriberSink,
};
use tokio::sync::{mpsc, Notify};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;
use crate::dispatch::{CommandDispatcher, Origin};
use crate::errors::{SessionError, TransportError};
use crate::metrics::{
    MESSAGES_SENT_TOTAL, SESSIONS_ACTIVE, SESSIONS_CLOSED_TOTAL, SESSIONS_OPENED_TOTAL,
    SESSIONS_REJECTED_TOTAL, SESSION_DURATION_SECONDS,
};
use crate::registry::SessionRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::transport::{TransportReader, TransportWriter};

/// Lifecycle position of a session. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Name registered, initial subscriptions being set up.
    Opening,
    /// Receiving and sending.
    Active,
    /// Tearing down.
    Closing,
    /// Fully released.
    Closed,
}

impl SessionState {
    /// Lowercase label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Subscription {
    handle: SubscriberHandle,
    sink: Arc<SubscriberSink>,
}

/// Shared per-session state, visible to the dispatcher.
pub struct SessionContext {
    name: SessionName,
    state: Mutex<SessionState>,
    subscriptions: Mutex<HashMap<String, Subscription>>,
    retired: Mutex<Vec<Arc<SubscriberSink>>>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    sink_capacity: usize,
}

impl SessionContext {
    fn new(name: SessionName, sink_capacity: usize, cancel: CancellationToken) -> Self {
        Self {
            name,
            state: Mutex::new(SessionState::Opening),
            subscriptions: Mutex::new(HashMap::new()),
            retired: Mutex::new(Vec::new()),
            wake: Arc::new(Notify::new()),
            cancel,
            sink_capacity,
        }
    }

    /// Registered name.
    pub fn name(&self) -> &SessionName {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Paths this session is subscribed to, sorted.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.subscriptions.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Whether the session holds a live subscription to `path`.
    pub fn is_subscribed(&self, path: &str) -> bool {
        self.subscriptions.lock().contains_key(path)
    }

    /// Subscribe to `path`. Returns `Ok(false)` when already subscribed.
    ///
    /// A terminated subscription being replaced keeps its undelivered
    /// notices; they are sent ahead of anything from the new one.
    pub fn subscribe(&self, router: &NotificationRouter, path: &str) -> Result<bool, StoreError> {
        let mut subscriptions = self.subscriptions.lock();
        if subscriptions
            .get(path)
            .is_some_and(|existing| !existing.sink.is_terminal())
        {
            return Ok(false);
        }
        let sink = Arc::new(SubscriberSink::new(
            path,
            self.sink_capacity,
            Arc::clone(&self.wake),
        ));
        let handle = router.subscribe(path, Arc::clone(&sink))?;
        let replaced = subscriptions.insert(path.to_owned(), Subscription { handle, sink });
        if let Some(replaced) = replaced.filter(|old| old.sink.has_pending()) {
            self.retired.lock().push(replaced.sink);
        }
        Ok(true)
    }

    /// Move to `next` if it is later than the current state.
    fn advance(&self, next: SessionState) -> bool {
        let mut state = self.state.lock();
        let previous = *state;
        if next <= previous {
            return false;
        }
        *state = next;
        debug!(session = %self.name, from = %previous, to = %next, "session state");
        true
    }

    /// Everything pending on every sink.
    fn take_deliveries(&self) -> Vec<(Arc<SubscriberSink>, Delivery)> {
        let mut sinks = std::mem::take(&mut *self.retired.lock());
        sinks.extend(
            self.subscriptions
                .lock()
                .values()
                .map(|sub| Arc::clone(&sub.sink)),
        );
        sinks
            .into_iter()
            .flat_map(|sink| {
                let drained = sink.drain();
                drained
                    .into_iter()
                    .map(move |delivery| (Arc::clone(&sink), delivery))
            })
            .collect()
    }

    /// Drop the subscription backed by `sink`, if it is still the current one.
    fn forget(&self, sink: &Arc<SubscriberSink>) -> Option<SubscriberHandle> {
        let mut subscriptions = self.subscriptions.lock();
        let current = subscriptions.get(sink.path())?;
        if !Arc::ptr_eq(&current.sink, sink) {
            return None;
        }
        subscriptions.remove(sink.path()).map(|sub| sub.handle)
    }

    fn release_all(&self, router: &NotificationRouter) -> usize {
        let released = std::mem::take(&mut *self.subscriptions.lock());
        self.retired.lock().clear();
        let count = released.len();
        for subscription in released.into_values() {
            router.unsubscribe(&subscription.handle);
        }
        count
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("subscriptions", &self.subscriptions())
            .finish_non_exhaustive()
    }
}

/// An opened session, ready to be run over a transport.
#[derive(Debug)]
pub struct Session {
    context: Arc<SessionContext>,
    outbound: mpsc::Receiver<Message>,
}

impl Session {
    /// Shared context.
    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    /// Registered name.
    pub fn name(&self) -> &SessionName {
        self.context.name()
    }

    #[cfg(test)]
    pub(crate) fn outbound_mut(&mut self) -> &mut mpsc::Receiver<Message> {
        &mut self.outbound
    }
}

/// Owns the stores and runs every session against them.
pub struct SyncHub {
    store: Arc<DocumentStore>,
    router: NotificationRouter,
    registry: Arc<SessionRegistry>,
    dispatcher: CommandDispatcher,
    config: SessionConfig,
    shutdown: Arc<ShutdownCoordinator>,
}

impl SyncHub {
    /// Hub over `store`; sessions are cancelled when `shutdown` fires.
    pub fn new(
        store: Arc<DocumentStore>,
        config: SessionConfig,
        shutdown: Arc<ShutdownCoordinator>,
    ) -> Self {
        let router = NotificationRouter::new(Arc::clone(&store));
        let registry = Arc::new(SessionRegistry::new());
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&store),
            router.clone(),
            Arc::clone(&registry),
            config.require_client_source,
        );
        Self {
            store,
            router,
            registry,
            dispatcher,
            config,
            shutdown,
        }
    }

    /// Document store.
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Session name registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Command dispatcher shared by sessions and REST calls.
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Session settings.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Claim a name (or generate one) and set the session up.
    pub fn open_session(&self, requested: Option<&str>) -> Result<Session, SessionError> {
        let name = SessionName::requested_or_generated(requested);
        let (tx, rx) = mpsc::channel(self.config.outbound_capacity.max(1));
        if let Err(err) = self.registry.register(&name, tx) {
            counter!(SESSIONS_REJECTED_TOTAL).increment(1);
            warn!(session = %name, "session name already in use");
            return Err(err);
        }

        let context = Arc::new(SessionContext::new(
            name,
            self.config.sink_capacity,
            self.shutdown.child_token(),
        ));

        let system_path = self.config.system_path.as_str();
        if !system_path.is_empty() {
            match context.subscribe(&self.router, system_path) {
                Ok(_) => {
                    debug!(session = %context.name(), path = system_path, "system subscribed");
                }
                Err(StoreError::DocumentNotFound(_)) => {
                    debug!(session = %context.name(), path = system_path, "no system document");
                }
                Err(error) => {
                    warn!(session = %context.name(), %error, "system subscription failed");
                }
            }
        }

        let _ = context.advance(SessionState::Active);
        counter!(SESSIONS_OPENED_TOTAL).increment(1);
        gauge!(SESSIONS_ACTIVE).increment(1.0);
        info!(session = %context.name(), "session opened");

        Ok(Session {
            context,
            outbound: rx,
        })
    }

    /// Release everything the session holds. Safe to call more than once.
    pub fn close_session(&self, context: &SessionContext) {
        if !context.advance(SessionState::Closing) {
            return;
        }
        context.cancel.cancel();
        let released = context.release_all(&self.router);
        let _ = self.registry.deregister(context.name().as_str());
        let _ = context.advance(SessionState::Closed);

        counter!(SESSIONS_CLOSED_TOTAL).increment(1);
        gauge!(SESSIONS_ACTIVE).decrement(1.0);
        info!(session = %context.name(), released, "session closed");
    }

    /// Drive `session` over a transport until either side stops, then close it.
    #[instrument(skip_all, fields(session = %session.name()))]
    pub async fn run_session<R, W>(&self, session: Session, mut reader: R, mut writer: W)
    where
        R: TransportReader,
        W: TransportWriter,
    {
        let Session {
            context,
            mut outbound,
        } = session;
        let started = Instant::now();
        let cancel = context.cancel.clone();

        let receive = async {
            let result = self.receive_loop(&context, &mut reader).await;
            cancel.cancel();
            result
        };
        let send = async {
            let result = self.send_loop(&context, &mut outbound, &mut writer).await;
            cancel.cancel();
            result
        };
        let (received, sent) = tokio::join!(receive, send);

        for (unit, result) in [("receive", received), ("send", sent)] {
            if let Err(error) = result {
                debug!(unit, kind = error.error_kind(), %error, "session transport ended");
            }
        }

        self.close_session(&context);
        outbound.close();
        writer.close().await;
        histogram!(SESSION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    }

    async fn receive_loop<R>(
        &self,
        context: &SessionContext,
        reader: &mut R,
    ) -> Result<(), TransportError>
    where
        R: TransportReader,
    {
        loop {
            tokio::select! {
                () = context.cancel.cancelled() => return Ok(()),
                frame = reader.receive() => match frame? {
                    Some(message) => {
                        let _ = self.dispatcher.dispatch(Origin::Session(context), message);
                    }
                    None => {
                        debug!("peer closed");
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn send_loop<W>(
        &self,
        context: &SessionContext,
        outbound: &mut mpsc::Receiver<Message>,
        writer: &mut W,
    ) -> Result<(), TransportError>
    where
        W: TransportWriter,
    {
        let mut sequence: u64 = 0;
        let mut ping = tokio::time::interval(self.config.ping_interval());
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let _ = ping.tick().await;

        loop {
            for (sink, delivery) in context.take_deliveries() {
                if let Some(message) = self.translate(context, &sink, delivery) {
                    write_sequenced(writer, message, &mut sequence).await?;
                }
            }

            tokio::select! {
                () = context.cancel.cancelled() => return Ok(()),
                next = outbound.recv() => match next {
                    Some(message) => write_sequenced(writer, message, &mut sequence).await?,
                    None => return Ok(()),
                },
                () = context.wake.notified() => {}
                _ = ping.tick() => writer.keepalive().await?,
            }
        }
    }

    /// Turn a sink delivery into the envelope the client sees.
    fn translate(
        &self,
        context: &SessionContext,
        sink: &Arc<SubscriberSink>,
        delivery: Delivery,
    ) -> Option<Message> {
        let path = sink.path();
        match delivery {
            Delivery::Content(message) => Some(message),
            Delivery::Signal => {
                let value = self.store.get(path);
                if value.is_none() {
                    debug!(path, "signalled document is gone, skipping");
                }
                value.map(|value| Message::document_state(path, value))
            }
            Delivery::Terminal => {
                if let Some(handle) = context.forget(sink) {
                    self.router.unsubscribe(&handle);
                }
                Some(Message::document_deleted(path))
            }
        }
    }
}

impl fmt::Debug for SyncHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHub")
            .field("sessions", &self.registry.len())
            .field("documents", &self.store.len())
            .finish_non_exhaustive()
    }
}

async fn write_sequenced<W>(
    writer: &mut W,
    mut message: Message,
    sequence: &mut u64,
) -> Result<(), TransportError>
where
    W: TransportWriter,
{
    message.sequence = *sequence;
    writer.send(&message).await?;
    *sequence += 1;
    counter!(MESSAGES_SENT_TOTAL).increment(1);
    Ok(())
}
