//! Name → session directory.
//!
//! Each live session registers its name together with the sending half of its
//! outbound queue, so `notify` can reach it directly.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use syncdoc_core::{Message, SessionName};
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::SessionError;

/// Registry of live session names.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, mpsc::Sender<Message>>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name`. Fails without touching the existing holder.
    pub fn register(
        &self,
        name: &SessionName,
        outbound: mpsc::Sender<Message>,
    ) -> Result<(), SessionError> {
        match self.sessions.entry(name.as_str().to_owned()) {
            Entry::Occupied(_) => Err(SessionError::NameInUse(name.to_string())),
            Entry::Vacant(slot) => {
                let _ = slot.insert(outbound);
                debug!(session = %name, "name registered");
                Ok(())
            }
        }
    }

    /// Release `name`. Returns whether it was registered.
    pub fn deregister(&self, name: &str) -> bool {
        let removed = self.sessions.remove(name).is_some();
        if removed {
            debug!(session = name, "name released");
        }
        removed
    }

    /// Outbound queue of the session called `name`.
    pub fn lookup(&self, name: &str) -> Option<mpsc::Sender<Message>> {
        self.sessions.get(name).map(|entry| entry.value().clone())
    }

    /// Whether `name` is currently held.
    pub fn contains(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
