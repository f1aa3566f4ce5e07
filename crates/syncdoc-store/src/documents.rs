//! Path → document directory.
//!
//! The directory itself is a `DashMap`; each document carries its own mutex so
//! mutation is single-writer per path while unrelated paths proceed
//! independently. A shard guard is never held while a document lock is taken.
//! Every mutation snapshots the current subscribers into a [`Fanout`] and
//! releases the document lock before anything is delivered.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use syncdoc_core::{apply_patch, merge_patch, PatchOperation};
use tracing::debug;

use crate::error::StoreError;
use crate::sink::SubscriberSink;

struct DocumentState {
    value: Value,
    subscribers: HashMap<u64, Arc<SubscriberSink>>,
    removed: bool,
}

struct Document {
    state: Mutex<DocumentState>,
}

impl Document {
    fn new(value: Value) -> Self {
        Self {
            state: Mutex::new(DocumentState {
                value,
                subscribers: HashMap::new(),
                removed: false,
            }),
        }
    }
}

/// Subscribers captured at the moment a mutation committed.
#[derive(Debug, Default)]
pub struct Fanout {
    path: String,
    subscribers: Vec<Arc<SubscriberSink>>,
}

impl Fanout {
    fn new(path: &str, subscribers: Vec<Arc<SubscriberSink>>) -> Self {
        Self {
            path: path.to_owned(),
            subscribers,
        }
    }

    /// Document path the mutation applied to.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Sinks to notify.
    pub fn subscribers(&self) -> &[Arc<SubscriberSink>] {
        &self.subscribers
    }

    /// Number of sinks captured.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether nobody was subscribed.
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

/// All shared documents, keyed by path.
#[derive(Default)]
pub struct DocumentStore {
    documents: DashMap<String, Arc<Document>>,
    next_subscriber: AtomicU64,
}

impl DocumentStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value at `path`, if the document exists.
    pub fn get(&self, path: &str) -> Option<Value> {
        let doc = self.document(path)?;
        let state = doc.state.lock();
        (!state.removed).then(|| state.value.clone())
    }

    /// Whether a document exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.documents.contains_key(path)
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Paths of every live document, sorted.
    #[cfg(test)]
    pub(crate) fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.documents.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    /// Replace the document wholesale, creating it if absent.
    pub fn publish(&self, path: &str, value: Value) -> Fanout {
        match self.mutate::<_, Infallible>(path, |_| Ok(value.clone())) {
            Ok(fanout) => fanout,
            Err(never) => match never {},
        }
    }

    /// Apply a JSON Merge Patch; an absent document starts out as `{}`.
    pub fn merge(&self, path: &str, patch: &Value) -> Result<Fanout, StoreError> {
        self.mutate(path, |current| {
            let mut next = current.clone();
            merge_patch(&mut next, patch);
            Ok::<_, StoreError>(next)
        })
    }

    /// Apply a JSON Patch atomically; an absent document starts out as `{}`.
    /// On failure the committed value is untouched and no document is created.
    pub fn patch(&self, path: &str, ops: &[PatchOperation]) -> Result<Fanout, StoreError> {
        self.mutate(path, |current| {
            apply_patch(current, ops).map_err(|source| StoreError::Patch {
                path: path.to_owned(),
                source,
            })
        })
    }

    /// Remove the document. Returns its former subscribers, or `None` when
    /// nothing was stored at `path`.
    pub fn delete(&self, path: &str) -> Option<Fanout> {
        let (_, doc) = self.documents.remove(path)?;
        let mut state = doc.state.lock();
        state.removed = true;
        let subscribers = state.subscribers.drain().map(|(_, sink)| sink).collect();
        debug!(path, "document deleted");
        Some(Fanout::new(path, subscribers))
    }

    /// Create documents that do not exist yet; existing ones are kept.
    pub fn seed<I>(&self, documents: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (path, value) in documents {
            if let Entry::Vacant(slot) = self.documents.entry(path) {
                debug!(path = %slot.key(), "seeded document");
                let _ = slot.insert(Arc::new(Document::new(value)));
            }
        }
    }

    pub(crate) fn attach(&self, path: &str, sink: Arc<SubscriberSink>) -> Result<u64, StoreError> {
        let not_found = || StoreError::DocumentNotFound(path.to_owned());
        let doc = self.document(path).ok_or_else(not_found)?;
        let mut state = doc.state.lock();
        if state.removed {
            return Err(not_found());
        }
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let _ = state.subscribers.insert(id, sink);
        Ok(id)
    }

    pub(crate) fn detach(&self, path: &str, id: u64) -> bool {
        let Some(doc) = self.document(path) else {
            return false;
        };
        doc.state.lock().subscribers.remove(&id).is_some()
    }

    /// Number of subscribers currently attached to `path`.
    pub fn subscriber_count(&self, path: &str) -> usize {
        self.document(path)
            .map_or(0, |doc| doc.state.lock().subscribers.len())
    }

    fn document(&self, path: &str) -> Option<Arc<Document>> {
        self.documents.get(path).map(|entry| Arc::clone(entry.value()))
    }

    fn mutate<F, E>(&self, path: &str, mut update: F) -> Result<Fanout, E>
    where
        F: FnMut(&Value) -> Result<Value, E>,
    {
        loop {
            let doc = match self.documents.entry(path.to_owned()) {
                Entry::Vacant(slot) => {
                    let value = update(&Value::Object(Map::new()))?;
                    let _ = slot.insert(Arc::new(Document::new(value)));
                    debug!(path, "document created");
                    return Ok(Fanout::new(path, Vec::new()));
                }
                Entry::Occupied(slot) => Arc::clone(slot.get()),
            };
            let mut state = doc.state.lock();
            if state.removed {
                // Deleted between lookup and lock; retry against the directory.
                continue;
            }
            state.value = update(&state.value)?;
            let subscribers = state.subscribers.values().cloned().collect();
            return Ok(Fanout::new(path, subscribers));
        }
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("documents", &self.documents.len())
            .finish_non_exhaustive()
    }
}
