//! Registry of live connections of one role.
//!
//! The relay keeps two registries, one per endpoint.  Each hands out
//! identifiers that are unique among the *live* members of that registry
//! and remembers registration order, which the pairing lookup uses to make
//! duplicate identity keys resolve deterministically.
//!
//! # Identifier generation
//!
//! New identifiers come from a generator function (random v4 UUIDs in
//! production).  Allocation and insertion happen under a single lock, and a
//! candidate that collides with a live member is discarded and redrawn.
//! With 122 random bits the loop runs once in practice; the retry only
//! matters for injected generators in tests.  The loop has no upper bound,
//! so a generator that can only ever return live identifiers would spin.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;
use uuid::Uuid;

use crate::domain::connection::{Connection, ConnectionId};

type IdGenerator = Box<dyn Fn() -> ConnectionId + Send + Sync>;

struct Entry<C> {
    seq: u64,
    connection: Arc<C>,
}

struct Inner<C> {
    entries: HashMap<ConnectionId, Entry<C>>,
    next_seq: u64,
}

/// Concurrency-safe map from [`ConnectionId`] to live connections of type `C`.
pub struct ConnectionRegistry<C: Connection> {
    inner: Mutex<Inner<C>>,
    id_generator: IdGenerator,
}

impl<C: Connection> ConnectionRegistry<C> {
    /// Creates an empty registry that draws random v4 UUIDs.
    pub fn new() -> Self {
        Self::with_id_generator(Uuid::new_v4)
    }

    /// Creates an empty registry with a custom identifier source.
    pub fn with_id_generator<F>(generator: F) -> Self
    where
        F: Fn() -> ConnectionId + Send + Sync + 'static,
    {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
            id_generator: Box::new(generator),
        }
    }

    /// Allocates a fresh identifier, builds the connection with `factory`,
    /// and registers it.
    ///
    /// The identifier is guaranteed not to belong to any connection that is
    /// live in this registry at the moment of insertion.
    pub fn create<F>(&self, factory: F) -> Arc<C>
    where
        F: FnOnce(ConnectionId) -> C,
    {
        let mut inner = self.lock();

        let id = loop {
            let candidate = (self.id_generator)();
            if !inner.entries.contains_key(&candidate) {
                break candidate;
            }
            trace!(role = C::ROLE.as_str(), id = %candidate, "identifier collision, redrawing");
        };

        let connection = Arc::new(factory(id));
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            id,
            Entry {
                seq,
                connection: Arc::clone(&connection),
            },
        );
        connection
    }

    /// Removes the connection with `id`.
    ///
    /// Returns `true` if it was present.  Removing an absent identifier is a
    /// no-op, so cleanup paths may call this more than once.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.lock().entries.remove(&id).is_some()
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<C>> {
        self.lock()
            .entries
            .get(&id)
            .map(|entry| Arc::clone(&entry.connection))
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().entries.contains_key(&id)
    }

    /// A point-in-time copy of all live connections, oldest first.
    pub fn snapshot(&self) -> Vec<Arc<C>> {
        let inner = self.lock();
        let mut entries: Vec<&Entry<C>> = inner.entries.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
            .into_iter()
            .map(|entry| Arc::clone(&entry.connection))
            .collect()
    }

    /// The oldest live connection satisfying `predicate`.
    ///
    /// The predicate runs on a snapshot, outside the registry lock, so it may
    /// take other locks without risk of deadlock.
    pub fn find<P>(&self, predicate: P) -> Option<Arc<C>>
    where
        P: Fn(&C) -> bool,
    {
        self.snapshot().into_iter().find(|c| predicate(&**c))
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Connection> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connection> std::fmt::Debug for ConnectionRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("role", &C::ROLE)
            .field("len", &self.len())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
