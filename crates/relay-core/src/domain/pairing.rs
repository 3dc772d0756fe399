//! Per-source set of paired controllers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::connection::{Connection, ConnectionId, ControllerConnection};

/// The controllers currently subscribed to one telemetry source.
///
/// Many sessions touch the same directory at once: the source iterates it
/// on every broadcast while controllers pair in and disconnect.  Iteration
/// always works on a [`snapshot`](Self::snapshot) taken under the lock, so
/// sends happen without holding it and concurrent inserts or removals never
/// invalidate an in-flight broadcast.
#[derive(Default)]
pub struct PairingDirectory {
    members: Mutex<HashMap<ConnectionId, Arc<ControllerConnection>>>,
}

impl PairingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `controller`.  Returns `false` if it was already a member.
    pub fn insert(&self, controller: Arc<ControllerConnection>) -> bool {
        self.lock()
            .insert(controller.id(), controller)
            .is_none()
    }

    /// Removes the controller with `id`.  Returns `false` if it was absent,
    /// so calling this twice for the same controller is harmless.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// A point-in-time copy of the members, in no particular order.
    pub fn snapshot(&self) -> Vec<Arc<ControllerConnection>> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Arc<ControllerConnection>>> {
        // A panic while holding this lock leaves the map itself consistent
        // (every mutation is a single HashMap call), so poisoning is ignored.
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PairingDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingDirectory")
            .field("len", &self.len())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
