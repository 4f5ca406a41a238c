//! Live connection registry.
//!
//! Every accepted transport session gets an entry holding its learned
//! location, its role, and the sending half of its outbound queue. The
//! socket writer owns the receiving half; dropping the entry closes it.

use signage_core::LocationId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// A serialized outbound frame, shared by every target of a broadcast.
pub type Frame = Arc<str>;

/// Opaque handle for a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Receives content broadcasts only. Every connection starts here.
    Display,
    /// Has sent a selection message; also receives peer selection echoes.
    Controller,
}

/// Result of [`ConnectionRegistry::set_location`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationAssignment {
    Assigned,
    /// The connection already had this location.
    Unchanged,
    /// The connection is pinned to a different location, which was kept.
    Kept(LocationId),
    UnknownConnection,
}

/// A connection selected for delivery.
#[derive(Clone)]
pub struct Target {
    pub id: ConnectionId,
    pub(crate) tx: mpsc::Sender<Frame>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub total: usize,
    pub displays: usize,
    pub controllers: usize,
    pub unassigned: usize,
}

struct Entry {
    location: Option<LocationId>,
    role: Role,
    tx: mpsc::Sender<Frame>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: Mutex<HashMap<ConnectionId, Entry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection, optionally with a connect-time location.
    pub fn register(&self, tx: mpsc::Sender<Frame>, location: Option<LocationId>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.lock().insert(
            id,
            Entry {
                location,
                role: Role::Display,
                tx,
            },
        );
        tracing::debug!(conn = %id, location = ?location, "Connection registered");
        id
    }

    /// Forget a connection. Returns false if it was already gone.
    pub fn deregister(&self, id: ConnectionId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(conn = %id, "Connection deregistered");
        }
        removed
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn location(&self, id: ConnectionId) -> Option<LocationId> {
        self.lock().get(&id).and_then(|e| e.location)
    }

    pub fn role(&self, id: ConnectionId) -> Option<Role> {
        self.lock().get(&id).map(|e| e.role)
    }

    /// First write wins: once a connection has a location it keeps it.
    pub fn set_location(&self, id: ConnectionId, location: LocationId) -> LocationAssignment {
        let mut connections = self.lock();
        let Some(entry) = connections.get_mut(&id) else {
            return LocationAssignment::UnknownConnection;
        };
        match entry.location {
            None => {
                entry.location = Some(location);
                tracing::info!(conn = %id, %location, "Connection location learned");
                LocationAssignment::Assigned
            }
            Some(existing) if existing == location => LocationAssignment::Unchanged,
            Some(existing) => {
                tracing::debug!(
                    conn = %id,
                    %existing,
                    requested = %location,
                    "Connection keeps its location"
                );
                LocationAssignment::Kept(existing)
            }
        }
    }

    /// Mark a connection as a controller.
    ///
    /// Returns whether it already was one. Unknown connections report `true`
    /// so callers never replay state into a closed session.
    pub fn promote_to_controller(&self, id: ConnectionId) -> bool {
        let mut connections = self.lock();
        match connections.get_mut(&id) {
            Some(entry) if entry.role == Role::Controller => true,
            Some(entry) => {
                entry.role = Role::Controller;
                tracing::info!(
                    conn = %id,
                    location = ?entry.location,
                    "Connection promoted to controller"
                );
                false
            }
            None => true,
        }
    }

    /// Connections at a location, optionally restricted to one role.
    pub fn connections_at(&self, location: LocationId, role: Option<Role>) -> Vec<Target> {
        self.lock()
            .iter()
            .filter(|(_, e)| e.location == Some(location))
            .filter(|(_, e)| role.is_none_or(|r| e.role == r))
            .map(|(id, e)| Target {
                id: *id,
                tx: e.tx.clone(),
            })
            .collect()
    }

    pub fn target(&self, id: ConnectionId) -> Option<Target> {
        self.lock().get(&id).map(|e| Target {
            id,
            tx: e.tx.clone(),
        })
    }

    pub fn stats(&self) -> RegistryStats {
        self.lock()
            .values()
            .fold(RegistryStats::default(), |mut stats, e| {
                stats.total += 1;
                match e.role {
                    Role::Display => stats.displays += 1,
                    Role::Controller => stats.controllers += 1,
                }
                if e.location.is_none() {
                    stats.unassigned += 1;
                }
                stats
            })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Entry>> {
        self.connections.lock().unwrap_or_else(|e| e.into_inner())
    }
}
