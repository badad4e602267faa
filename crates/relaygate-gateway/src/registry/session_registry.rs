use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Per-connection identifier, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Live connection handle: the sender side of its outbound frame queue.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnId,
    pub tx: mpsc::Sender<Bytes>,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    conn: Connection,
    user: Option<String>,
}

/// Session registry:
/// - `conn_id -> Connection (+ bound user)`
/// - `user_id -> conn_id` (latest ONLINE wins)
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<ConnId, SessionEntry>,
    user_index: DashMap<String, ConnId>,
    seq: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            user_index: DashMap::new(),
            seq: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh connection id.
    pub fn next_id(&self) -> ConnId {
        ConnId(self.seq.fetch_add(1, Ordering::Relaxed))
    }

    /// Register an accepted, not yet identified connection.
    pub fn insert(&self, conn: Connection) {
        self.sessions.insert(conn.id, SessionEntry { conn, user: None });
    }

    /// Bind `user` to a registered connection. Returns false if the connection
    /// is gone.
    pub fn bind_user(&self, id: ConnId, user: &str) -> bool {
        let previous = {
            let Some(mut entry) = self.sessions.get_mut(&id) else { return false; };
            entry.user.replace(user.to_string())
        };

        if let Some(prev) = previous.filter(|p| p != user) {
            self.user_index.remove_if(&prev, |_, bound| *bound == id);
        }
        self.user_index.insert(user.to_string(), id);
        true
    }

    pub fn remove(&self, id: ConnId) -> Option<Connection> {
        let (_, entry) = self.sessions.remove(&id)?;
        if let Some(user) = &entry.user {
            // only unmap if a newer connection has not taken over the user
            self.user_index.remove_if(user, |_, bound| *bound == id);
        }
        Some(entry.conn)
    }

    pub fn get(&self, id: ConnId) -> Option<Connection> {
        self.sessions.get(&id).map(|e| e.value().conn.clone())
    }

    /// Live connection currently bound to `user`.
    pub fn user_connection(&self, user: &str) -> Option<Connection> {
        let id = *self.user_index.get(user)?;
        self.get(id)
    }

    pub fn user_of(&self, id: ConnId) -> Option<String> {
        self.sessions.get(&id).and_then(|e| e.value().user.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn online_users(&self) -> usize {
        self.user_index.len()
    }
}
