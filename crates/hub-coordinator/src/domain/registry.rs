//! # Validator Registry
//!
//! In-memory set of admitted validator connections.
//!
//! ## Policy: Replace-on-Reconnect
//!
//! At most one connection is admitted per public key. Admitting a new
//! connection for a key that is already present displaces the older entry,
//! which is returned to the caller so it can notify the old socket and sweep
//! its callbacks.
//!
//! ## Concurrency
//!
//! Both indexes live behind one `parking_lot::RwLock`, so they never
//! disagree. `snapshot()` copies the entries out; callers iterate without
//! holding the lock.

use crate::domain::ConnectionId;
use crate::ports::PeerSender;
use parking_lot::RwLock;
use shared_types::ValidatorId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// An admitted validator connection.
#[derive(Clone)]
pub struct ConnectionEntry {
    pub connection_id: ConnectionId,
    pub validator_id: ValidatorId,
    /// Base58 public key proven at signup.
    pub public_key: String,
    pub sender: Arc<dyn PeerSender>,
}

impl fmt::Debug for ConnectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEntry")
            .field("connection_id", &self.connection_id)
            .field("validator_id", &self.validator_id)
            .field("public_key", &self.public_key)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

#[derive(Default)]
struct RegistryInner {
    by_connection: HashMap<ConnectionId, ConnectionEntry>,
    by_public_key: HashMap<String, ConnectionId>,
}

/// Thread-safe registry of admitted connections.
#[derive(Default)]
pub struct ValidatorRegistry {
    inner: RwLock<RegistryInner>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a connection.
    ///
    /// Returns the entry displaced by this admission: another connection
    /// holding the same public key. Re-admitting the same connection replaces
    /// its own entry and returns `None`.
    pub fn admit(&self, entry: ConnectionEntry) -> Option<ConnectionEntry> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        // Same socket signing up again, possibly under another key
        if let Some(previous) = inner.by_connection.remove(&entry.connection_id) {
            if inner.by_public_key.get(&previous.public_key) == Some(&entry.connection_id) {
                inner.by_public_key.remove(&previous.public_key);
            }
        }

        let displaced = inner
            .by_public_key
            .insert(entry.public_key.clone(), entry.connection_id)
            .filter(|old| *old != entry.connection_id)
            .and_then(|old| inner.by_connection.remove(&old));

        if let Some(old) = &displaced {
            debug!(
                old_connection = %old.connection_id,
                new_connection = %entry.connection_id,
                validator_id = %entry.validator_id,
                "Replacing registry entry for reconnecting validator"
            );
        }

        inner.by_connection.insert(entry.connection_id, entry);
        displaced
    }

    /// Remove a connection. Idempotent.
    pub fn remove(&self, connection_id: &ConnectionId) -> Option<ConnectionEntry> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let entry = inner.by_connection.remove(connection_id)?;

        if inner.by_public_key.get(&entry.public_key) == Some(connection_id) {
            inner.by_public_key.remove(&entry.public_key);
        }

        Some(entry)
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<ConnectionEntry> {
        self.inner.read().by_connection.get(connection_id).cloned()
    }

    /// Connection currently admitted for a public key.
    pub fn connection_for_key(&self, public_key: &str) -> Option<ConnectionId> {
        self.inner.read().by_public_key.get(public_key).copied()
    }

    /// Owned copy of every admitted entry.
    pub fn snapshot(&self) -> Vec<ConnectionEntry> {
        self.inner.read().by_connection.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_connection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingSender;

    fn entry(connection_id: ConnectionId, key: &str) -> ConnectionEntry {
        ConnectionEntry {
            connection_id,
            validator_id: ValidatorId::new(),
            public_key: key.to_string(),
            sender: Arc::new(RecordingSender::new()),
        }
    }

    #[test]
    fn test_admit_and_remove() {
        let registry = ValidatorRegistry::new();
        let conn = ConnectionId::new();

        assert!(registry.admit(entry(conn, "key-a")).is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.connection_for_key("key-a"), Some(conn));

        assert!(registry.remove(&conn).is_some());
        assert!(registry.is_empty());
        assert_eq!(registry.connection_for_key("key-a"), None);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ValidatorRegistry::new();
        let conn = ConnectionId::new();
        registry.admit(entry(conn, "key-a"));

        assert!(registry.remove(&conn).is_some());
        assert!(registry.remove(&conn).is_none());
        assert!(registry.remove(&ConnectionId::new()).is_none());
    }

    #[test]
    fn test_same_key_displaces_older_connection() {
        let registry = ValidatorRegistry::new();
        let old = ConnectionId::new();
        let new = ConnectionId::new();

        registry.admit(entry(old, "key-a"));
        let displaced = registry.admit(entry(new, "key-a")).unwrap();

        assert_eq!(displaced.connection_id, old);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.connection_for_key("key-a"), Some(new));
        assert!(registry.get(&old).is_none());
    }

    #[test]
    fn test_removing_displaced_connection_keeps_new_mapping() {
        let registry = ValidatorRegistry::new();
        let old = ConnectionId::new();
        let new = ConnectionId::new();

        registry.admit(entry(old, "key-a"));
        registry.admit(entry(new, "key-a"));

        // Old socket closes after being displaced
        assert!(registry.remove(&old).is_none());
        assert_eq!(registry.connection_for_key("key-a"), Some(new));
    }

    #[test]
    fn test_readmit_same_connection_under_new_key() {
        let registry = ValidatorRegistry::new();
        let conn = ConnectionId::new();

        registry.admit(entry(conn, "key-a"));
        assert!(registry.admit(entry(conn, "key-b")).is_none());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.connection_for_key("key-a"), None);
        assert_eq!(registry.connection_for_key("key-b"), Some(conn));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = ValidatorRegistry::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        registry.admit(entry(a, "key-a"));
        registry.admit(entry(b, "key-b"));

        let snapshot = registry.snapshot();
        registry.remove(&a);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_admit_remove() {
        let registry = Arc::new(ValidatorRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for j in 0..200 {
                        let conn = ConnectionId::new();
                        registry.admit(entry(conn, &format!("key-{}-{}", i, j % 10)));
                        let _ = registry.snapshot();
                        if j % 2 == 0 {
                            registry.remove(&conn);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // One live entry per distinct key at most
        let snapshot = registry.snapshot();
        let mut keys: Vec<_> = snapshot.iter().map(|e| e.public_key.clone()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), snapshot.len());
    }
}
