//! Peer registry: the directory's in-memory name → endpoint map.
//!
//! A narrow, total, thread-safe interface (spec.md §4.1): `save`, `delete`,
//! `lookup`, `enumerate`. The default implementation is a `RwLock`-guarded
//! `HashMap` — writers serialized, readers concurrent with each other.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{CoreError, CoreResult};

/// Four-operation contract for the directory's backing store. Implementers
/// must be thread-safe and must never panic or block indefinitely; a narrow
/// surface so an alternative (e.g. a persistent) store can be dropped in
/// without touching the dispatcher.
pub trait PeerRegistry: Send + Sync {
    /// Insert `name -> endpoint` if absent. If already present, succeeds
    /// idempotently only when `endpoint` is byte-identical to the stored
    /// value; otherwise fails with `AlreadyRegistered`. The presence check
    /// and the insert/idempotence decision happen under one critical
    /// section so two concurrent re-registrations from the same endpoint
    /// cannot race into a spurious conflict.
    fn save(&self, name: &str, endpoint: &str) -> CoreResult<()>;

    fn delete(&self, name: &str) -> CoreResult<()>;

    fn lookup(&self, name: &str) -> CoreResult<String>;

    /// A point-in-time snapshot; order is unspecified.
    fn enumerate(&self) -> Vec<(String, String)>;
}

/// Default in-memory registry. Lost on restart — spec.md specifies no
/// persisted state.
#[derive(Default)]
pub struct InMemoryRegistry {
    peers: RwLock<HashMap<String, String>>,
}

impl InMemoryRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl PeerRegistry for InMemoryRegistry {
    fn save(&self, name: &str, endpoint: &str) -> CoreResult<()> {
        let mut writer = self.peers.write();
        match writer.get(name) {
            Some(existing) if existing == endpoint => Ok(()),
            Some(_) => Err(CoreError::AlreadyRegistered(name.to_string())),
            None => {
                writer.insert(name.to_string(), endpoint.to_string());
                Ok(())
            }
        }
    }

    fn delete(&self, name: &str) -> CoreResult<()> {
        let mut writer = self.peers.write();
        if writer.remove(name).is_some() {
            Ok(())
        } else {
            Err(CoreError::NotFound(name.to_string()))
        }
    }

    fn lookup(&self, name: &str) -> CoreResult<String> {
        let reader = self.peers.read();
        reader
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(name.to_string()))
    }

    fn enumerate(&self) -> Vec<(String, String)> {
        let reader = self.peers.read();
        reader.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_lookup_round_trips() {
        let reg = InMemoryRegistry::new();
        reg.save("alice", "127.0.0.1:1").unwrap();
        assert_eq!(reg.lookup("alice").unwrap(), "127.0.0.1:1");
    }

    #[test]
    fn save_same_endpoint_twice_is_idempotent() {
        let reg = InMemoryRegistry::new();
        reg.save("alice", "127.0.0.1:1").unwrap();
        reg.save("alice", "127.0.0.1:1").unwrap();
        assert_eq!(reg.lookup("alice").unwrap(), "127.0.0.1:1");
    }

    #[test]
    fn save_conflicting_endpoint_fails_and_leaves_original() {
        let reg = InMemoryRegistry::new();
        reg.save("alice", "127.0.0.1:1").unwrap();
        let err = reg.save("alice", "127.0.0.1:2").unwrap_err();
        assert!(matches!(err, CoreError::AlreadyRegistered(_)));
        assert_eq!(reg.lookup("alice").unwrap(), "127.0.0.1:1");
    }

    #[test]
    fn delete_removes_entry() {
        let reg = InMemoryRegistry::new();
        reg.save("alice", "127.0.0.1:1").unwrap();
        reg.delete("alice").unwrap();
        assert!(reg.lookup("alice").is_err());
    }

    #[test]
    fn delete_missing_peer_fails() {
        let reg = InMemoryRegistry::new();
        assert!(matches!(reg.delete("ghost").unwrap_err(), CoreError::NotFound(_)));
    }

    #[test]
    fn lookup_missing_peer_fails() {
        let reg = InMemoryRegistry::new();
        assert!(matches!(reg.lookup("ghost").unwrap_err(), CoreError::NotFound(_)));
    }

    #[test]
    fn enumerate_reflects_current_set() {
        let reg = InMemoryRegistry::new();
        reg.save("alice", "127.0.0.1:1").unwrap();
        reg.save("bob", "127.0.0.1:2").unwrap();
        let mut all = reg.enumerate();
        all.sort();
        assert_eq!(
            all,
            vec![
                ("alice".to_string(), "127.0.0.1:1".to_string()),
                ("bob".to_string(), "127.0.0.1:2".to_string()),
            ]
        );
        reg.delete("alice").unwrap();
        assert_eq!(reg.enumerate(), vec![("bob".to_string(), "127.0.0.1:2".to_string())]);
    }
}
