use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::error::{ChatError, Result};
use crate::peer::PeerId;
use crate::session::PeerSession;

/// Live peers keyed by identity.
///
/// Shared by every protocol runner and the command loop. Each operation takes
/// the lock once and releases it before returning, so callers never hold it
/// across their own work.
#[derive(Default)]
pub struct PeerRegistry {
    peers: Mutex<HashMap<PeerId, Arc<dyn PeerSession>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn peers(&self) -> MutexGuard<'_, HashMap<PeerId, Arc<dyn PeerSession>>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `session` under its identity.
    ///
    /// An identity may only be registered once at a time; a second attempt
    /// leaves the existing entry alone and fails with
    /// [`ChatError::DuplicatePeer`].
    pub fn register(&self, session: Arc<dyn PeerSession>) -> Result<()> {
        let id = session.id();
        match self.peers().entry(id) {
            Entry::Occupied(_) => Err(ChatError::DuplicatePeer(id)),
            Entry::Vacant(slot) => {
                slot.insert(session);
                debug!("registered peer {}", id.short());
                Ok(())
            }
        }
    }

    /// Remove `id`. Returns whether an entry was present.
    pub fn unregister(&self, id: &PeerId) -> bool {
        let removed = self.peers().remove(id).is_some();
        if removed {
            debug!("unregistered peer {}", id.short());
        }
        removed
    }

    /// Register `session` and return a guard that unregisters it on drop.
    pub fn enroll(self: &Arc<Self>, session: Arc<dyn PeerSession>) -> Result<Registration> {
        let id = session.id();
        self.register(session)?;
        Ok(Registration {
            registry: Arc::clone(self),
            id,
        })
    }

    /// Point-in-time copy of the live sessions.
    pub fn snapshot(&self) -> Vec<Arc<dyn PeerSession>> {
        self.peers().values().cloned().collect()
    }

    /// Point-in-time copy of the live identities.
    pub fn ids(&self) -> Vec<PeerId> {
        self.peers().keys().copied().collect()
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.peers().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers().is_empty()
    }
}

/// Registry membership held by one protocol runner.
///
/// Dropping it removes the peer, whichever way the runner exits.
pub struct Registration {
    registry: Arc<PeerRegistry>,
    id: PeerId,
}

impl Registration {
    pub fn id(&self) -> PeerId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySession;
    use crate::peer::NODE_ID_LEN;
    use std::collections::HashSet;

    fn peer(n: u8) -> PeerId {
        PeerId::from_bytes([n; NODE_ID_LEN])
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = PeerRegistry::new();
        let (first, _h1) = MemorySession::new(peer(1));
        let (second, _h2) = MemorySession::new(peer(1));
        registry.register(first.clone()).unwrap();
        let err = registry.register(second).unwrap_err();
        assert!(matches!(err, ChatError::DuplicatePeer(id) if id == peer(1)));
        assert_eq!(registry.len(), 1);
        let kept = registry.snapshot();
        assert_eq!(
            Arc::as_ptr(&kept[0]) as *const (),
            Arc::as_ptr(&first) as *const ()
        );
    }

    #[test]
    fn unregister_absent_is_noop() {
        let registry = PeerRegistry::new();
        assert!(!registry.unregister(&peer(9)));
        assert!(registry.is_empty());
    }

    #[test]
    fn guard_unregisters_on_drop() {
        let registry = Arc::new(PeerRegistry::new());
        let (session, _handle) = MemorySession::new(peer(3));
        let guard = registry.enroll(session).unwrap();
        assert_eq!(guard.id(), peer(3));
        assert!(registry.contains(&peer(3)));
        drop(guard);
        assert!(!registry.contains(&peer(3)));
    }

    #[test]
    fn failed_enroll_keeps_existing_entry() {
        let registry = Arc::new(PeerRegistry::new());
        let (a, _ha) = MemorySession::new(peer(4));
        let (b, _hb) = MemorySession::new(peer(4));
        let _guard = registry.enroll(a).unwrap();
        assert!(registry.enroll(b).is_err());
        assert!(registry.contains(&peer(4)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_churn_settles_to_live_set() {
        let registry = Arc::new(PeerRegistry::new());
        let mut tasks = Vec::new();
        for n in 0..64u8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let (session, _handle) = MemorySession::new(peer(n));
                registry.register(session).unwrap();
                tokio::task::yield_now().await;
                let _ = registry.snapshot();
                if n % 2 == 0 {
                    assert!(registry.unregister(&peer(n)));
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        let live: HashSet<PeerId> = registry.ids().into_iter().collect();
        let expected: HashSet<PeerId> = (0..64u8).filter(|n| n % 2 == 1).map(peer).collect();
        assert_eq!(live, expected);
        assert_eq!(registry.len(), 32);
    }
}
