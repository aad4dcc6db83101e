//  Copyright 2024, The Volt Project
//
//  Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
//  following conditions are met:
//
//  1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
//  disclaimer.
//
//  2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
//  following disclaimer in the documentation and/or other materials provided with the distribution.
//
//  3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
//  products derived from this software without specific prior written permission.
//
//  THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
//  INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
//  DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
//  SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
//  SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
//  WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
//  USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    peer::PeerPublicKey,
    syncer::{GossipSyncer, SyncType},
};

/// The active and inactive syncer maps, guarded by a single mutex.
///
/// The maps are disjoint: a peer's syncer lives in exactly one of them at any
/// time. All mutation happens on the sync manager's event loop; public
/// lookups only take the lock briefly to copy out handles.
#[derive(Default)]
pub(super) struct SyncerRegistry {
    inner: Mutex<Maps>,
}

#[derive(Default)]
struct Maps {
    active: HashMap<PeerPublicKey, Arc<dyn GossipSyncer>>,
    inactive: HashMap<PeerPublicKey, Arc<dyn GossipSyncer>>,
}

impl SyncerRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Inserts a syncer into the map matching the given sync type.
    pub fn insert(&self, syncer: Arc<dyn GossipSyncer>, sync_type: SyncType) {
        let mut maps = self.lock();
        let key = syncer.peer_key();
        debug_assert!(!maps.active.contains_key(&key) && !maps.inactive.contains_key(&key));
        match sync_type {
            SyncType::Active => maps.active.insert(key, syncer),
            SyncType::Passive => maps.inactive.insert(key, syncer),
        };
    }

    /// Removes a peer's syncer from whichever map holds it. The returned flag
    /// is true if the syncer was active.
    pub fn remove(&self, peer: &PeerPublicKey) -> Option<(Arc<dyn GossipSyncer>, bool)> {
        let mut maps = self.lock();
        if let Some(syncer) = maps.inactive.remove(peer) {
            return Some((syncer, false));
        }
        maps.active.remove(peer).map(|syncer| (syncer, true))
    }

    /// Looks up a peer's syncer.
    pub fn get(&self, peer: &PeerPublicKey) -> Option<Arc<dyn GossipSyncer>> {
        let maps = self.lock();
        maps.inactive.get(peer).or_else(|| maps.active.get(peer)).cloned()
    }

    pub fn num_active(&self) -> usize {
        self.lock().active.len()
    }

    /// Moves a peer's syncer from the inactive map to the active map.
    pub fn set_active(&self, peer: &PeerPublicKey) {
        let mut maps = self.lock();
        if let Some(syncer) = maps.inactive.remove(peer) {
            maps.active.insert(*peer, syncer);
        }
    }

    /// Moves a peer's syncer from the active map to the inactive map.
    pub fn set_inactive(&self, peer: &PeerPublicKey) {
        let mut maps = self.lock();
        if let Some(syncer) = maps.active.remove(peer) {
            maps.inactive.insert(*peer, syncer);
        }
    }

    /// A fresh copy of the active syncers, for iteration outside the lock.
    pub fn active_syncers(&self) -> Vec<Arc<dyn GossipSyncer>> {
        self.lock().active.values().cloned().collect()
    }

    /// A fresh copy of the inactive syncers, for iteration outside the lock.
    pub fn inactive_syncers(&self) -> Vec<Arc<dyn GossipSyncer>> {
        self.lock().inactive.values().cloned().collect()
    }

    /// A snapshot of every registered syncer across both maps.
    pub fn collect_all(&self) -> HashMap<PeerPublicKey, Arc<dyn GossipSyncer>> {
        let maps = self.lock();
        let mut all = HashMap::with_capacity(maps.active.len() + maps.inactive.len());
        for (key, syncer) in maps.inactive.iter().chain(maps.active.iter()) {
            all.insert(*key, syncer.clone());
        }
        all
    }

    /// Removes and returns every registered syncer.
    pub fn drain(&self) -> Vec<Arc<dyn GossipSyncer>> {
        let mut maps = self.lock();
        let mut all = Vec::with_capacity(maps.active.len() + maps.inactive.len());
        all.extend(maps.inactive.drain().map(|(_, syncer)| syncer));
        all.extend(maps.active.drain().map(|(_, syncer)| syncer));
        all
    }

    #[cfg(test)]
    pub fn active_keys(&self) -> Vec<PeerPublicKey> {
        self.lock().active.keys().copied().collect()
    }

    #[cfg(test)]
    pub fn inactive_keys(&self) -> Vec<PeerPublicKey> {
        self.lock().inactive.keys().copied().collect()
    }

    /// Keys of both maps read under a single lock acquisition.
    #[cfg(test)]
    pub fn snapshot_keys(&self) -> (Vec<PeerPublicKey>, Vec<PeerPublicKey>) {
        let maps = self.lock();
        (
            maps.active.keys().copied().collect(),
            maps.inactive.keys().copied().collect(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, Maps> {
        self.inner.lock().expect("syncer registry lock poisoned")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{peer_key, MockGossipSyncer};

    #[test]
    fn insert_and_remove_track_sync_type() {
        let registry = SyncerRegistry::new();
        registry.insert(MockGossipSyncer::create(peer_key(1)), SyncType::Active);
        registry.insert(MockGossipSyncer::create(peer_key(2)), SyncType::Passive);
        assert_eq!(registry.num_active(), 1);

        let (_, was_active) = registry.remove(&peer_key(1)).unwrap();
        assert!(was_active);
        let (_, was_active) = registry.remove(&peer_key(2)).unwrap();
        assert!(!was_active);
        assert!(registry.remove(&peer_key(2)).is_none());
    }

    #[test]
    fn get_searches_both_maps() {
        let registry = SyncerRegistry::new();
        registry.insert(MockGossipSyncer::create(peer_key(1)), SyncType::Active);
        registry.insert(MockGossipSyncer::create(peer_key(2)), SyncType::Passive);

        assert_eq!(registry.get(&peer_key(1)).unwrap().peer_key(), peer_key(1));
        assert_eq!(registry.get(&peer_key(2)).unwrap().peer_key(), peer_key(2));
        assert!(registry.get(&peer_key(3)).is_none());
        assert_eq!(registry.collect_all().len(), 2);
    }

    #[test]
    fn set_active_and_set_inactive_move_between_maps() {
        let registry = SyncerRegistry::new();
        registry.insert(MockGossipSyncer::create(peer_key(1)), SyncType::Passive);

        registry.set_active(&peer_key(1));
        assert_eq!(registry.num_active(), 1);
        assert!(registry.inactive_keys().is_empty());

        registry.set_inactive(&peer_key(1));
        assert_eq!(registry.num_active(), 0);
        assert_eq!(registry.inactive_keys(), vec![peer_key(1)]);

        // Moving an unknown peer changes nothing.
        registry.set_active(&peer_key(9));
        assert_eq!(registry.num_active(), 0);
    }

    #[test]
    fn drain_empties_both_maps() {
        let registry = SyncerRegistry::new();
        registry.insert(MockGossipSyncer::create(peer_key(1)), SyncType::Active);
        registry.insert(MockGossipSyncer::create(peer_key(2)), SyncType::Passive);

        assert_eq!(registry.drain().len(), 2);
        assert!(registry.collect_all().is_empty());
        assert!(registry.drain().is_empty());
    }
}
