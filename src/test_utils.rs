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

//! Test doubles for the sync manager's collaborators.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use crate::{
    peer::{GossipPeer, PeerPublicKey, PeerSendError, PEER_PUBLIC_KEY_LEN},
    series::{ChannelGraphTimeSeries, ShortChannelId},
    signal::{signal, Signal, SignalTrigger},
    syncer::{GossipSyncer, GossipSyncerFactory, SyncType, SyncerError, SyncerState},
    types::GossipFrame,
};

/// Polls until the condition holds or the timeout elapses.
macro_rules! assert_eventually {
    ($cond:expr) => {
        assert_eventually!($cond, std::time::Duration::from_secs(5));
    };
    ($cond:expr, $timeout:expr) => {{
        let deadline = tokio::time::Instant::now() + $timeout;
        while !$cond {
            if tokio::time::Instant::now() > deadline {
                panic!("condition never became true: {}", stringify!($cond));
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }};
}
pub(crate) use assert_eventually;

pub fn peer_key(byte: u8) -> PeerPublicKey {
    PeerPublicKey::new([byte; PEER_PUBLIC_KEY_LEN])
}

pub struct MockPeer {
    key: PeerPublicKey,
}

impl MockPeer {
    pub fn new(key: PeerPublicKey) -> Arc<Self> {
        Arc::new(Self { key })
    }
}

impl GossipPeer for MockPeer {
    fn public_key(&self) -> PeerPublicKey {
        self.key
    }

    fn send_frames(&self, _frames: Vec<GossipFrame>) -> Result<(), PeerSendError> {
        Ok(())
    }

    fn send_frames_sync(&self, _frames: Vec<GossipFrame>) -> Result<(), PeerSendError> {
        Ok(())
    }
}

pub struct MockTimeSeries;

impl ChannelGraphTimeSeries for MockTimeSeries {
    fn highest_short_chan_id(&self) -> Option<ShortChannelId> {
        None
    }

    fn channels_in_range(&self, _first_block: u32, _num_blocks: u32) -> Vec<ShortChannelId> {
        Vec::new()
    }
}

/// Shared handle into every mock syncer created by a test's factory.
#[derive(Clone, Default)]
pub struct MockSyncerState {
    syncers: Arc<Mutex<Vec<Arc<MockGossipSyncer>>>>,
}

impl MockSyncerState {
    pub fn new() -> Self {
        Default::default()
    }

    /// A factory creating mock syncers and recording them in this state.
    pub fn factory(&self) -> GossipSyncerFactory {
        let state = self.clone();
        Box::new(move |config| {
            let syncer = MockGossipSyncer::create(config.peer_key);
            state.syncers.lock().unwrap().push(syncer.clone());
            syncer
        })
    }

    /// Every mock syncer ever created, including removed ones.
    pub fn syncers(&self) -> Vec<Arc<MockGossipSyncer>> {
        self.syncers.lock().unwrap().clone()
    }

    pub fn get(&self, key: &PeerPublicKey) -> Option<Arc<MockGossipSyncer>> {
        self.syncers().into_iter().find(|syncer| syncer.key() == *key)
    }
}

/// A controllable [`GossipSyncer`] recording every interaction the sync
/// manager has with it.
pub struct MockGossipSyncer {
    key: PeerPublicKey,
    state: Mutex<SyncerState>,
    sync_type: Mutex<SyncType>,
    started: AtomicUsize,
    stopped: AtomicUsize,
    num_historical_syncs: AtomicUsize,
    fail_transitions: AtomicBool,
    fail_historical: AtomicBool,
    synced: Mutex<(SignalTrigger, Signal)>,
}

impl MockGossipSyncer {
    pub fn create(key: PeerPublicKey) -> Arc<Self> {
        Arc::new(Self {
            key,
            state: Mutex::new(SyncerState::ChansSynced),
            sync_type: Mutex::new(SyncType::Passive),
            started: AtomicUsize::new(0),
            stopped: AtomicUsize::new(0),
            num_historical_syncs: AtomicUsize::new(0),
            fail_transitions: AtomicBool::new(false),
            fail_historical: AtomicBool::new(false),
            synced: Mutex::new(signal()),
        })
    }

    pub fn key(&self) -> PeerPublicKey {
        self.key
    }

    pub fn times_started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn times_stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn num_historical_syncs(&self) -> usize {
        self.num_historical_syncs.load(Ordering::SeqCst)
    }

    pub fn set_state(&self, state: SyncerState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn set_fail_transitions(&self, fail: bool) {
        self.fail_transitions.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_historical(&self, fail: bool) {
        self.fail_historical.store(fail, Ordering::SeqCst);
    }

    /// Completes an in-flight historical sync, firing the synced signal.
    pub fn complete_historical_sync(&self) {
        self.set_state(SyncerState::ChansSynced);
        self.synced.lock().unwrap().0.trigger();
    }
}

impl GossipSyncer for MockGossipSyncer {
    fn peer_key(&self) -> PeerPublicKey {
        self.key
    }

    fn start(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }

    fn sync_state(&self) -> SyncerState {
        *self.state.lock().unwrap()
    }

    fn sync_type(&self) -> SyncType {
        *self.sync_type.lock().unwrap()
    }

    fn set_sync_type(&self, sync_type: SyncType) {
        *self.sync_type.lock().unwrap() = sync_type;
    }

    fn process_sync_transition(&self, new_type: SyncType) -> Result<(), SyncerError> {
        let state = self.sync_state();
        if self.fail_transitions.load(Ordering::SeqCst) || state != SyncerState::ChansSynced {
            return Err(SyncerError::TransitionUnavailable(state));
        }
        self.set_sync_type(new_type);
        Ok(())
    }

    fn historical_sync(&self) -> Result<(), SyncerError> {
        let state = self.sync_state();
        if self.fail_historical.load(Ordering::SeqCst) || state != SyncerState::ChansSynced {
            return Err(SyncerError::HistoricalSyncUnavailable(state));
        }
        self.num_historical_syncs.fetch_add(1, Ordering::SeqCst);
        self.set_state(SyncerState::SyncingChans);
        // Arm a fresh synced signal for this sync.
        *self.synced.lock().unwrap() = signal();
        Ok(())
    }

    fn synced_signal(&self) -> Signal {
        self.synced.lock().unwrap().1.clone()
    }
}
