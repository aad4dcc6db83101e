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

//! # Gossip Sync Manager
//!
//! Manages the gossip syncers for all currently connected peers. When a peer
//! connects, the manager creates its syncer and decides whether it should
//! receive graph updates at the tip of the chain (active) or only answer
//! queries (passive), bounded by the configured number of active syncers.
//!
//! The first registered peer serves the node's initial historical sync, and
//! until that sync completes every new syncer is held passive so most of the
//! graph is known before updates are accepted at tip. Periodic tickers rotate
//! the active set to diversify update sources and force historical re-syncs
//! to repair gaps in the local graph.

mod registry;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use futures::future;
use log::*;
use rand::seq::SliceRandom;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task,
    task::JoinHandle,
};

use self::registry::SyncerRegistry;
use crate::{
    config::SyncManagerConfig,
    peer::{GossipPeer, PeerPublicKey},
    signal::{signal, Signal, SignalTrigger},
    syncer::{GossipSyncer, GossipSyncerConfig, SyncType, SyncerError, SyncerState, REQUEST_BATCH_SIZE},
    ticker::TickerExt,
};

const LOG_TARGET: &str = "gossip_sync::manager";

/// Depth of the register and deregister request channels.
const REQUEST_BUFFER_SIZE: usize = 16;

#[derive(Debug, Error)]
pub enum SyncManagerError {
    /// A public API call raced the manager's shutdown.
    #[error("sync manager exiting")]
    Exiting,
}

/// Request to create a syncer for a newly connected peer.
struct NewSyncerRequest {
    peer: Arc<dyn GossipPeer>,
    /// Fired once the registry reflects the new syncer.
    done: oneshot::Sender<()>,
}

/// Request to tear down the syncer of a disconnected peer.
struct StaleSyncerRequest {
    peer: PeerPublicKey,
    /// Fired once the registry no longer contains the peer.
    done: oneshot::Sender<()>,
}

/// Supervises the gossip syncers of all connected peers.
///
/// All mutation is funnelled through a single event loop task, so state
/// changes are totally ordered. The public API communicates with the loop
/// over bounded channels and blocks until the loop acknowledges each request,
/// which makes a successful [`register_peer`](SyncManager::register_peer)
/// observable through [`gossip_syncer`](SyncManager::gossip_syncer)
/// immediately.
pub struct SyncManager {
    registry: Arc<SyncerRegistry>,
    new_syncers_tx: mpsc::Sender<NewSyncerRequest>,
    stale_syncers_tx: mpsc::Sender<StaleSyncerRequest>,
    quit_trigger: SignalTrigger,
    quit: Signal,
    worker: Mutex<Option<SyncManagerWorker>>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SyncManager {
    /// Creates a stopped sync manager. Call [`start`](SyncManager::start)
    /// from within a tokio runtime to begin servicing peers.
    pub fn new(config: SyncManagerConfig) -> Self {
        let (new_syncers_tx, new_syncers_rx) = mpsc::channel(REQUEST_BUFFER_SIZE);
        let (stale_syncers_tx, stale_syncers_rx) = mpsc::channel(REQUEST_BUFFER_SIZE);
        let (quit_trigger, quit) = signal();
        let registry = Arc::new(SyncerRegistry::new());

        let worker = SyncManagerWorker {
            config,
            registry: registry.clone(),
            new_syncers: new_syncers_rx,
            stale_syncers: stale_syncers_rx,
            quit: quit.clone(),
            attempt_initial_historical_sync: true,
            initial_historical_sync_completed: false,
            initial_historical_syncer: None,
            initial_historical_sync_signal: None,
        };

        Self {
            registry,
            new_syncers_tx,
            stale_syncers_tx,
            quit_trigger,
            quit,
            worker: Mutex::new(Some(worker)),
            worker_handle: Mutex::new(None),
        }
    }

    /// Spawns the manager's event loop. Subsequent calls have no effect.
    pub fn start(&self) {
        let worker = self.worker.lock().expect("sync manager lock poisoned").take();
        if let Some(worker) = worker {
            let handle = task::spawn(worker.run());
            *self.worker_handle.lock().expect("sync manager lock poisoned") = Some(handle);
        }
    }

    /// Signals the event loop to exit, waits for it, then stops every
    /// remaining syncer serially. Subsequent calls have no effect.
    pub async fn stop(&self) {
        self.quit_trigger.trigger();

        let handle = self.worker_handle.lock().expect("sync manager lock poisoned").take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(target: LOG_TARGET, "Sync manager event loop panicked: {:?}", err);
            }
        }

        for syncer in self.registry.drain() {
            syncer.stop();
        }
    }

    /// Creates and starts a gossip syncer for a newly connected peer.
    ///
    /// Returns once the manager's internal state reflects the new syncer, so
    /// a subsequent [`gossip_syncer`](SyncManager::gossip_syncer) lookup is
    /// guaranteed to observe the peer. Registering an already known peer has
    /// no effect. The first peer registered with the manager is asked to
    /// serve an initial historical sync of the channel graph.
    pub async fn register_peer(&self, peer: Arc<dyn GossipPeer>) -> Result<(), SyncManagerError> {
        let (done_tx, done_rx) = oneshot::channel();
        let request = NewSyncerRequest { peer, done: done_tx };

        let mut quit = self.quit.clone();
        tokio::select! {
            result = self.new_syncers_tx.send(request) => {
                if result.is_err() {
                    return Err(SyncManagerError::Exiting);
                }
            },
            _ = &mut quit => return Err(SyncManagerError::Exiting),
        }

        tokio::select! {
            result = done_rx => result.map_err(|_| SyncManagerError::Exiting),
            _ = &mut quit => Err(SyncManagerError::Exiting),
        }
    }

    /// Tears down the syncer of a disconnected peer.
    ///
    /// Returns once the syncer has been removed, or immediately when the
    /// manager is shutting down; shutdown stops every syncer regardless, so
    /// no error is reported.
    pub async fn deregister_peer(&self, peer: PeerPublicKey) {
        let (done_tx, done_rx) = oneshot::channel();
        let request = StaleSyncerRequest { peer, done: done_tx };

        let mut quit = self.quit.clone();
        tokio::select! {
            result = self.stale_syncers_tx.send(request) => {
                if result.is_err() {
                    return;
                }
            },
            _ = &mut quit => return,
        }

        tokio::select! {
            _ = done_rx => {},
            _ = &mut quit => {},
        }
    }

    /// The syncer registered for the given peer, if any.
    pub fn gossip_syncer(&self, peer: &PeerPublicKey) -> Option<Arc<dyn GossipSyncer>> {
        self.registry.get(peer)
    }

    /// A snapshot of every currently registered syncer.
    pub fn gossip_syncers(&self) -> HashMap<PeerPublicKey, Arc<dyn GossipSyncer>> {
        self.registry.collect_all()
    }
}

/// The sync manager's event loop. Only this task mutates the registry, and
/// the bootstrap fields below are private to it.
struct SyncManagerWorker {
    config: SyncManagerConfig,
    registry: Arc<SyncerRegistry>,
    new_syncers: mpsc::Receiver<NewSyncerRequest>,
    stale_syncers: mpsc::Receiver<StaleSyncerRequest>,
    quit: Signal,

    /// True while no peer is serving the initial historical sync and the
    /// bootstrap has not completed; the next registered peer is asked to
    /// serve it.
    attempt_initial_historical_sync: bool,
    /// Barrier for active classification: until the initial historical sync
    /// completes, every new syncer is held passive.
    initial_historical_sync_completed: bool,
    /// The syncer currently serving the initial historical sync.
    initial_historical_syncer: Option<Arc<dyn GossipSyncer>>,
    /// Fires when the initial historical sync completes.
    initial_historical_sync_signal: Option<Signal>,
}

impl SyncManagerWorker {
    async fn run(mut self) {
        debug!(target: LOG_TARGET, "Sync manager event loop started");

        self.config.rotate_ticker.resume();
        self.config.historical_sync_ticker.resume();

        loop {
            // The signal is cleared once it fires, keeping its branch parked
            // outside an initial historical sync.
            let initial_sync_signal = self.initial_historical_sync_signal.clone();

            tokio::select! {
                Some(request) = self.new_syncers.recv() => {
                    self.handle_new_syncer(request);
                },

                Some(request) = self.stale_syncers.recv() => {
                    self.handle_stale_syncer(request);
                },

                _ = async {
                    match initial_sync_signal {
                        Some(signal) => signal.await,
                        None => future::pending().await,
                    }
                } => {
                    self.handle_initial_historical_sync_completed();
                },

                _ = self.config.rotate_ticker.next_tick() => {
                    self.rotate_active_syncer_candidate();
                },

                _ = self.config.historical_sync_ticker.next_tick() => {
                    self.force_historical_sync();
                },

                _ = &mut self.quit => {
                    debug!(
                        target: LOG_TARGET,
                        "Sync manager event loop shutting down because the quit signal was received"
                    );
                    break;
                }
            }
        }

        self.config.rotate_ticker.stop();
        self.config.historical_sync_ticker.stop();
    }

    /// Creates, classifies and starts a syncer for a newly connected peer,
    /// then kicks off the initial historical sync if the manager still needs
    /// one.
    fn handle_new_syncer(&mut self, request: NewSyncerRequest) {
        let NewSyncerRequest { peer, done } = request;
        let peer_key = peer.public_key();

        // A reconnecting peer may race its own deregistration; never replace
        // an existing syncer.
        if self.registry.get(&peer_key).is_some() {
            let _ = done.send(());
            return;
        }

        let syncer = self.create_gossip_syncer(peer);

        // Hold every syncer passive until the initial historical sync has
        // completed, so most of the graph is known before updates are
        // accepted at tip.
        let sync_type = if self.registry.num_active() >= self.config.num_active_syncers
            || !self.initial_historical_sync_completed
        {
            SyncType::Passive
        } else {
            SyncType::Active
        };
        syncer.set_sync_type(sync_type);
        self.registry.insert(syncer.clone(), sync_type);

        syncer.start();
        let _ = done.send(());

        if !self.attempt_initial_historical_sync {
            return;
        }

        debug!(
            target: LOG_TARGET,
            "Attempting initial historical sync with GossipSyncer({})", peer_key
        );
        if let Err(err) = syncer.historical_sync() {
            error!(
                target: LOG_TARGET,
                "Unable to attempt initial historical sync with GossipSyncer({}): {}", peer_key, err
            );
            return;
        }

        // Track the syncer and its synced signal so the sync can be handed
        // to another peer if this one disconnects.
        self.attempt_initial_historical_sync = false;
        self.initial_historical_sync_signal = Some(syncer.synced_signal());
        self.initial_historical_syncer = Some(syncer);
    }

    /// Builds the syncer configuration for a peer and hands it to the node's
    /// syncer factory.
    fn create_gossip_syncer(&self, peer: Arc<dyn GossipPeer>) -> Arc<dyn GossipSyncer> {
        let peer_key = peer.public_key();
        info!(target: LOG_TARGET, "Creating new GossipSyncer for peer {}", peer_key);

        let encoding = self.config.encoding;
        let send_peer = peer.clone();
        let send_peer_sync = peer;
        let syncer = (self.config.syncer_factory)(GossipSyncerConfig {
            chain_hash: self.config.chain_hash,
            peer_key,
            time_series: self.config.time_series.clone(),
            encoding,
            chunk_size: encoding.chunk_size(),
            batch_size: REQUEST_BATCH_SIZE,
            send_to_peer: Arc::new(move |frames| send_peer.send_frames(frames)),
            send_to_peer_sync: Arc::new(move |frames| send_peer_sync.send_frames_sync(frames)),
        });

        // Syncers begin passive and chans synced so they can answer queries
        // and accept a sync transition immediately.
        debug_assert_eq!(syncer.sync_state(), SyncerState::ChansSynced);
        debug_assert_eq!(syncer.sync_type(), SyncType::Passive);
        syncer
    }

    /// Removes and stops the syncer of a disconnected peer, then repairs the
    /// active set and the initial historical sync if the peer was serving
    /// either role.
    fn handle_stale_syncer(&mut self, request: StaleSyncerRequest) {
        let StaleSyncerRequest { peer, done } = request;

        let removed = self.remove_gossip_syncer(&peer);
        let _ = done.send(());
        if !removed {
            return;
        }

        // Nothing further to do unless the disconnected peer was serving the
        // initial historical sync.
        let initial_syncer_key = self.initial_historical_syncer.as_ref().map(|s| s.peer_key());
        if initial_syncer_key != Some(peer) {
            return;
        }

        debug!(target: LOG_TARGET, "Finding replacement for initial historical sync");
        match self.force_historical_sync() {
            Some(replacement) => {
                debug!(
                    target: LOG_TARGET,
                    "Replaced initial historical GossipSyncer({}) with GossipSyncer({})",
                    peer,
                    replacement.peer_key()
                );
                self.initial_historical_sync_signal = Some(replacement.synced_signal());
                self.initial_historical_syncer = Some(replacement);
            },
            None => {
                debug!(
                    target: LOG_TARGET,
                    "No eligible replacement found for initial historical sync"
                );
                // Re-arm so the next peer to register serves the sync.
                self.attempt_initial_historical_sync = true;
                self.initial_historical_syncer = None;
                self.initial_historical_sync_signal = None;
            },
        }
    }

    /// Removes all references to a peer's syncer and stops it. When an
    /// active syncer is removed, a passive one, if any, takes its place.
    /// Returns false if the peer had no syncer.
    fn remove_gossip_syncer(&self, peer: &PeerPublicKey) -> bool {
        let Some((syncer, was_active)) = self.registry.remove(peer) else {
            return false;
        };

        info!(target: LOG_TARGET, "Removing GossipSyncer for peer {}", peer);

        // A slow stop must not stall the event loop.
        task::spawn_blocking(move || syncer.stop());

        if !was_active {
            return true;
        }

        let candidates = self.registry.inactive_syncers();
        if let Some(new_active) =
            choose_random_syncer(candidates, Some(&|s| self.transition_passive_syncer(s)))
        {
            debug!(
                target: LOG_TARGET,
                "Replaced active GossipSyncer({}) with GossipSyncer({})",
                peer,
                new_active.peer_key()
            );
        }
        true
    }

    /// Completes the bootstrap: new graph updates may now be accepted at
    /// tip, so any free active slots are filled from the passive set.
    fn handle_initial_historical_sync_completed(&mut self) {
        debug!(target: LOG_TARGET, "Initial historical sync completed");

        self.initial_historical_syncer = None;
        self.initial_historical_sync_signal = None;
        self.initial_historical_sync_completed = true;

        let num_active_left = self
            .config
            .num_active_syncers
            .saturating_sub(self.registry.num_active());
        if num_active_left == 0 {
            return;
        }

        debug!(
            target: LOG_TARGET,
            "Attempting to transition {} passive GossipSyncers to active", num_active_left
        );
        for _ in 0..num_active_left {
            let candidates = self.registry.inactive_syncers();
            let promoted = choose_random_syncer(candidates, Some(&|s| self.transition_passive_syncer(s)));
            if promoted.is_none() {
                break;
            }
        }
    }

    /// Swaps one active syncer for a passive one; both must be chans synced.
    /// When the demotion succeeds but the promotion fails, the freed slot is
    /// left open until the next rotation or peer connection.
    fn rotate_active_syncer_candidate(&mut self) {
        let Some(active_syncer) = choose_random_syncer(self.registry.active_syncers(), None) else {
            debug!(target: LOG_TARGET, "No eligible active syncer to rotate");
            return;
        };
        let Some(candidate) = choose_random_syncer(self.registry.inactive_syncers(), None) else {
            debug!(target: LOG_TARGET, "No eligible candidate to rotate active syncer");
            return;
        };

        debug!(
            target: LOG_TARGET,
            "Rotating active GossipSyncer({}) with GossipSyncer({})",
            active_syncer.peer_key(),
            candidate.peer_key()
        );

        if let Err(err) = self.transition_active_syncer(&active_syncer) {
            error!(
                target: LOG_TARGET,
                "Unable to transition active GossipSyncer({}): {}",
                active_syncer.peer_key(),
                err
            );
            return;
        }
        if let Err(err) = self.transition_passive_syncer(&candidate) {
            error!(
                target: LOG_TARGET,
                "Unable to transition passive GossipSyncer({}): {}",
                candidate.peer_key(),
                err
            );
        }
    }

    /// Forces a historical sync with a randomly chosen syncer, sampling from
    /// the combined active and inactive sets.
    fn force_historical_sync(&mut self) -> Option<Arc<dyn GossipSyncer>> {
        let candidates: Vec<_> = self.registry.collect_all().into_values().collect();
        choose_random_syncer(candidates, Some(&|syncer| syncer.historical_sync()))
    }

    /// Transitions an active syncer to passive, moving it to the inactive
    /// map.
    fn transition_active_syncer(&self, syncer: &Arc<dyn GossipSyncer>) -> Result<(), SyncerError> {
        debug!(
            target: LOG_TARGET,
            "Transitioning active GossipSyncer({}) to passive",
            syncer.peer_key()
        );
        syncer.process_sync_transition(SyncType::Passive)?;
        self.registry.set_inactive(&syncer.peer_key());
        Ok(())
    }

    /// Transitions a passive syncer to active, moving it to the active map.
    fn transition_passive_syncer(&self, syncer: &Arc<dyn GossipSyncer>) -> Result<(), SyncerError> {
        debug!(
            target: LOG_TARGET,
            "Transitioning passive GossipSyncer({}) to active",
            syncer.peer_key()
        );
        syncer.process_sync_transition(SyncType::Active)?;
        self.registry.set_active(&syncer.peer_key());
        Ok(())
    }
}

/// Tries the given syncers in uniformly random order, skipping any that are
/// not chans synced, and returns the first for which `action` succeeds, or
/// simply the first eligible one when no action is given.
#[allow(clippy::type_complexity)]
fn choose_random_syncer(
    mut candidates: Vec<Arc<dyn GossipSyncer>>,
    action: Option<&dyn Fn(&Arc<dyn GossipSyncer>) -> Result<(), SyncerError>>,
) -> Option<Arc<dyn GossipSyncer>> {
    candidates.shuffle(&mut rand::thread_rng());

    for syncer in candidates {
        // Only chans synced syncers can process a sync transition.
        if syncer.sync_state() != SyncerState::ChansSynced {
            continue;
        }
        if let Some(action) = action {
            if let Err(err) = action(&syncer) {
                debug!(
                    target: LOG_TARGET,
                    "Skipping eligible candidate GossipSyncer({}): {}",
                    syncer.peer_key(),
                    err
                );
                continue;
            }
        }
        return Some(syncer);
    }

    None
}
