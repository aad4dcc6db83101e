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

//! Gossip syncer management for the Volt channel graph.
//!
//! When the node connects to a peer that understands channel range queries,
//! a gossip syncer is created for it. The [`SyncManager`] bounds how many of
//! those syncers actively receive graph updates at the tip of the chain,
//! serializes the node's once-off initial historical sync, rotates the
//! active set periodically, and forces historical re-syncs to repair gaps in
//! the local graph.
//!
//! The per-peer query machinery, wire codec and graph store are collaborators
//! injected through the [`GossipSyncer`], [`GossipPeer`] and
//! [`ChannelGraphTimeSeries`] seams.

pub mod config;
pub mod manager;
pub mod peer;
pub mod series;
pub mod signal;
pub mod syncer;
pub mod ticker;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use config::{
    SyncManagerConfig, DEFAULT_HISTORICAL_SYNC_INTERVAL, DEFAULT_NUM_ACTIVE_SYNCERS,
    DEFAULT_SYNCER_ROTATION_INTERVAL,
};
pub use manager::{SyncManager, SyncManagerError};
pub use peer::{GossipPeer, PeerPublicKey, PeerSendError, PEER_PUBLIC_KEY_LEN};
pub use series::{ChannelGraphTimeSeries, ShortChannelId};
pub use signal::{signal, Signal, SignalTrigger};
pub use syncer::{
    GossipEncoding, GossipSyncer, GossipSyncerConfig, GossipSyncerFactory, SendFrames, SyncType,
    SyncerError, SyncerState, REQUEST_BATCH_SIZE, SORTED_PLAIN_CHUNK_SIZE, ZLIB_DEFLATE_CHUNK_SIZE,
};
pub use ticker::{IntervalTicker, ManualTicker, ManualTickerHandle, NextTick, Ticker, TickerExt};
pub use types::{ChainHash, GossipFrame};
