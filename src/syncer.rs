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

//! The per-peer gossip syncer seam.
//!
//! The sync manager drives each peer's gossip syncer through the
//! [`GossipSyncer`] trait. The query/reply state machine itself lives with
//! the node's wire layer; the manager only creates syncers, classifies them
//! as active or passive, and kicks off historical syncs.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{
    peer::{PeerPublicKey, PeerSendError},
    series::ChannelGraphTimeSeries,
    signal::Signal,
    types::{ChainHash, GossipFrame},
};

/// Number of short channel ids per reply chunk under sorted-plain encoding.
pub const SORTED_PLAIN_CHUNK_SIZE: usize = 8000;

/// Number of short channel ids per reply chunk under zlib encoding.
pub const ZLIB_DEFLATE_CHUNK_SIZE: usize = 3000;

/// Number of channels a syncer requests announcements for in a single batch.
pub const REQUEST_BATCH_SIZE: usize = 500;

/// Wire encoding used for short channel id sets in range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GossipEncoding {
    /// Uncompressed, sorted short channel ids.
    #[default]
    SortedPlain,
    /// Zlib-deflated sorted short channel ids.
    ZlibDeflate,
}

impl GossipEncoding {
    /// The maximum number of short channel ids a single reply chunk may carry
    /// under this encoding.
    pub fn chunk_size(self) -> usize {
        match self {
            GossipEncoding::SortedPlain => SORTED_PLAIN_CHUNK_SIZE,
            GossipEncoding::ZlibDeflate => ZLIB_DEFLATE_CHUNK_SIZE,
        }
    }
}

/// Determines how much gossip a syncer exchanges with its peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncType {
    /// The local node sends its gossip filter and receives new graph updates
    /// at the tip of the chain.
    Active,
    /// The syncer only answers the remote peer's queries.
    Passive,
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The stages of a gossip syncer's query state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncerState {
    /// The syncer is about to send its initial channel range query.
    SyncingChans,
    /// A channel range query is outstanding.
    WaitingQueryRangeReply,
    /// The syncer is requesting announcements for newly discovered channels.
    QueryNewChannels,
    /// A short channel id query is outstanding.
    WaitingQueryChanReply,
    /// No queries are outstanding; the syncer may accept a sync type
    /// transition.
    ChansSynced,
}

impl fmt::Display for SyncerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Errors a syncer may return to the sync manager.
#[derive(Debug, Error)]
pub enum SyncerError {
    #[error("sync transition unavailable in state {0}")]
    TransitionUnavailable(SyncerState),
    #[error("historical sync unavailable in state {0}")]
    HistoricalSyncUnavailable(SyncerState),
    #[error("failed to send to peer: {0}")]
    SendFailed(#[from] PeerSendError),
}

/// Sends encoded gossip messages to the syncer's peer.
pub type SendFrames = Arc<dyn Fn(Vec<GossipFrame>) -> Result<(), PeerSendError> + Send + Sync>;

/// Everything needed to construct a gossip syncer for a newly connected peer.
pub struct GossipSyncerConfig {
    /// Identifies the chain the syncer gossips about.
    pub chain_hash: ChainHash,
    /// The peer on the other end.
    pub peer_key: PeerPublicKey,
    /// Time series view of the local channel graph, used to build and answer
    /// channel range queries.
    pub time_series: Arc<dyn ChannelGraphTimeSeries>,
    /// Encoding for short channel id sets.
    pub encoding: GossipEncoding,
    /// Maximum short channel ids per reply chunk.
    pub chunk_size: usize,
    /// Number of channels queried per announcement batch.
    pub batch_size: usize,
    /// Best-effort send to the peer.
    pub send_to_peer: SendFrames,
    /// Send to the peer, waiting for the write to complete.
    pub send_to_peer_sync: SendFrames,
}

/// Handle to a single peer's gossip syncer.
///
/// Syncers are created passive and chans synced so they can answer queries
/// and accept a sync type transition immediately. The manager guarantees
/// `start` and `stop` are each invoked exactly once; `stop` may block until
/// the syncer's internal task has exited and must tolerate redundant calls.
pub trait GossipSyncer: Send + Sync + 'static {
    /// Key of the peer this syncer gossips with.
    fn peer_key(&self) -> PeerPublicKey;

    /// Starts the syncer's query machinery.
    fn start(&self);

    /// Stops the syncer, releasing its resources.
    fn stop(&self);

    /// The syncer's current query state.
    fn sync_state(&self) -> SyncerState;

    /// The syncer's current sync type.
    fn sync_type(&self) -> SyncType;

    /// Sets the sync type without engaging the remote peer. Only valid before
    /// the syncer is started.
    fn set_sync_type(&self, sync_type: SyncType);

    /// Transitions a running syncer to the given sync type, updating the
    /// remote peer's gossip filter accordingly. Fails unless the syncer is in
    /// [`SyncerState::ChansSynced`].
    fn process_sync_transition(&self, new_type: SyncType) -> Result<(), SyncerError>;

    /// Begins a historical sync, retrieving the full channel graph known to
    /// the peer. Fails unless the syncer is in [`SyncerState::ChansSynced`].
    fn historical_sync(&self) -> Result<(), SyncerError>;

    /// A signal that fires when the syncer next returns to
    /// [`SyncerState::ChansSynced`]. Obtain a fresh signal after each call to
    /// [`historical_sync`](GossipSyncer::historical_sync).
    fn synced_signal(&self) -> Signal;
}

/// Creates the node's gossip syncer implementation for a newly connected
/// peer.
pub type GossipSyncerFactory = Box<dyn Fn(GossipSyncerConfig) -> Arc<dyn GossipSyncer> + Send + Sync>;
