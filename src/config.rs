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

//! Sync manager configuration.

use std::{sync::Arc, time::Duration};

use crate::{
    series::ChannelGraphTimeSeries,
    syncer::{GossipEncoding, GossipSyncerFactory},
    ticker::{IntervalTicker, Ticker},
    types::ChainHash,
};

/// Default interval at which one active syncer is rotated out for a passive
/// one.
pub const DEFAULT_SYNCER_ROTATION_INTERVAL: Duration = Duration::from_secs(20 * 60);

/// Default interval at which a historical sync is forced to repair gaps in
/// the local graph.
pub const DEFAULT_HISTORICAL_SYNC_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default number of peers to receive new graph updates from at tip.
pub const DEFAULT_NUM_ACTIVE_SYNCERS: usize = 3;

/// Runtime dependencies and tuning for the
/// [`SyncManager`](crate::manager::SyncManager).
pub struct SyncManagerConfig {
    /// The chain the node gossips about.
    pub chain_hash: ChainHash,
    /// Time series view of the local channel graph, handed to each syncer.
    pub time_series: Arc<dyn ChannelGraphTimeSeries>,
    /// Number of peers to maintain active syncers with. Once reached, any
    /// further syncer is created passive.
    pub num_active_syncers: usize,
    /// Encoding for short channel id sets in range queries.
    pub encoding: GossipEncoding,
    /// Notifies the manager when to swap an active syncer for a passive one.
    pub rotate_ticker: Box<dyn Ticker>,
    /// Notifies the manager when to force a historical sync.
    pub historical_sync_ticker: Box<dyn Ticker>,
    /// Constructs the node's syncer implementation for each new peer.
    pub syncer_factory: GossipSyncerFactory,
}

impl SyncManagerConfig {
    /// A config with default intervals, encoding and syncer count.
    pub fn new(
        chain_hash: ChainHash,
        time_series: Arc<dyn ChannelGraphTimeSeries>,
        syncer_factory: GossipSyncerFactory,
    ) -> Self {
        Self {
            chain_hash,
            time_series,
            num_active_syncers: DEFAULT_NUM_ACTIVE_SYNCERS,
            encoding: GossipEncoding::default(),
            rotate_ticker: Box::new(IntervalTicker::new(DEFAULT_SYNCER_ROTATION_INTERVAL)),
            historical_sync_ticker: Box::new(IntervalTicker::new(DEFAULT_HISTORICAL_SYNC_INTERVAL)),
            syncer_factory,
        }
    }
}
