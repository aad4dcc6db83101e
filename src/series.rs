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

//! Time series access to the local channel graph.

use std::fmt;

/// A channel's position in the chain: block height, transaction index and
/// output index packed into a u64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShortChannelId(pub u64);

impl ShortChannelId {
    pub fn block_height(&self) -> u32 {
        (self.0 >> 40) as u32
    }

    pub fn tx_index(&self) -> u32 {
        ((self.0 >> 16) & 0xff_ffff) as u32
    }

    pub fn output_index(&self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl fmt::Display for ShortChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.block_height(), self.tx_index(), self.output_index())
    }
}

/// Read access to a time series view of the known channel graph.
///
/// Gossip syncers use this to build and answer channel range queries; the
/// sync manager only passes the handle through to each syncer it creates.
pub trait ChannelGraphTimeSeries: Send + Sync + 'static {
    /// The highest short channel id present in the local graph, if any.
    fn highest_short_chan_id(&self) -> Option<ShortChannelId>;

    /// Short channel ids of all known channels confirmed within the given
    /// block range.
    fn channels_in_range(&self, first_block: u32, num_blocks: u32) -> Vec<ShortChannelId>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_channel_id_unpacks_its_components() {
        let id = ShortChannelId((700_123u64 << 40) | (42u64 << 16) | 7);
        assert_eq!(id.block_height(), 700_123);
        assert_eq!(id.tx_index(), 42);
        assert_eq!(id.output_index(), 7);
        assert_eq!(id.to_string(), "700123:42:7");
    }
}
