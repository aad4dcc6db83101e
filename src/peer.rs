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

//! What the sync manager requires of a connected peer.

use std::fmt;

use thiserror::Error;

use crate::types::GossipFrame;

/// Length in bytes of a compressed secp256k1 public key.
pub const PEER_PUBLIC_KEY_LEN: usize = 33;

/// A peer's identity key. Totally ordered and hashable so it can key the
/// syncer registry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerPublicKey([u8; PEER_PUBLIC_KEY_LEN]);

impl PeerPublicKey {
    pub const fn new(bytes: [u8; PEER_PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PEER_PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Abbreviated hex form used in log output.
    pub fn short_str(&self) -> String {
        self.0[..4].iter().map(|byte| format!("{:02x}", byte)).collect()
    }
}

impl From<[u8; PEER_PUBLIC_KEY_LEN]> for PeerPublicKey {
    fn from(bytes: [u8; PEER_PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for PeerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for PeerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerPublicKey({})", self.short_str())
    }
}

/// Returned by a peer's send operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerSendError {
    #[error("peer connection is closed")]
    ConnectionClosed,
    #[error("peer write queue is full")]
    QueueFull,
}

/// A connected peer able to receive gossip messages.
///
/// Implemented by the node's peer connection type. Both send operations queue
/// messages onto the peer's write pump; the synchronous variant additionally
/// waits for the messages to be written to the wire.
pub trait GossipPeer: Send + Sync + 'static {
    /// The peer's identity key.
    fn public_key(&self) -> PeerPublicKey;

    /// Queues messages for delivery without waiting for the write.
    fn send_frames(&self, frames: Vec<GossipFrame>) -> Result<(), PeerSendError>;

    /// Queues messages and waits until they have been written to the wire.
    fn send_frames_sync(&self, frames: Vec<GossipFrame>) -> Result<(), PeerSendError>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_is_full_hex() {
        let mut bytes = [0u8; PEER_PUBLIC_KEY_LEN];
        bytes[0] = 0x02;
        bytes[32] = 0xff;
        let key = PeerPublicKey::new(bytes);
        let hex = key.to_string();
        assert_eq!(hex.len(), PEER_PUBLIC_KEY_LEN * 2);
        assert!(hex.starts_with("02"));
        assert!(hex.ends_with("ff"));
        assert_eq!(key.short_str(), "02000000");
    }
}
