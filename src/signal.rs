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

//! One-shot completion signals.
//!
//! A [`Signal`] is a cheaply clonable future that resolves once its paired
//! [`SignalTrigger`] fires. The sync manager uses a signal pair for its quit
//! broadcast, and gossip syncers hand out signals that fire when a historical
//! sync completes.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use futures::{
    channel::oneshot,
    future::{FusedFuture, Shared},
    FutureExt,
};

/// Creates a connected trigger/signal pair.
pub fn signal() -> (SignalTrigger, Signal) {
    let (tx, rx) = oneshot::channel();
    (
        SignalTrigger {
            sender: Arc::new(Mutex::new(Some(tx))),
        },
        Signal { inner: rx.shared() },
    )
}

/// Fires the paired [`Signal`] exactly once.
#[derive(Clone, Debug)]
pub struct SignalTrigger {
    sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl SignalTrigger {
    /// Fires the signal. Subsequent calls have no effect.
    pub fn trigger(&self) {
        let mut sender = self.sender.lock().expect("signal trigger lock poisoned");
        if let Some(tx) = sender.take() {
            let _result = tx.send(());
        }
    }

    /// Returns true once [`trigger`](SignalTrigger::trigger) has been called.
    pub fn is_triggered(&self) -> bool {
        self.sender.lock().expect("signal trigger lock poisoned").is_none()
    }
}

/// Resolves once the paired [`SignalTrigger`] fires or is dropped. Clones may
/// be awaited independently, and a completed signal may be polled again.
#[derive(Clone, Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Signal {
    inner: Shared<oneshot::Receiver<()>>,
}

impl Future for Signal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.inner.is_terminated() {
            return Poll::Ready(());
        }
        match Pin::new(&mut self.inner).poll(cx) {
            // A dropped trigger can never fire, so resolve rather than park
            // the waiter forever.
            Poll::Ready(_) => Poll::Ready(()),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl FusedFuture for Signal {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}
