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

//! Pausable tick sources for the sync manager's periodic duties.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use tokio::{
    sync::mpsc,
    time::{self, Instant, Interval, MissedTickBehavior},
};

/// A pausable source of tick events.
///
/// Tickers start out stopped; the sync manager resumes them when its event
/// loop starts. [`IntervalTicker`] is the production implementation, while
/// [`ManualTicker`] lets ticks be driven explicitly from tests.
pub trait Ticker: Send {
    /// Resumes delivery of ticks. Has no effect on a running ticker.
    fn resume(&mut self);

    /// Stops delivery of ticks. Has no effect on a stopped ticker.
    fn stop(&mut self);

    /// Polls for the next tick. Pending while the ticker is stopped.
    fn poll_tick(&mut self, cx: &mut Context<'_>) -> Poll<()>;
}

impl<T: Ticker + ?Sized> Ticker for Box<T> {
    fn resume(&mut self) {
        (**self).resume()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn poll_tick(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        (**self).poll_tick(cx)
    }
}

/// Adds a future returning the next tick of any [`Ticker`].
pub trait TickerExt: Ticker {
    fn next_tick(&mut self) -> NextTick<'_, Self> {
        NextTick { ticker: self }
    }
}

impl<T: Ticker + ?Sized> TickerExt for T {}

/// Future returned by [`TickerExt::next_tick`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct NextTick<'a, T: ?Sized> {
    ticker: &'a mut T,
}

impl<'a, T: Ticker + ?Sized> Future for NextTick<'a, T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.get_mut().ticker.poll_tick(cx)
    }
}

/// Ticker backed by a tokio [`Interval`].
///
/// The first tick fires one full period after the ticker is resumed, and
/// stopping discards any pending tick.
pub struct IntervalTicker {
    period: Duration,
    interval: Option<Interval>,
}

impl IntervalTicker {
    /// Creates a stopped ticker with the given period.
    pub fn new(period: Duration) -> Self {
        Self { period, interval: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Ticker for IntervalTicker {
    fn resume(&mut self) {
        if self.interval.is_none() {
            let mut interval = time::interval_at(Instant::now() + self.period, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.interval = Some(interval);
        }
    }

    fn stop(&mut self) {
        self.interval = None;
    }

    fn poll_tick(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        match self.interval.as_mut() {
            Some(interval) => interval.poll_tick(cx).map(|_| ()),
            None => Poll::Pending,
        }
    }
}

/// Ticker driven explicitly through a [`ManualTickerHandle`].
///
/// Ticks fired while the ticker is stopped are buffered and delivered once it
/// resumes.
pub struct ManualTicker {
    active: bool,
    ticks: mpsc::UnboundedReceiver<()>,
}

impl ManualTicker {
    /// Creates a stopped ticker and the handle that drives it.
    pub fn new() -> (Self, ManualTickerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { active: false, ticks: rx }, ManualTickerHandle { ticks: tx })
    }
}

/// Fires ticks on the paired [`ManualTicker`].
#[derive(Clone)]
pub struct ManualTickerHandle {
    ticks: mpsc::UnboundedSender<()>,
}

impl ManualTickerHandle {
    /// Queues a single tick.
    pub fn tick(&self) {
        let _result = self.ticks.send(());
    }
}

impl Ticker for ManualTicker {
    fn resume(&mut self) {
        self.active = true;
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn poll_tick(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if !self.active {
            return Poll::Pending;
        }
        match self.ticks.poll_recv(cx) {
            Poll::Ready(Some(_)) => Poll::Ready(()),
            // All handles dropped, no further ticks can arrive.
            Poll::Ready(None) => Poll::Pending,
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn interval_ticker_fires_repeatedly_after_resume() {
        let mut ticker = IntervalTicker::new(Duration::from_secs(5));
        ticker.resume();
        ticker.next_tick().await;
        ticker.next_tick().await;
    }

    #[tokio::test]
    async fn interval_ticker_pending_while_stopped() {
        let mut ticker = IntervalTicker::new(Duration::from_millis(1));
        assert!(futures::poll!(ticker.next_tick()).is_pending());
        ticker.resume();
        ticker.stop();
        assert!(futures::poll!(ticker.next_tick()).is_pending());
    }

    #[tokio::test]
    async fn manual_ticker_delivers_queued_ticks() {
        let (mut ticker, handle) = ManualTicker::new();
        handle.tick();

        assert!(futures::poll!(ticker.next_tick()).is_pending());
        ticker.resume();
        ticker.next_tick().await;
        assert!(futures::poll!(ticker.next_tick()).is_pending());

        handle.tick();
        handle.tick();
        ticker.next_tick().await;
        ticker.next_tick().await;
    }
}
