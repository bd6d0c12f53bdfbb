//! Anti-Entropy Timing
//!
//! `Ticker` abstracts the clock that drives anti-entropy. Production uses a tokio interval;
//! tests use a `ManualTicker` stepped through a `TickHandle`.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::engine::DisseminationEngine;

/// A source of periodic ticks.
#[async_trait]
pub trait Ticker: Send {
    /// Completes when the next tick is due.
    async fn tick(&mut self);
}

/// Wall-clock ticker backed by `tokio::time::interval`.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    /// First tick fires one `period` from now, not immediately.
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Creates a manually driven ticker and the handle that drives it.
pub fn manual() -> (TickHandle, ManualTicker) {
    let (requests, receiver) = mpsc::channel(1);
    (
        TickHandle { requests },
        ManualTicker {
            requests: receiver,
            in_flight: None,
        },
    )
}

/// Ticker that only fires when its `TickHandle` asks it to.
pub struct ManualTicker {
    requests: mpsc::Receiver<oneshot::Sender<()>>,
    in_flight: Option<oneshot::Sender<()>>,
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) {
        // Being asked for the next tick means the previous one was fully processed
        if let Some(done) = self.in_flight.take() {
            let _ = done.send(());
        }

        match self.requests.recv().await {
            Some(done) => self.in_flight = Some(done),
            None => std::future::pending::<()>().await,
        }
    }
}

#[derive(Clone)]
pub struct TickHandle {
    requests: mpsc::Sender<oneshot::Sender<()>>,
}

impl TickHandle {
    /// Fires one tick and waits until the task has finished processing it.
    ///
    /// Returns `false` if the task is no longer running.
    pub async fn tick(&self) -> bool {
        let (done, processed) = oneshot::channel();
        if self.requests.send(done).await.is_err() {
            return false;
        }
        processed.await.is_ok()
    }
}

/// The periodic anti-entropy task, with an explicit start/stop lifecycle.
pub struct AntiEntropyTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl AntiEntropyTask {
    pub fn start<T>(engine: Arc<DisseminationEngine>, mut ticker: T) -> Self
    where
        T: Ticker + 'static,
    {
        let (stop, mut stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            tracing::info!("Anti-entropy task started ({} mode)", engine.mode());

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        let jobs = engine.tick().await;
                        if jobs > 0 {
                            tracing::debug!("Anti-entropy tick enqueued {} jobs", jobs);
                        }
                    }
                }
            }

            tracing::info!("Anti-entropy task stopped");
        });

        Self { stop, handle }
    }

    pub async fn stop(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            tracing::warn!("Anti-entropy task ended abnormally: {}", e);
        }
    }
}
