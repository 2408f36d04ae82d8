use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// Decides how long to wait before the next compound RTCP emission.
///
/// RFC 3550 6.3 prescribes an adaptive interval computed from the RTCP
/// bandwidth share, the sender/member counts, and the average compound
/// size; such a computation slots in here without touching the session.
pub trait RtcpIntervalStrategy: Send + Sync {
    fn next_interval(&self) -> Duration;
}

/// The fixed cadence the engine ships with.
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval(Duration);

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self(interval)
    }
}

impl RtcpIntervalStrategy for FixedInterval {
    fn next_interval(&self) -> Duration {
        self.0
    }
}

/// Repeating one-shot timer driving compound RTCP emission: sleep for the
/// strategy's interval, tick, reschedule. Cancellation stops the loop at
/// the next await point.
pub struct RtcpScheduler {
    strategy: Arc<dyn RtcpIntervalStrategy>,
    token: CancellationToken,
}

impl RtcpScheduler {
    pub fn new(strategy: Arc<dyn RtcpIntervalStrategy>, token: CancellationToken) -> Self {
        Self { strategy, token }
    }

    /// Spawn the tick loop. `tick` returns false to stop rescheduling.
    pub fn start<F>(&self, tick: F)
    where
        F: Fn() -> BoxFuture<'static, bool> + Send + Sync + 'static,
    {
        let strategy = self.strategy.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(strategy.next_interval()) => {
                        if !tick().await {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("rtcp scheduler stopped");
        });
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_cancelled() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let scheduler = RtcpScheduler::new(
            Arc::new(FixedInterval::new(Duration::from_secs(5))),
            CancellationToken::new(),
        );

        let counter = ticks.clone();
        scheduler.start(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            })
        });

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        scheduler.cancel();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_returning_false_stops_the_loop() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let scheduler = RtcpScheduler::new(
            Arc::new(FixedInterval::new(Duration::from_secs(5))),
            CancellationToken::new(),
        );

        let counter = ticks.clone();
        scheduler.start(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                false
            })
        });

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }
}
