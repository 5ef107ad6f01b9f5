//! Tick sources that decouple wall-clock timing from the loops they drive.
//!
//! Consumers only ever see an `mpsc::Receiver<()>`; tests hand them a
//! channel of their own and push ticks by hand.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// Spawn a ticker on `tracker` that emits one tick per `period`.
///
/// The first tick fires one full period after spawning. Ticks are not
/// queued: while the consumer is still busy with the previous one, the
/// ticker waits. The channel closes when `cancel` fires.
pub fn spawn_ticker(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    tracker: &TaskTracker,
) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);

    tracker.spawn(async move {
        let mut interval =
            tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        sent = tx.send(()) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        debug!(ticker = name, "ticker stopped");
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_ticks_until_cancelled() {
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let mut rx = spawn_ticker("test", Duration::from_millis(5), cancel.clone(), &tracker);
        tracker.close();

        for _ in 0..3 {
            tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("tick did not arrive")
                .expect("channel closed early");
        }

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), tracker.wait())
            .await
            .expect("ticker did not stop");
    }

    #[tokio::test]
    async fn stops_when_receiver_dropped() {
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let rx = spawn_ticker("test", Duration::from_millis(1), cancel, &tracker);
        tracker.close();
        drop(rx);

        tokio::time::timeout(Duration::from_secs(1), tracker.wait())
            .await
            .expect("ticker did not notice the dropped receiver");
    }
}
