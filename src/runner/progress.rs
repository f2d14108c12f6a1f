use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::metrics::BookingTally;

/// Log the running counters every `every` until `stop` is cancelled
pub async fn report_progress(
    tally: Arc<BookingTally>,
    planned: u64,
    every: Duration,
    stop: CancellationToken,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                info!(
                    attempted = tally.attempted(),
                    planned,
                    successful_bookings = tally.successful_bookings(),
                    failed_bookings = tally.failed_bookings(),
                    unclassified_anomalies = tally.unclassified_anomalies(),
                    transport_errors = tally.transport_errors(),
                    "load run progress"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_cancelled() {
        let stop = CancellationToken::new();
        let handle = tokio::spawn(report_progress(
            Arc::new(BookingTally::new()),
            10,
            Duration::from_secs(1),
            stop.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(!handle.is_finished());

        stop.cancel();
        handle.await.unwrap();
    }
}
